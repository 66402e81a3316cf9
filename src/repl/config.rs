//! REPL configuration.
//!
//! Loaded from `config.toml` under the user config directory; every field
//! has a default so a missing or partial file works. Mode flags live here
//! and are handed to the session explicitly, never read from process-wide
//! state.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use crate::session::SessionConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// Prompt template; `{n}` expands to the next prompt number.
    pub prompt: String,
    pub continuation_prompt: String,
    pub indent_width: usize,
    /// Echo results through the display hook.
    pub echo: bool,
    /// Show raw tracebacks with engine-internal frames.
    pub debug: bool,
    /// Persist line history across sessions.
    pub history: bool,
    pub recursion_limit: usize,
}

impl Default for ReplConfig {
    fn default() -> ReplConfig {
        ReplConfig {
            prompt: "In [{n}]: ".to_string(),
            continuation_prompt: "   ...: ".to_string(),
            indent_width: 4,
            echo: true,
            debug: false,
            history: true,
            recursion_limit: 100,
        }
    }
}

impl ReplConfig {
    /// Load from the default location, falling back to defaults on any
    /// missing or malformed file.
    pub fn load() -> ReplConfig {
        let Some(path) = config_path() else {
            return ReplConfig::default();
        };
        let Ok(content) = fs::read_to_string(&path) else {
            return ReplConfig::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring malformed {}: {}", path.display(), err);
                ReplConfig::default()
            }
        }
    }

    pub fn prompt_for(&self, prompt_number: u64) -> String {
        self.prompt.replace("{n}", &prompt_number.to_string())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            debug: self.debug,
            echo: self.echo,
            recursion_limit: self.recursion_limit,
        }
    }

    pub fn history_path(&self) -> Option<PathBuf> {
        if !self.history {
            return None;
        }
        let mut path = dirs::data_dir()?;
        path.push("adder");
        path.push("history.txt");
        Some(path)
    }
}

fn config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("adder");
    path.push("config.toml");
    Some(path)
}
