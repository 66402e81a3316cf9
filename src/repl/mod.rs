//! Line-edited terminal front end.
//!
//! A thin rustyline surface over the session engine: the loop reads one
//! physical line at a time and asks the continuation decider whether the
//! buffer is a complete command; until it is, further lines are read
//! under the continuation prompt with the decider's auto-indent prefilled
//! at the configured width. Completion draws names from the live
//! namespace, and results echo through the session's display hook.
//! Everything stateful lives in the [`Session`]; this module only reads
//! lines and prints.

pub mod config;
pub mod helper;

pub use config::ReplConfig;
pub use helper::AdderHelper;

use std::fs;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tracing::debug;

use crate::continuation::{check_input_indent, InputStatus};
use crate::session::{CommandOutcome, Session};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the interactive loop until end of input or an `exit`/`quit`
/// command.
pub fn run(config: ReplConfig) -> Result<(), ReadlineError> {
    println!("adder {}", VERSION);
    println!("Type 'exit' or 'quit' to leave.\n");

    let mut session = Session::new(config.session_config());
    session.set_display(Box::new(|prompt, value| {
        println!("Out[{}]: {}", prompt, value.repr());
    }));

    let mut editor: Editor<AdderHelper, DefaultHistory> = Editor::new()?;
    editor.set_helper(Some(AdderHelper::new(session.namespace().clone())));
    let history_path = config.history_path();
    if let Some(path) = &history_path {
        // A missing history file on first run is expected.
        let _ = editor.load_history(path);
    }

    'session: loop {
        let mut buffer = String::new();
        let mut indent = String::new();
        loop {
            let prompt = if buffer.is_empty() {
                config.prompt_for(session.prompt_number())
            } else {
                config.continuation_prompt.clone()
            };
            match editor.readline_with_initial(&prompt, (indent.as_str(), "")) {
                Ok(line) => {
                    buffer.push_str(&line);
                    match check_input_indent(&buffer, buffer.len(), config.indent_width) {
                        InputStatus::Complete => break,
                        InputStatus::Incomplete { insertion } => {
                            // insertion is a newline plus the indent for
                            // the next physical line
                            buffer.push('\n');
                            indent = insertion[1..].to_string();
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("KeyboardInterrupt");
                    continue 'session;
                }
                Err(ReadlineError::Eof) => break 'session,
                Err(err) => return Err(err),
            }
        }

        let trimmed = buffer.trim();
        if trimmed == "exit" || trimmed == "quit" {
            break;
        }
        if !trimmed.is_empty() {
            let _ = editor.add_history_entry(buffer.as_str());
            if let Some(helper) = editor.helper_mut() {
                helper.add_to_history(buffer.clone());
            }
        }
        if let CommandOutcome::Failed { report, .. } = session.run_command(&buffer) {
            eprintln!("{}", report);
        }
    }

    if let Some(path) = &history_path {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(err) = editor.save_history(path) {
            debug!("history not saved: {}", err);
        }
    }
    Ok(())
}
