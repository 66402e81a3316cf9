//! Rustyline helper integration.
//!
//! Combines completion and history hints into a single `Helper`
//! implementation. Multi-line continuation is driven by the REPL loop,
//! which consults the continuation decider between physical lines, so
//! the validator here accepts every line as-is.

use std::borrow::Cow;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::engine::{builtins, Namespace};

/// Statement and expression keywords of the surface language.
const KEYWORDS: &[&str] = &[
    "def", "return", "raise", "if", "elif", "else", "while", "for", "in", "not", "and", "or",
    "try", "except", "finally", "pass", "break", "continue", "del", "True", "False", "None",
];

pub struct AdderHelper {
    /// Session namespace; completion draws user-defined names from it.
    namespace: Namespace,
    command_history: Vec<String>,
}

impl AdderHelper {
    pub fn new(namespace: Namespace) -> AdderHelper {
        AdderHelper { namespace, command_history: Vec::new() }
    }

    /// Add a command to the hint history, keeping the last 100.
    pub fn add_to_history(&mut self, cmd: String) {
        if self.command_history.len() >= 100 {
            self.command_history.remove(0);
        }
        self.command_history.push(cmd);
    }

    fn all_completions(&self) -> Vec<String> {
        let mut completions: Vec<String> = KEYWORDS.iter().map(|s| s.to_string()).collect();
        completions.extend(builtins::names().map(str::to_string));
        completions.extend(self.namespace.borrow().keys().cloned());
        completions.sort();
        completions.dedup();
        completions
    }
}

impl Completer for AdderHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        let word_start = before
            .rfind(|c: char| !c.is_alphanumeric() && c != '_')
            .map(|i| i + 1)
            .unwrap_or(0);
        let partial = &before[word_start..];
        if partial.is_empty() {
            return Ok((pos, vec![]));
        }
        let matches: Vec<Pair> = self
            .all_completions()
            .into_iter()
            .filter(|c| c.starts_with(partial))
            .map(|c| Pair { display: c.clone(), replacement: c })
            .collect();
        Ok((word_start, matches))
    }
}

impl Hinter for AdderHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        // Most recent match first.
        for cmd in self.command_history.iter().rev() {
            if cmd.starts_with(line) && cmd.len() > line.len() {
                return Some(cmd[line.len()..].to_string());
            }
        }
        None
    }
}

impl Highlighter for AdderHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{}\x1b[0m", hint))
    }
}

impl Validator for AdderHelper {}

impl Helper for AdderHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::new_namespace;
    use crate::engine::Value;
    use rustyline::history::DefaultHistory;

    #[test]
    fn test_completion_keywords_and_builtins() {
        let helper = AdderHelper::new(new_namespace());
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);

        let (start, matches) = helper.complete("de", 2, &ctx).unwrap();
        assert_eq!(start, 0);
        assert!(matches.iter().any(|m| m.display == "def"));
        assert!(matches.iter().any(|m| m.display == "del"));

        let (_, matches) = helper.complete("x = pri", 7, &ctx).unwrap();
        assert!(matches.iter().any(|m| m.display == "print"));
    }

    #[test]
    fn test_completion_draws_from_namespace() {
        let ns = new_namespace();
        ns.borrow_mut().insert("total_count".to_string(), Value::Int(3));
        let helper = AdderHelper::new(ns);
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);

        let (start, matches) = helper.complete("print(tot", 9, &ctx).unwrap();
        assert_eq!(start, 6);
        assert!(matches.iter().any(|m| m.display == "total_count"));
    }

    #[test]
    fn test_completion_empty_word_suggests_nothing() {
        let helper = AdderHelper::new(new_namespace());
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);
        let (_, matches) = helper.complete("x = ", 4, &ctx).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_hint_from_history() {
        let mut helper = AdderHelper::new(new_namespace());
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);

        helper.add_to_history("print('hello')".to_string());
        helper.add_to_history("x = 1".to_string());

        assert_eq!(helper.hint("pri", 3, &ctx), Some("nt('hello')".to_string()));
        assert_eq!(helper.hint("miss", 4, &ctx), None);
    }

    #[test]
    fn test_hint_only_at_end_of_line() {
        let mut helper = AdderHelper::new(new_namespace());
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);
        helper.add_to_history("print('hello')".to_string());
        assert_eq!(helper.hint("print", 2, &ctx), None);
    }

    #[test]
    fn test_history_limit() {
        let mut helper = AdderHelper::new(new_namespace());
        for i in 0..150 {
            helper.add_to_history(format!("cmd{}", i));
        }
        assert_eq!(helper.command_history.len(), 100);
        assert_eq!(helper.command_history[0], "cmd50");
        assert_eq!(helper.command_history[99], "cmd149");
    }
}
