//! Session state: namespace, transcript, prompt numbering, rolling
//! results, display hook, and per-prompt timing.
//!
//! One session owns one namespace and one transcript; nothing here is
//! shared between sessions. The transcript maps are ordinary namespace
//! entries (`In`, `Out`) backed by the same objects the session tracks
//! internally, so user code can read them, delete them, and get the same
//! objects back on the next command.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::debug;

use crate::continuation;
use crate::engine::interp::InterruptFlag;
use crate::engine::value::DictRef;
use crate::engine::{new_namespace, DictKey, Machine, Namespace, Value};
use crate::evaluator::{evaluate, AstTransform, EngineError, EvalOutcome};
use crate::linecache;
use crate::traceback::TracebackFilter;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Show raw tracebacks, including engine-internal frames.
    pub debug: bool,
    /// Invoke the display hook for results at all.
    pub echo: bool,
    /// Interpreter call-stack depth limit.
    pub recursion_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig { debug: false, echo: true, recursion_limit: 100 }
    }
}

/// Replaceable callback for displayable results; called at most once per
/// command, never for a command without a result.
pub type DisplayHook = Box<dyn FnMut(u64, &Value)>;

#[derive(Debug)]
pub enum CommandOutcome {
    /// Whitespace-only input; no prompt slot consumed.
    Skipped,
    Value { prompt: u64, value: Value, displayed: bool },
    NoResult { prompt: u64 },
    Failed { prompt: u64, report: String },
}

pub struct Session {
    config: SessionConfig,
    namespace: Namespace,
    inputs: DictRef,
    outputs: DictRef,
    prompt: u64,
    recent: [Option<Value>; 3],
    timings: IndexMap<u64, Duration>,
    machine: Machine,
    filter: TracebackFilter,
    display: Option<DisplayHook>,
    transform: Option<Box<AstTransform>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Session {
        let namespace = new_namespace();
        let inputs: DictRef = Rc::new(RefCell::new(IndexMap::new()));
        let outputs: DictRef = Rc::new(RefCell::new(IndexMap::new()));
        {
            let mut ns = namespace.borrow_mut();
            ns.insert("__name__".to_string(), Value::str("__main__"));
            ns.insert("In".to_string(), Value::Dict(inputs.clone()));
            ns.insert("Out".to_string(), Value::Dict(outputs.clone()));
        }
        let machine = Machine::new(config.recursion_limit);
        let filter = TracebackFilter::new(config.debug);
        Session {
            config,
            namespace,
            inputs,
            outputs,
            prompt: 1,
            recent: [None, None, None],
            timings: IndexMap::new(),
            machine,
            filter,
            display: None,
            transform: None,
        }
    }

    pub fn set_display(&mut self, hook: DisplayHook) {
        self.display = Some(hook);
    }

    pub fn set_transform(&mut self, transform: Box<AstTransform>) {
        self.transform = Some(transform);
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
        self.filter.set_debug(debug);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Shared flag that aborts the in-flight evaluation when set.
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.machine.interrupt_flag()
    }

    /// The prompt number the next non-blank command will get.
    pub fn prompt_number(&self) -> u64 {
        self.prompt
    }

    pub fn input(&self, prompt: u64) -> Option<String> {
        match self.inputs.borrow().get(&DictKey::Int(prompt as i64)) {
            Some(Value::Str(s)) => Some(s.to_string()),
            _ => None,
        }
    }

    pub fn output(&self, prompt: u64) -> Option<Value> {
        self.outputs.borrow().get(&DictKey::Int(prompt as i64)).cloned()
    }

    /// Most recent, second and third most recent results.
    pub fn recent_results(&self) -> &[Option<Value>; 3] {
        &self.recent
    }

    pub fn elapsed(&self, prompt: u64) -> Option<Duration> {
        self.timings.get(&prompt).copied()
    }

    /// Transcript in prompt order, for history search and rendering.
    pub fn history(&self) -> Vec<(u64, String)> {
        self.inputs
            .borrow()
            .iter()
            .filter_map(|(k, v)| match (k, v) {
                (DictKey::Int(n), Value::Str(s)) => Some((*n as u64, s.to_string())),
                _ => None,
            })
            .collect()
    }

    /// The registered source for a prompt, via the line cache.
    pub fn input_source(&self, prompt: u64) -> Option<String> {
        let lines = linecache::lines(&virtual_filename(prompt))?;
        Some(lines.join("\n"))
    }

    /// Run one complete command through the evaluator and record it.
    pub fn run_command(&mut self, raw: &str) -> CommandOutcome {
        if raw.trim().is_empty() {
            return CommandOutcome::Skipped;
        }
        let n = self.prompt;
        self.restore_transcript_bindings();
        self.inputs
            .borrow_mut()
            .insert(DictKey::Int(n as i64), Value::str(raw));

        let normalized = continuation::normalize(raw);
        let filename = virtual_filename(n);
        let started = Instant::now();
        let result = evaluate(
            &normalized,
            &self.namespace,
            &filename,
            &mut self.machine,
            self.transform.as_deref(),
        );
        let elapsed = started.elapsed();
        self.timings.insert(n, elapsed);
        self.prompt = n + 1;
        debug!(prompt = n, elapsed_us = elapsed.as_micros() as u64, "command finished");

        match result {
            Ok(EvalOutcome::Value(value)) if !matches!(value, Value::None) => {
                self.outputs
                    .borrow_mut()
                    .insert(DictKey::Int(n as i64), value.clone());
                self.bind_result(n, &value);
                let suppressed = !self.config.echo || raw.trim_end().ends_with(';');
                let mut displayed = false;
                if !suppressed {
                    if let Some(hook) = self.display.as_mut() {
                        hook(n, &value);
                        displayed = true;
                    }
                }
                CommandOutcome::Value { prompt: n, value, displayed }
            }
            Ok(_) => CommandOutcome::NoResult { prompt: n },
            Err(EngineError::Compile(err)) => CommandOutcome::Failed {
                prompt: n,
                report: self.filter.render_syntax(&err, &filename),
            },
            Err(EngineError::Runtime(err)) => CommandOutcome::Failed {
                prompt: n,
                report: self.filter.render(&err),
            },
        }
    }

    /// Re-insert `In`/`Out` if user code deleted them, binding the same
    /// backing objects the session tracks.
    fn restore_transcript_bindings(&self) {
        let mut ns = self.namespace.borrow_mut();
        if !ns.contains_key("In") {
            ns.insert("In".to_string(), Value::Dict(self.inputs.clone()));
        }
        if !ns.contains_key("Out") {
            ns.insert("Out".to_string(), Value::Dict(self.outputs.clone()));
        }
    }

    /// Shift the rolling results and overwrite their bindings, plus the
    /// per-prompt slot. Always unconditional; user deletions or
    /// reassignments of these names do not survive the next result.
    fn bind_result(&mut self, prompt: u64, value: &Value) {
        let prev_first = self.recent[0].take();
        let prev_second = self.recent[1].take();
        self.recent = [Some(value.clone()), prev_first, prev_second];
        let mut ns = self.namespace.borrow_mut();
        ns.insert("_".to_string(), value.clone());
        if let Some(second) = &self.recent[1] {
            ns.insert("__".to_string(), second.clone());
        }
        if let Some(third) = &self.recent[2] {
            ns.insert("___".to_string(), third.clone());
        }
        ns.insert(format!("_{}", prompt), value.clone());
    }
}

impl Default for Session {
    fn default() -> Session {
        Session::new(SessionConfig::default())
    }
}

fn virtual_filename(prompt: u64) -> String {
    format!("{}{}>", linecache::RESERVED_PREFIX, prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(outcome: CommandOutcome) -> Value {
        match outcome {
            CommandOutcome::Value { value, .. } => value,
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn test_prompt_numbering_and_transcript() {
        let mut session = Session::default();
        assert_eq!(session.prompt_number(), 1);
        session.run_command("1 + 1");
        session.run_command("x = 5");
        assert_eq!(session.prompt_number(), 3);
        assert_eq!(session.input(1).as_deref(), Some("1 + 1"));
        assert_eq!(session.output(1).map(|v| v.repr()).as_deref(), Some("2"));
        assert_eq!(session.input(2).as_deref(), Some("x = 5"));
        assert!(session.output(2).is_none());
    }

    #[test]
    fn test_blank_input_consumes_no_slot() {
        let mut session = Session::default();
        assert!(matches!(session.run_command("   \n  "), CommandOutcome::Skipped));
        assert_eq!(session.prompt_number(), 1);
        assert!(session.input(1).is_none());
    }

    #[test]
    fn test_rolling_results_shift() {
        let mut session = Session::default();
        session.run_command("1");
        session.run_command("2");
        session.run_command("3");
        let ns = session.namespace().borrow();
        assert_eq!(ns.get("_").map(Value::repr).as_deref(), Some("3"));
        assert_eq!(ns.get("__").map(Value::repr).as_deref(), Some("2"));
        assert_eq!(ns.get("___").map(Value::repr).as_deref(), Some("1"));
        assert_eq!(ns.get("_1").map(Value::repr).as_deref(), Some("1"));
        assert_eq!(ns.get("_3").map(Value::repr).as_deref(), Some("3"));
    }

    #[test]
    fn test_statements_leave_rolling_results_alone() {
        let mut session = Session::default();
        session.run_command("7");
        session.run_command("x = 1");
        let ns = session.namespace().borrow();
        assert_eq!(ns.get("_").map(Value::repr).as_deref(), Some("7"));
        assert!(ns.get("__").is_none());
    }

    #[test]
    fn test_error_advances_prompt_without_output() {
        let mut session = Session::default();
        let outcome = session.run_command("1 / 0");
        match outcome {
            CommandOutcome::Failed { prompt, report } => {
                assert_eq!(prompt, 1);
                assert!(report.contains("ZeroDivisionError"));
                assert!(!report.contains(crate::engine::RUNTIME_FILE));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(session.prompt_number(), 2);
        assert_eq!(session.input(1).as_deref(), Some("1 / 0"));
        assert!(session.output(1).is_none());
    }

    #[test]
    fn test_debug_mode_shows_internal_frames() {
        let mut session = Session::new(SessionConfig { debug: true, ..Default::default() });
        match session.run_command("1 / 0") {
            CommandOutcome::Failed { report, .. } => {
                assert!(report.contains(crate::engine::RUNTIME_FILE));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_session_survives_errors() {
        let mut session = Session::default();
        session.run_command("boom(");
        session.run_command("1 / 0");
        let value = value_of(session.run_command("40 + 2"));
        assert_eq!(value.repr(), "42");
    }

    #[test]
    fn test_deleted_input_map_restored_with_same_identity() {
        let mut session = Session::default();
        session.run_command("1 + 1");
        session.run_command("del In");
        assert!(session.namespace().borrow().get("In").is_none());
        session.run_command("2 + 2");
        let ns = session.namespace().borrow();
        match ns.get("In") {
            Some(Value::Dict(map)) => {
                assert!(Rc::ptr_eq(map, &session.inputs));
                // accumulated history survives the deletion
                assert!(map.borrow().contains_key(&DictKey::Int(1)));
                assert!(map.borrow().contains_key(&DictKey::Int(3)));
            }
            other => panic!("expected In to be restored as a dict, got {:?}", other),
        }
    }

    #[test]
    fn test_deleted_rolling_binding_overwritten_by_next_result() {
        let mut session = Session::default();
        session.run_command("5");
        session.run_command("del _");
        // a statement command does not restore it
        session.run_command("x = 1");
        assert!(session.namespace().borrow().get("_").is_none());
        // the next result does
        session.run_command("6");
        assert_eq!(
            session.namespace().borrow().get("_").map(Value::repr).as_deref(),
            Some("6")
        );
    }

    #[test]
    fn test_display_hook_called_once_per_result() {
        let mut session = Session::default();
        let seen: Rc<RefCell<Vec<(u64, String)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        session.set_display(Box::new(move |prompt, value| {
            sink.borrow_mut().push((prompt, value.repr()));
        }));
        session.run_command("1 + 1");
        session.run_command("x = 1");
        session.run_command("1 / 0");
        assert_eq!(seen.borrow().as_slice(), &[(1, "2".to_string())]);
    }

    #[test]
    fn test_trailing_semicolon_suppresses_echo_but_records_output() {
        let mut session = Session::default();
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        session.set_display(Box::new(move |_, value| {
            sink.borrow_mut().push(value.repr());
        }));
        match session.run_command("2 + 2;") {
            CommandOutcome::Value { displayed, .. } => assert!(!displayed),
            other => panic!("expected a value, got {:?}", other),
        }
        assert!(seen.borrow().is_empty());
        assert_eq!(session.output(1).map(|v| v.repr()).as_deref(), Some("4"));
    }

    #[test]
    fn test_none_result_is_not_recorded() {
        let mut session = Session::default();
        assert!(matches!(session.run_command("None"), CommandOutcome::NoResult { .. }));
        assert!(session.output(1).is_none());
        assert!(session.namespace().borrow().get("_").is_none());
    }

    #[test]
    fn test_indented_command_normalized() {
        let mut session = Session::default();
        let value = value_of(session.run_command("    1 + 1"));
        assert_eq!(value.repr(), "2");
    }

    #[test]
    fn test_namespace_shared_between_commands() {
        let mut session = Session::default();
        session.run_command("def f():\n    return stored");
        session.run_command("stored = 123");
        let value = value_of(session.run_command("f()"));
        assert_eq!(value.repr(), "123");
    }

    #[test]
    fn test_timing_recorded_per_prompt() {
        let mut session = Session::default();
        session.run_command("1 + 1");
        assert!(session.elapsed(1).is_some());
        assert!(session.elapsed(2).is_none());
    }

    #[test]
    fn test_input_source_from_line_cache() {
        let mut session = Session::default();
        session.run_command("def g():\n    return 9");
        assert_eq!(session.input_source(1).as_deref(), Some("def g():\n    return 9"));
    }

    #[test]
    fn test_interrupt_recorded_like_any_error() {
        let mut session = Session::default();
        session.interrupt_flag().store(true, std::sync::atomic::Ordering::Relaxed);
        match session.run_command("x = 1") {
            CommandOutcome::Failed { report, .. } => {
                assert!(report.contains("KeyboardInterrupt"));
            }
            other => panic!("expected interrupt failure, got {:?}", other),
        }
        assert_eq!(session.input(1).as_deref(), Some("x = 1"));
        assert!(session.output(1).is_none());
        // next command runs normally
        assert!(matches!(session.run_command("x = 1"), CommandOutcome::NoResult { .. }));
    }
}
