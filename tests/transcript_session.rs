//! Tests for the session's transcript ritual: prompt numbering, rolling
//! result bindings, display hook discipline, and recovery of deleted
//! transcript bindings with the same object identity.

use std::cell::RefCell;
use std::rc::Rc;

use adder::session::{CommandOutcome, Session, SessionConfig};

#[test]
fn test_rolling_results_after_three_expressions() {
    let mut session = Session::default();
    session.run_command("1");
    session.run_command("2");
    session.run_command("3");

    let ns = session.namespace().borrow();
    assert_eq!(ns.get("_").map(|v| v.repr()).as_deref(), Some("3"));
    assert_eq!(ns.get("__").map(|v| v.repr()).as_deref(), Some("2"));
    assert_eq!(ns.get("___").map(|v| v.repr()).as_deref(), Some("1"));
}

#[test]
fn test_per_prompt_result_slots() {
    let mut session = Session::default();
    session.run_command("10");
    session.run_command("x = 0");
    session.run_command("20");

    let ns = session.namespace().borrow();
    assert_eq!(ns.get("_1").map(|v| v.repr()).as_deref(), Some("10"));
    assert!(ns.get("_2").is_none());
    assert_eq!(ns.get("_3").map(|v| v.repr()).as_deref(), Some("20"));
}

#[test]
fn test_blank_commands_consume_no_prompt() {
    let mut session = Session::default();
    session.run_command("");
    session.run_command("   ");
    session.run_command("\n\n");
    assert_eq!(session.prompt_number(), 1);
    session.run_command("1 + 1");
    assert_eq!(session.prompt_number(), 2);
}

#[test]
fn test_failed_command_advances_prompt_without_output() {
    let mut session = Session::default();
    match session.run_command("undefined_name") {
        CommandOutcome::Failed { prompt, report } => {
            assert_eq!(prompt, 1);
            assert!(report.contains("NameError"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(session.prompt_number(), 2);
    assert_eq!(session.input(1).as_deref(), Some("undefined_name"));
    assert!(session.output(1).is_none());

    // rolling results untouched by the failure
    assert!(session.namespace().borrow().get("_").is_none());
}

#[test]
fn test_user_code_reads_transcript_maps() {
    let mut session = Session::default();
    session.run_command("6 * 7");
    match session.run_command("Out[1]") {
        CommandOutcome::Value { value, .. } => assert_eq!(value.repr(), "42"),
        other => panic!("expected a value, got {:?}", other),
    }
    match session.run_command("In[1]") {
        CommandOutcome::Value { value, .. } => assert_eq!(value.repr(), "'6 * 7'"),
        other => panic!("expected a value, got {:?}", other),
    }
}

#[test]
fn test_deleted_transcript_maps_restored_with_history() {
    let mut session = Session::default();
    session.run_command("1 + 1");
    session.run_command("del In\ndel Out");
    session.run_command("2 + 2");

    // the restored maps still hold the full accumulated history
    match session.run_command("len(In)") {
        CommandOutcome::Value { value, .. } => assert_eq!(value.repr(), "4"),
        other => panic!("expected a value, got {:?}", other),
    }
    match session.run_command("Out[1] + Out[3]") {
        CommandOutcome::Value { value, .. } => assert_eq!(value.repr(), "6"),
        other => panic!("expected a value, got {:?}", other),
    }
}

#[test]
fn test_display_hook_skips_statements_and_errors() {
    let mut session = Session::default();
    let seen: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    session.set_display(Box::new(move |prompt, _| sink.borrow_mut().push(prompt)));

    session.run_command("1 + 1");
    session.run_command("x = 2");
    session.run_command("1 / 0");
    session.run_command("x");

    assert_eq!(seen.borrow().as_slice(), &[1, 4]);
}

#[test]
fn test_echo_suppression_still_records_output() {
    let mut session = Session::default();
    let calls: Rc<RefCell<usize>> = Rc::new(RefCell::new(0));
    let sink = calls.clone();
    session.set_display(Box::new(move |_, _| *sink.borrow_mut() += 1));

    session.run_command("5 * 5;");
    assert_eq!(*calls.borrow(), 0);
    assert_eq!(session.output(1).map(|v| v.repr()).as_deref(), Some("25"));
}

#[test]
fn test_interactive_definitions_see_later_bindings() {
    let mut session = Session::default();
    session.run_command("def report():\n    return factor * 2");
    session.run_command("factor = 21");
    match session.run_command("report()") {
        CommandOutcome::Value { value, .. } => assert_eq!(value.repr(), "42"),
        other => panic!("expected a value, got {:?}", other),
    }
}

#[test]
fn test_source_retrieval_for_interactive_definitions() {
    let mut session = Session::default();
    let source = "def saved():\n    return 'kept'";
    session.run_command(source);
    assert_eq!(session.input_source(1).as_deref(), Some(source));
    // recall by prompt number survives later commands
    session.run_command("saved()");
    assert_eq!(session.input_source(1).as_deref(), Some(source));
}

#[test]
fn test_debug_session_shows_engine_frames() {
    let mut quiet = Session::default();
    let mut loud = Session::new(SessionConfig { debug: true, ..Default::default() });

    let quiet_report = match quiet.run_command("1 / 0") {
        CommandOutcome::Failed { report, .. } => report,
        other => panic!("expected failure, got {:?}", other),
    };
    let loud_report = match loud.run_command("1 / 0") {
        CommandOutcome::Failed { report, .. } => report,
        other => panic!("expected failure, got {:?}", other),
    };

    assert!(!quiet_report.contains("<adder-runtime>"));
    assert!(loud_report.contains("<adder-runtime>"));
}

#[test]
fn test_traceback_names_interactive_frames() {
    let mut session = Session::default();
    session.run_command("def inner():\n    return 1 / 0");
    session.run_command("def outer():\n    return inner()");
    match session.run_command("outer()") {
        CommandOutcome::Failed { report, .. } => {
            assert!(report.contains("in outer"));
            assert!(report.contains("in inner"));
            assert!(report.contains("ZeroDivisionError"));
            let outer_at = report.find("in outer").unwrap();
            let inner_at = report.find("in inner").unwrap();
            assert!(outer_at < inner_at, "call order preserved in {:?}", report);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn test_sessions_are_independent() {
    let mut a = Session::default();
    let mut b = Session::default();
    a.run_command("shared = 'a'");
    b.run_command("shared = 'b'");
    match a.run_command("shared") {
        CommandOutcome::Value { value, .. } => assert_eq!(value.repr(), "'a'"),
        other => panic!("expected a value, got {:?}", other),
    }
    assert_eq!(b.prompt_number(), 2);
}
