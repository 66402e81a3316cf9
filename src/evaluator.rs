//! Two-phase "smart eval".
//!
//! A complete command is first compiled as a single expression; if that
//! fails to compile it is re-compiled as a module body, a trailing bare
//! expression is detached, the statements run, and the trailing
//! expression's value (if any) is returned. The expression-mode probe
//! error is discarded here, so it can never surface in a cause chain.

use thiserror::Error;
use tracing::trace;

use crate::engine::ast::Stmt;
use crate::engine::compile::{compile, CompileMode, Program};
use crate::engine::interp::{Machine, RuntimeError};
use crate::engine::value::{Namespace, Value};
use crate::engine::CompileError;
use crate::linecache;

/// Distinguished sentinel: the command ran as a statement and produced no
/// displayable value.
#[derive(Debug)]
pub enum EvalOutcome {
    Value(Value),
    NoResult,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Compile(#[from] CompileError),
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
}

/// Hook applied to the module body between compilation and execution.
pub type AstTransform = dyn Fn(&mut Vec<Stmt>);

/// Execute one complete, normalized command against the namespace.
///
/// The source is registered in the line cache under `filename` before
/// compilation and stays registered afterwards, so tracebacks and source
/// introspection keep working for anything defined by this command.
pub fn evaluate(
    source: &str,
    ns: &Namespace,
    filename: &str,
    machine: &mut Machine,
    transform: Option<&AstTransform>,
) -> Result<EvalOutcome, EngineError> {
    linecache::register(filename, source);

    match compile(source, filename, CompileMode::Expression) {
        Ok(program) => {
            trace!(filename, "expression mode");
            let value = machine.eval_program(&program, ns)?;
            Ok(EvalOutcome::Value(value))
        }
        Err(_probe) => {
            // Not a single expression; the probe error is an artifact of
            // the two-phase contract and is dropped, never surfaced.
            trace!(filename, "statement fallback");
            let mut program = compile(source, filename, CompileMode::Module)?;
            if let Some(transform) = transform {
                transform(&mut program.body);
            }
            let trailing = match program.body.last() {
                Some(Stmt { kind: crate::engine::ast::StmtKind::Expr(_), .. }) => {
                    program.body.pop()
                }
                _ => None,
            };
            machine.exec_program(&program, ns)?;
            match trailing {
                Some(stmt) => {
                    let tail = Program { filename: program.filename.clone(), body: vec![stmt] };
                    let value = machine.eval_program(&tail, ns)?;
                    Ok(EvalOutcome::Value(value))
                }
                None => Ok(EvalOutcome::NoResult),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::new_namespace;

    fn eval(source: &str, ns: &Namespace) -> Result<EvalOutcome, EngineError> {
        let mut machine = Machine::new(100);
        evaluate(source, ns, "<adder#test>", &mut machine, None)
    }

    #[test]
    fn test_expression_returns_value() {
        let ns = new_namespace();
        match eval("1 + 1", &ns).unwrap() {
            EvalOutcome::Value(v) => assert_eq!(v.repr(), "2"),
            EvalOutcome::NoResult => panic!("expected a value"),
        }
    }

    #[test]
    fn test_statement_returns_no_result_and_binds() {
        let ns = new_namespace();
        assert!(matches!(eval("a = 1", &ns).unwrap(), EvalOutcome::NoResult));
        assert_eq!(ns.borrow().get("a").unwrap().repr(), "1");
    }

    #[test]
    fn test_statements_with_trailing_expression() {
        let ns = new_namespace();
        match eval("a = 1; a + 1", &ns).unwrap() {
            EvalOutcome::Value(v) => assert_eq!(v.repr(), "2"),
            EvalOutcome::NoResult => panic!("expected a value"),
        }
        assert_eq!(ns.borrow().get("a").unwrap().repr(), "1");
    }

    #[test]
    fn test_empty_source_is_no_result() {
        let ns = new_namespace();
        assert!(matches!(eval("", &ns).unwrap(), EvalOutcome::NoResult));
        assert!(matches!(eval("# only a comment", &ns).unwrap(), EvalOutcome::NoResult));
    }

    #[test]
    fn test_multiline_definition_runs() {
        let ns = new_namespace();
        let src = "def double(x):\n    return x * 2";
        assert!(matches!(eval(src, &ns).unwrap(), EvalOutcome::NoResult));
        match eval("double(21)", &ns).unwrap() {
            EvalOutcome::Value(v) => assert_eq!(v.repr(), "42"),
            EvalOutcome::NoResult => panic!("expected a value"),
        }
    }

    #[test]
    fn test_compile_failure_comes_from_module_mode() {
        let ns = new_namespace();
        let err = eval("def f(:", &ns).unwrap_err();
        assert!(matches!(err, EngineError::Compile(CompileError::Syntax { .. })));
    }

    #[test]
    fn test_runtime_error_propagates() {
        let ns = new_namespace();
        let err = eval("1 / 0", &ns).unwrap_err();
        match err {
            EngineError::Runtime(e) => assert_eq!(e.kind, "ZeroDivisionError"),
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_source_registered_before_run() {
        let ns = new_namespace();
        let mut machine = Machine::new(100);
        let _ = evaluate("boom(", &ns, "<adder#reg>", &mut machine, None);
        // registration happens even when compilation fails
        assert_eq!(linecache::line("<adder#reg>", 1).as_deref(), Some("boom("));
    }

    #[test]
    fn test_transform_hook_applied_to_module_body() {
        let ns = new_namespace();
        let mut machine = Machine::new(100);
        let drop_all: Box<AstTransform> = Box::new(|body: &mut Vec<Stmt>| body.clear());
        let outcome =
            evaluate("a = 99", &ns, "<adder#hook>", &mut machine, Some(drop_all.as_ref()))
                .unwrap();
        assert!(matches!(outcome, EvalOutcome::NoResult));
        assert!(ns.borrow().get("a").is_none());
    }
}
