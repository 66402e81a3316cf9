//! The compile/exec/eval capability consumed by the evaluator.
//!
//! The front end parses source with the real Python grammar via
//! Tree-Sitter and lowers it to a small statement AST; the back end is a
//! tree-walking interpreter over a dynamic value model. The evaluator
//! treats this module as a boundary: compile in one of two modes, then
//! execute against a namespace.

pub mod ast;
pub mod builtins;
pub mod compile;
pub mod interp;
pub mod value;

pub use compile::{compile, CompileError, CompileMode, Program};
pub use interp::{InterruptFlag, Machine, RuntimeError, Scope, RUNTIME_FILE};
pub use value::{new_namespace, DictKey, DictRef, Namespace, Value};
