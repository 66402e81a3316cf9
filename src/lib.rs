//! Adder - interactive console engine for a Python-flavored dynamic
//! language.
//!
//! The library accepts one logical command of source text at a time,
//! decides whether the input is syntactically complete or needs another
//! physical line, evaluates it with expression-or-statement fallback
//! semantics, and keeps a numbered transcript of inputs and results.
//!
//! # Architecture
//!
//! Input flows through two coupled subsystems:
//!
//! 1. **Source-aware scanning** (`scan`, `continuation`)
//!    - Bracket matching and string/comment spans over real grammar tokens
//!    - A cheap reverse scan for dangling open brackets
//!    - The complete-vs-needs-another-line decision with auto-indentation
//!
//! 2. **Evaluation and session bookkeeping** (`engine`, `evaluator`,
//!    `session`, `traceback`, `linecache`)
//!    - Two-phase smart eval: expression mode first, statement fallback
//!      with trailing-expression detachment
//!    - Prompt numbering, input/output transcript, rolling result
//!      bindings (`_`, `__`, `___`, `_n`)
//!    - Traceback filtering that hides the engine's own frames
//!    - A process-wide line table so interactively typed source stays
//!      available to tracebacks and introspection
//!
//! # Example
//!
//! ```rust
//! use adder::continuation::{check_input, InputStatus};
//! use adder::session::{CommandOutcome, Session};
//!
//! // `def f():` needs another line; a closed expression does not.
//! assert!(matches!(check_input("def f():", 8), InputStatus::Incomplete { .. }));
//! assert!(matches!(check_input("1 + 1", 5), InputStatus::Complete));
//!
//! let mut session = Session::default();
//! match session.run_command("20 + 22") {
//!     CommandOutcome::Value { prompt, value, .. } => {
//!         assert_eq!(prompt, 1);
//!         assert_eq!(value.repr(), "42");
//!     }
//!     other => panic!("unexpected outcome: {:?}", other),
//! }
//! ```

pub mod continuation;
pub mod engine;
pub mod evaluator;
pub mod linecache;
pub mod repl;
pub mod scan;
pub mod session;
pub mod traceback;

pub use continuation::{check_input, normalize, InputStatus};
pub use evaluator::{evaluate, EngineError, EvalOutcome};
pub use repl::ReplConfig;
pub use scan::{has_unclosed_brackets, ScanError, Scanner};
pub use session::{CommandOutcome, Session, SessionConfig};
pub use traceback::TracebackFilter;
