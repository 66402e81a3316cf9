//! Traceback capture and filtering.
//!
//! Raised errors carry the interpreter's frame stack. Before display, the
//! filter drops frames that belong to the engine's own pseudo-files so
//! reports show only user code; debug mode turns the filtering off.

use std::rc::Rc;

use itertools::Itertools;

use crate::engine::interp::{RuntimeError, RUNTIME_FILE};
use crate::engine::CompileError;
use crate::linecache;

/// One call-stack entry, oldest call first in a traceback.
#[derive(Debug, Clone)]
pub struct Frame {
    pub filename: Rc<str>,
    pub line: u32,
    pub name: String,
}

impl Frame {
    pub fn new(filename: Rc<str>, line: u32, name: impl Into<String>) -> Frame {
        Frame { filename, line, name: name.into() }
    }

    /// A frame belonging to the engine itself.
    pub fn internal(name: impl Into<String>) -> Frame {
        Frame { filename: Rc::from(RUNTIME_FILE), line: 0, name: name.into() }
    }
}

pub struct TracebackFilter {
    debug: bool,
    internal_files: Vec<String>,
}

impl TracebackFilter {
    pub fn new(debug: bool) -> TracebackFilter {
        TracebackFilter { debug, internal_files: vec![RUNTIME_FILE.to_string()] }
    }

    /// Register another engine-internal pseudo-file to filter out.
    pub fn add_internal_file(&mut self, filename: impl Into<String>) {
        self.internal_files.push(filename.into());
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn is_internal(&self, frame: &Frame) -> bool {
        self.internal_files.iter().any(|f| f.as_str() == frame.filename.as_ref())
    }

    /// Frames to show, in original order.
    pub fn visible_frames<'a>(&self, frames: &'a [Frame]) -> Vec<&'a Frame> {
        frames
            .iter()
            .filter(|f| self.debug || !self.is_internal(f))
            .collect()
    }

    /// Render a raised error with its chain, oldest exception first.
    pub fn render(&self, err: &RuntimeError) -> String {
        let mut out = String::new();
        self.render_one(&mut out, err);
        out
    }

    fn render_one(&self, out: &mut String, err: &RuntimeError) {
        if let Some(cause) = &err.cause {
            self.render_one(out, cause);
            out.push_str(
                "\nThe above exception was the direct cause of the following exception:\n\n",
            );
        } else if let Some(context) = &err.context {
            self.render_one(out, context);
            out.push_str(
                "\nDuring handling of the above exception, another exception occurred:\n\n",
            );
        }
        let frames = self.visible_frames(&err.frames);
        if !frames.is_empty() {
            out.push_str("Traceback (most recent call last):\n");
            let body = frames
                .iter()
                .map(|f| {
                    let mut entry =
                        format!("  File \"{}\", line {}, in {}", f.filename, f.line, f.name);
                    if let Some(src) = linecache::line(&f.filename, f.line as usize) {
                        if !src.trim().is_empty() {
                            entry.push_str(&format!("\n    {}", src.trim()));
                        }
                    }
                    entry
                })
                .join("\n");
            out.push_str(&body);
            out.push('\n');
        }
        out.push_str(&err.to_string());
    }

    /// Render a compile failure in the same report style.
    pub fn render_syntax(&self, err: &CompileError, filename: &str) -> String {
        match err {
            CompileError::Grammar(msg) => format!("SyntaxError: {}", msg),
            _ => format!(
                "  File \"{}\", line {}\nSyntaxError: {}",
                filename,
                err.line(),
                err.detail()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_error() -> RuntimeError {
        RuntimeError {
            kind: "ValueError".to_string(),
            message: "boom".to_string(),
            frames: vec![
                Frame::internal("run"),
                Frame::new(Rc::from("<adder#1>"), 1, "<module>"),
                Frame::new(Rc::from("<adder#1>"), 2, "helper"),
            ],
            cause: None,
            context: None,
        }
    }

    #[test]
    fn test_internal_frames_filtered() {
        let filter = TracebackFilter::new(false);
        let report = filter.render(&sample_error());
        assert!(!report.contains(RUNTIME_FILE));
        assert!(report.contains("in <module>"));
        assert!(report.contains("in helper"));
        assert!(report.ends_with("ValueError: boom"));
    }

    #[test]
    fn test_debug_mode_keeps_internal_frames() {
        let filter = TracebackFilter::new(true);
        let report = filter.render(&sample_error());
        assert!(report.contains(RUNTIME_FILE));
    }

    #[test]
    fn test_frame_order_preserved() {
        let filter = TracebackFilter::new(false);
        let report = filter.render(&sample_error());
        let module_at = report.find("in <module>").unwrap();
        let helper_at = report.find("in helper").unwrap();
        assert!(module_at < helper_at);
    }

    #[test]
    fn test_cause_chain_rendered_first() {
        let mut err = sample_error();
        err.cause = Some(Box::new(RuntimeError {
            kind: "TypeError".to_string(),
            message: "origin".to_string(),
            frames: vec![Frame::new(Rc::from("<adder#1>"), 1, "<module>")],
            cause: None,
            context: None,
        }));
        let filter = TracebackFilter::new(false);
        let report = filter.render(&err);
        let origin_at = report.find("TypeError: origin").unwrap();
        let top_at = report.find("ValueError: boom").unwrap();
        assert!(origin_at < top_at);
        assert!(report.contains("direct cause"));
    }

    #[test]
    fn test_context_chain_wording() {
        let mut err = sample_error();
        err.context = Some(Box::new(RuntimeError {
            kind: "ZeroDivisionError".to_string(),
            message: "division by zero".to_string(),
            frames: vec![],
            cause: None,
            context: None,
        }));
        let filter = TracebackFilter::new(false);
        let report = filter.render(&err);
        assert!(report.contains("During handling of the above exception"));
    }

    #[test]
    fn test_extra_internal_file() {
        let mut filter = TracebackFilter::new(false);
        filter.add_internal_file("<adder-bootstrap>");
        let frame = Frame::new(Rc::from("<adder-bootstrap>"), 3, "boot");
        assert!(filter.is_internal(&frame));
    }
}
