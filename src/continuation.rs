//! Input-completeness decisions for the accept keystroke.
//!
//! A pure function of the buffer text and cursor offset: either the input
//! is a complete command ready for evaluation, or one more physical line
//! is needed and the decider says exactly what to insert (newline, plus
//! auto-indent when not inside a string literal).

use crate::scan::has_unclosed_brackets;

pub const DEFAULT_INDENT_WIDTH: usize = 4;

/// Line contents that pull the next line back one indent level.
pub const DEDENT_KEYWORDS: &[&str] = &["pass", "continue", "break", "return", "raise"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputStatus {
    /// Submit the buffer for evaluation.
    Complete,
    /// Insert `insertion` at the cursor and keep editing.
    Incomplete { insertion: String },
}

pub fn check_input(buffer: &str, cursor: usize) -> InputStatus {
    check_input_indent(buffer, cursor, DEFAULT_INDENT_WIDTH)
}

pub fn check_input_indent(buffer: &str, cursor: usize, width: usize) -> InputStatus {
    let before = buffer.get(..cursor).unwrap_or(buffer);
    let line = current_line(before);

    // Inside an unterminated triple-quoted string the newline is content;
    // insert it verbatim, no indent.
    if open_triple_quote(before) {
        return InputStatus::Incomplete { insertion: "\n".to_string() };
    }
    // A multi-line buffer keeps growing until the user submits on a blank
    // line.
    if before.contains('\n') && !line.trim().is_empty() {
        return incomplete(line, width);
    }
    if line.trim_end().ends_with(':') {
        return incomplete(line, width);
    }
    if cursor >= buffer.len() && has_unclosed_brackets(before) {
        return incomplete(line, width);
    }
    // A lone decorator line must be followed by a definition.
    if !before.contains('\n') && before.trim_start().starts_with('@') {
        return incomplete(line, width);
    }
    if before.ends_with('\\') {
        return incomplete(line, width);
    }
    InputStatus::Complete
}

fn incomplete(line: &str, width: usize) -> InputStatus {
    InputStatus::Incomplete { insertion: format!("\n{}", auto_indent(line, width)) }
}

fn current_line(text: &str) -> &str {
    text.rsplit('\n').next().unwrap_or("")
}

/// Indentation for the next line: the current line's leading whitespace,
/// one level out after a de-indenting keyword, one level in after `:`.
pub fn auto_indent(line: &str, width: usize) -> String {
    let head_len = line.len() - line.trim_start().len();
    let mut indent = line[..head_len].to_string();
    let content = line.trim();
    if DEDENT_KEYWORDS.contains(&content) {
        if indent.ends_with('\t') {
            indent.pop();
        } else {
            let spaces = indent.chars().rev().take_while(|c| *c == ' ').count().min(width);
            indent.truncate(indent.len() - spaces);
        }
    }
    if line.trim_end().ends_with(':') {
        indent.push_str(&" ".repeat(width));
    }
    indent
}

/// Does the text end inside an unterminated triple-quoted string? Tracked
/// by scanning for triple-quote delimiters and toggling an open flag,
/// with the closing delimiter matched to the opener's kind.
pub fn open_triple_quote(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut open: Option<&[u8]> = None;
    let mut i = 0;
    while i + 3 <= bytes.len() {
        let chunk = &bytes[i..i + 3];
        match open {
            None if chunk == b"'''" || chunk == b"\"\"\"" => {
                open = Some(&bytes[i..i + 3]);
                i += 3;
            }
            Some(delim) if chunk == delim => {
                open = None;
                i += 3;
            }
            _ => i += 1,
        }
    }
    open.is_some()
}

/// Strip the common leading whitespace and surrounding blank space from a
/// command. Applied once before evaluation; idempotent.
pub fn normalize(text: &str) -> String {
    dedent(text).trim().to_string()
}

fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = &line[..line.len() - line.trim_start().len()];
        margin = Some(match margin {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
    }
    let margin = match margin {
        Some(m) if !m.is_empty() => m,
        _ => return text.to_string(),
    };
    let mut out = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            out.push("");
        } else {
            out.push(line.strip_prefix(margin).unwrap_or(line));
        }
    }
    out.join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(buffer: &str) -> bool {
        check_input(buffer, buffer.len()) == InputStatus::Complete
    }

    fn insertion(buffer: &str) -> String {
        match check_input(buffer, buffer.len()) {
            InputStatus::Incomplete { insertion } => insertion,
            InputStatus::Complete => panic!("expected incomplete for {:?}", buffer),
        }
    }

    #[test]
    fn test_simple_expression_is_complete() {
        assert!(complete("1 + 1"));
        assert!(complete("print('hi')"));
        assert!(complete(""));
    }

    #[test]
    fn test_colon_line_continues_with_extra_indent() {
        assert_eq!(insertion("def f():"), "\n    ");
        assert_eq!(insertion("if x:"), "\n    ");
    }

    #[test]
    fn test_block_body_continues_until_blank_line() {
        assert_eq!(insertion("def f():\n    x = 1"), "\n    ");
        assert!(complete("def f():\n    pass\n"));
    }

    #[test]
    fn test_dedent_keyword_pulls_back() {
        assert_eq!(insertion("def f():\n    pass"), "\n");
        assert_eq!(insertion("while x:\n        continue"), "\n    ");
        assert_eq!(insertion("def f():\n    return 1"), "\n    ");
    }

    #[test]
    fn test_unclosed_bracket_continues() {
        assert_eq!(insertion("(1, 2,"), "\n");
        assert!(complete("(1, 2)"));
    }

    #[test]
    fn test_bracket_rule_needs_cursor_at_end() {
        assert_eq!(check_input("(1, 2,", 3), InputStatus::Complete);
    }

    #[test]
    fn test_unterminated_triple_quote_inserts_verbatim_newline() {
        assert_eq!(insertion("'''abc"), "\n");
        assert_eq!(insertion("x = \"\"\"doc"), "\n");
        // bracket state is irrelevant inside the string
        assert_eq!(insertion("('''abc"), "\n");
    }

    #[test]
    fn test_closed_triple_quote_is_complete() {
        assert!(complete("'''abc'''"));
        assert!(!open_triple_quote("'''a''' + '''b'''"));
        assert!(open_triple_quote("'''contains \"\"\" inside"));
    }

    #[test]
    fn test_decorator_line_continues() {
        assert_eq!(insertion("@trace"), "\n");
        assert!(complete("@trace\ndef f():\n    pass\n"));
    }

    #[test]
    fn test_backslash_continuation() {
        assert_eq!(insertion("total = 1 + \\"), "\n");
    }

    #[test]
    fn test_blank_line_inside_string_stays_open() {
        let buffer = "s = '''\n\n";
        assert_eq!(insertion(buffer), "\n");
    }

    #[test]
    fn test_auto_indent_copies_leading_whitespace() {
        assert_eq!(auto_indent("        x = 1", 4), "        ");
        assert_eq!(auto_indent("    if y:", 4), "        ");
        assert_eq!(auto_indent("    pass", 4), "");
        assert_eq!(auto_indent("\t\tpass", 4), "\t");
    }

    #[test]
    fn test_normalize_dedents_and_trims() {
        assert_eq!(normalize("    x = 1\n    y = 2"), "x = 1\ny = 2");
        assert_eq!(normalize("  if x:\n      y\n"), "if x:\n    y");
        assert_eq!(normalize("\n\n1 + 1\n\n"), "1 + 1");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let cases = ["x = 1", "if x:\n    y = 2", "def f():\n    return 1\n\nf()"];
        for case in cases {
            let once = normalize(case);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_normalize_keeps_relative_indent() {
        let normalized = normalize("    def f():\n        return 1");
        assert_eq!(normalized, "def f():\n    return 1");
    }
}
