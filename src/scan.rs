//! Source-aware lexical scanning.
//!
//! Bracket matching and string/comment classification walk the tokens of
//! a real Tree-Sitter parse, so a closing bracket inside a string literal
//! is never treated as a bracket. A second, deliberately cheap scanner
//! answers the single-keystroke question "does this text end with a
//! dangling open bracket?" with a regex strip and a reverse scan.

use std::sync::OnceLock;

use regex::Regex;
use smallvec::SmallVec;
use thiserror::Error;
use tree_sitter::{Node, Parser};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    /// The queried position is past the end of the text. A loud contract
    /// violation, never clamped.
    #[error("position {row}:{col} is past the end of the text")]
    OutOfRange { row: usize, col: usize },
    #[error("python grammar failed to load: {0}")]
    Grammar(String),
}

/// 1-based row, 0-based byte column, matching the grammar's diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(row: usize, col: usize) -> Pos {
        Pos { row, col }
    }

    fn from_point(p: tree_sitter::Point) -> Pos {
        Pos { row: p.row + 1, col: p.column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Code,
    Str,
    Comment,
}

/// A classified span of source text. Regions never overlap and together
/// cover the whole text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub start: Pos,
    pub end: Pos,
    /// True for a string still open at end of text.
    pub open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    Paren,
    Square,
    Curly,
}

impl BracketKind {
    fn classify(token: &str) -> Option<(BracketKind, bool)> {
        match token {
            "(" => Some((BracketKind::Paren, false)),
            ")" => Some((BracketKind::Paren, true)),
            "[" => Some((BracketKind::Square, false)),
            "]" => Some((BracketKind::Square, true)),
            "{" => Some((BracketKind::Curly, false)),
            "}" => Some((BracketKind::Curly, true)),
            _ => None,
        }
    }
}

/// A single bracket token at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketToken {
    pub kind: BracketKind,
    pub closing: bool,
    pub pos: Pos,
}

/// Output of [`Scanner::match_brackets`]: properly nested pairs plus every
/// bracket that has no partner.
#[derive(Debug, Default)]
pub struct BracketReport {
    pub pairs: Vec<(BracketToken, BracketToken)>,
    pub unmatched: Vec<BracketToken>,
}

struct Lexed {
    regions: Vec<Region>,
    brackets: Vec<BracketToken>,
}

pub struct Scanner {
    parser: Parser,
}

impl Scanner {
    pub fn new() -> Result<Scanner, ScanError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ScanError::Grammar(e.to_string()))?;
        Ok(Scanner { parser })
    }

    /// Match round/square/curly brackets over real grammar tokens.
    pub fn match_brackets(&mut self, text: &str) -> Result<BracketReport, ScanError> {
        let lexed = self.lex(text)?;
        let mut report = BracketReport::default();
        let mut stack: SmallVec<[BracketToken; 8]> = SmallVec::new();
        for token in lexed.brackets {
            if !token.closing {
                stack.push(token);
                continue;
            }
            match stack.last() {
                Some(open) if open.kind == token.kind => {
                    let open = *open;
                    stack.pop();
                    report.pairs.push((open, token));
                }
                _ => report.unmatched.push(token),
            }
        }
        report.unmatched.extend(stack.drain(..));
        report.unmatched.sort_by_key(|t| t.pos);
        Ok(report)
    }

    /// Whether the 1-based row / 0-based column falls strictly inside a
    /// string literal, including one still open at end of text. Positions
    /// past the end of the last line fail with [`ScanError::OutOfRange`].
    pub fn inside_string(&mut self, text: &str, row: usize, col: usize) -> Result<bool, ScanError> {
        let last = end_of_text(text);
        if row < 1 || row > last.row || (row == last.row && col > last.col) {
            return Err(ScanError::OutOfRange { row, col });
        }
        let pos = Pos::new(row, col);
        let lexed = self.lex(text)?;
        Ok(lexed.regions.iter().any(|r| {
            r.kind == RegionKind::Str && r.start < pos && (pos < r.end || r.open)
        }))
    }

    /// The full covering classification of the text.
    pub fn token_regions(&mut self, text: &str) -> Result<Vec<Region>, ScanError> {
        let lexed = self.lex(text)?;
        Ok(cover(text, lexed.regions))
    }

    fn lex(&mut self, text: &str) -> Result<Lexed, ScanError> {
        let tree = self
            .parser
            .parse(text, None)
            .ok_or_else(|| ScanError::Grammar("parser produced no tree".to_string()))?;
        let mut walk = Walk { regions: Vec::new(), brackets: Vec::new(), open_string: None };
        walk.visit(tree.root_node());
        if let Some(start) = walk.open_string {
            walk.regions.push(Region {
                kind: RegionKind::Str,
                start,
                end: end_of_text(text),
                open: true,
            });
        }
        walk.regions.sort_by_key(|r| r.start);
        Ok(Lexed { regions: walk.regions, brackets: walk.brackets })
    }
}

struct Walk {
    regions: Vec<Region>,
    brackets: Vec<BracketToken>,
    /// Start of a `string_start` token seen outside a complete string
    /// node, i.e. an unterminated literal under error recovery.
    open_string: Option<Pos>,
}

impl Walk {
    fn visit(&mut self, node: Node) {
        if node.kind() == "string" {
            self.regions.push(Region {
                kind: RegionKind::Str,
                start: Pos::from_point(node.start_position()),
                end: Pos::from_point(node.end_position()),
                open: false,
            });
            return;
        }
        if node.child_count() == 0 {
            self.leaf(node);
            return;
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                self.visit(child);
            }
        }
    }

    fn leaf(&mut self, node: Node) {
        let kind = node.kind();
        if let Some(start) = self.open_string {
            if kind == "string_end" {
                self.regions.push(Region {
                    kind: RegionKind::Str,
                    start,
                    end: Pos::from_point(node.end_position()),
                    open: false,
                });
                self.open_string = None;
            }
            return;
        }
        match kind {
            "comment" => self.regions.push(Region {
                kind: RegionKind::Comment,
                start: Pos::from_point(node.start_position()),
                end: Pos::from_point(node.end_position()),
                open: false,
            }),
            "string_start" => {
                self.open_string = Some(Pos::from_point(node.start_position()));
            }
            _ => {
                if let Some((bracket, closing)) = BracketKind::classify(kind) {
                    self.brackets.push(BracketToken {
                        kind: bracket,
                        closing,
                        pos: Pos::from_point(node.start_position()),
                    });
                }
            }
        }
    }
}

/// Position just past the last character of the last line.
fn end_of_text(text: &str) -> Pos {
    let mut row = 1;
    let mut last_line = text;
    for (i, line) in text.split('\n').enumerate() {
        row = i + 1;
        last_line = line;
    }
    Pos::new(row, last_line.len())
}

/// Fill the gaps between classified regions with code regions so the
/// result covers the whole text.
fn cover(text: &str, special: Vec<Region>) -> Vec<Region> {
    let mut out = Vec::with_capacity(special.len() * 2 + 1);
    let mut cursor = Pos::new(1, 0);
    for region in special {
        if cursor < region.start {
            out.push(Region { kind: RegionKind::Code, start: cursor, end: region.start, open: false });
        }
        cursor = region.end.max(cursor);
        out.push(region);
    }
    let end = end_of_text(text);
    if cursor < end {
        out.push(Region { kind: RegionKind::Code, start: cursor, end, open: false });
    }
    out
}

/// Cheap completeness probe: does the text end with a dangling opening
/// bracket? Quoted strings are stripped with a regex first; this is an
/// approximation for the per-keystroke path, not a grammar-accurate scan.
pub fn has_unclosed_brackets(text: &str) -> bool {
    static STRINGS: OnceLock<Regex> = OnceLock::new();
    let strings = STRINGS.get_or_init(|| {
        Regex::new(r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'"#).expect("string pattern is valid")
    });
    let stripped = strings.replace_all(text, "");
    let mut closers: SmallVec<[char; 8]> = SmallVec::new();
    for ch in stripped.chars().rev() {
        match ch {
            ')' | ']' | '}' => closers.push(ch),
            '(' | '[' | '{' => match closers.last() {
                Some(&closer) if partner(ch) == closer => {
                    closers.pop();
                }
                _ => return true,
            },
            _ => {}
        }
    }
    false
}

fn partner(opener: char) -> char {
    match opener {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}
