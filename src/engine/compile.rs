//! Tree-Sitter based compiler front end.
//!
//! Parses source with the real Python grammar and lowers the parse tree
//! into the engine's statement AST. Two modes mirror the host compile
//! capability: a single bare expression, or a whole module body.

use std::rc::Rc;

use thiserror::Error;
use tree_sitter::{Node, Parser};

use super::ast::{
    BinOp, BoolOp, CmpOp, Expr, ExprKind, FunctionDef, Handler, Param, Stmt, StmtKind, Target,
    UnaryOp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Exactly one bare expression; anything else is a compile failure.
    Expression,
    /// A sequence of statements.
    Module,
}

/// A compiled unit, ready for the interpreter.
#[derive(Debug, Clone)]
pub struct Program {
    pub filename: Rc<str>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("line {line}: {message}")]
    Syntax { message: String, line: usize },
    #[error("line {line}: unsupported construct: {construct}")]
    Unsupported { construct: String, line: usize },
    #[error("python grammar failed to load: {0}")]
    Grammar(String),
}

impl CompileError {
    pub fn line(&self) -> usize {
        match self {
            CompileError::Syntax { line, .. } | CompileError::Unsupported { line, .. } => *line,
            CompileError::Grammar(_) => 0,
        }
    }

    /// The diagnostic text without the line prefix.
    pub fn detail(&self) -> String {
        match self {
            CompileError::Syntax { message, .. } => message.clone(),
            CompileError::Unsupported { construct, .. } => {
                format!("unsupported construct: {}", construct)
            }
            CompileError::Grammar(msg) => msg.clone(),
        }
    }
}

pub fn compile(source: &str, filename: &str, mode: CompileMode) -> Result<Program, CompileError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| CompileError::Grammar(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CompileError::Grammar("parser produced no tree".to_string()))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(syntax_error(root, source));
    }
    let body = lower_module(root, source)?;
    if mode == CompileMode::Expression {
        if body.len() != 1 || !matches!(body[0].kind, StmtKind::Expr(_)) {
            return Err(CompileError::Syntax {
                message: "not a single expression".to_string(),
                line: 1,
            });
        }
    }
    Ok(Program { filename: Rc::from(filename), body })
}

fn syntax_error(root: Node, source: &str) -> CompileError {
    let node = first_error(root).unwrap_or(root);
    let line = node.start_position().row + 1;
    let message = if node.is_missing() {
        format!("expected {}", node.kind())
    } else {
        let snippet: String = text(node, source).chars().take(20).collect();
        if snippet.trim().is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("invalid syntax near '{}'", snippet.trim())
        }
    };
    CompileError::Syntax { message, line }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    Some(node)
}

fn text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

fn unsupported(node: Node) -> CompileError {
    CompileError::Unsupported {
        construct: node.kind().replace('_', " "),
        line: line_of(node) as usize,
    }
}

fn lower_module(root: Node, source: &str) -> Result<Vec<Stmt>, CompileError> {
    let mut body = Vec::new();
    for child in named_children(root) {
        lower_statement(child, source, &mut body)?;
    }
    Ok(body)
}

fn lower_block(node: Node, source: &str) -> Result<Vec<Stmt>, CompileError> {
    let mut body = Vec::new();
    for child in named_children(node) {
        lower_statement(child, source, &mut body)?;
    }
    Ok(body)
}

fn lower_statement(node: Node, source: &str, out: &mut Vec<Stmt>) -> Result<(), CompileError> {
    let line = line_of(node);
    let kind = match node.kind() {
        "comment" => return Ok(()),
        "expression_statement" => {
            let inner = named_children(node);
            let inner = match inner.first() {
                Some(n) => *n,
                None => return Ok(()),
            };
            match inner.kind() {
                "assignment" => lower_assignment(inner, source)?,
                "augmented_assignment" => lower_aug_assignment(inner, source)?,
                _ => StmtKind::Expr(lower_expr(inner, source)?),
            }
        }
        "if_statement" => lower_if(node, source)?,
        "while_statement" => {
            let cond = field_expr(node, "condition", source)?;
            let body = lower_block(field_node(node, "body")?, source)?;
            StmtKind::While { cond, body }
        }
        "for_statement" => {
            let left = field_node(node, "left")?;
            if left.kind() != "identifier" {
                return Err(unsupported(left));
            }
            let iter = field_expr(node, "right", source)?;
            let body = lower_block(field_node(node, "body")?, source)?;
            StmtKind::For { var: text(left, source).to_string(), iter, body }
        }
        "function_definition" => StmtKind::FunctionDef(lower_function(node, source, Vec::new())?),
        "decorated_definition" => {
            let mut decorators = Vec::new();
            for child in named_children(node) {
                if child.kind() == "decorator" {
                    let inner = named_children(child);
                    let expr = inner.first().ok_or_else(|| unsupported(child))?;
                    decorators.push(lower_expr(*expr, source)?);
                }
            }
            let def = field_node(node, "definition")?;
            if def.kind() != "function_definition" {
                return Err(unsupported(def));
            }
            StmtKind::FunctionDef(lower_function(def, source, decorators)?)
        }
        "return_statement" => {
            let value = named_children(node)
                .first()
                .map(|n| lower_expr(*n, source))
                .transpose()?;
            StmtKind::Return(value)
        }
        "raise_statement" => {
            let cause = node
                .child_by_field_name("cause")
                .map(|n| lower_expr(n, source))
                .transpose()?;
            let exc = named_children(node)
                .into_iter()
                .find(|n| Some(n.id()) != node.child_by_field_name("cause").map(|c| c.id()))
                .map(|n| lower_expr(n, source))
                .transpose()?;
            StmtKind::Raise { exc, cause }
        }
        "delete_statement" => {
            let inner = named_children(node);
            let target = inner.first().ok_or_else(|| unsupported(node))?;
            let targets = match target.kind() {
                "expression_list" | "pattern_list" => named_children(*target)
                    .into_iter()
                    .map(|n| lower_target(n, source))
                    .collect::<Result<Vec<_>, _>>()?,
                _ => vec![lower_target(*target, source)?],
            };
            StmtKind::Delete { targets }
        }
        "try_statement" => lower_try(node, source)?,
        "pass_statement" => StmtKind::Pass,
        "break_statement" => StmtKind::Break,
        "continue_statement" => StmtKind::Continue,
        _ => return Err(unsupported(node)),
    };
    out.push(Stmt { kind, line });
    Ok(())
}

fn lower_assignment(node: Node, source: &str) -> Result<StmtKind, CompileError> {
    if node.child_by_field_name("type").is_some() {
        return Err(unsupported(node));
    }
    let left = field_node(node, "left")?;
    let right = field_node(node, "right")?;
    if right.kind() == "assignment" {
        return Err(unsupported(right));
    }
    Ok(StmtKind::Assign {
        target: lower_target(left, source)?,
        value: lower_expr(right, source)?,
    })
}

fn lower_aug_assignment(node: Node, source: &str) -> Result<StmtKind, CompileError> {
    let left = field_node(node, "left")?;
    let op_node = field_node(node, "operator")?;
    let op = match op_node.kind() {
        "+=" => BinOp::Add,
        "-=" => BinOp::Sub,
        "*=" => BinOp::Mul,
        "/=" => BinOp::Div,
        "//=" => BinOp::FloorDiv,
        "%=" => BinOp::Mod,
        "**=" => BinOp::Pow,
        _ => return Err(unsupported(op_node)),
    };
    Ok(StmtKind::AugAssign {
        target: lower_target(left, source)?,
        op,
        value: lower_expr(field_node(node, "right")?, source)?,
    })
}

fn lower_target(node: Node, source: &str) -> Result<Target, CompileError> {
    match node.kind() {
        "identifier" => Ok(Target::Name(text(node, source).to_string())),
        "subscript" => {
            let value = lower_expr(field_node(node, "value")?, source)?;
            let index = lower_expr(field_node(node, "subscript")?, source)?;
            Ok(Target::Subscript { value, index })
        }
        _ => Err(unsupported(node)),
    }
}

fn lower_if(node: Node, source: &str) -> Result<StmtKind, CompileError> {
    let mut branches = vec![(
        field_expr(node, "condition", source)?,
        lower_block(field_node(node, "consequence")?, source)?,
    )];
    let mut orelse = Vec::new();
    let mut cursor = node.walk();
    for alt in node.children_by_field_name("alternative", &mut cursor) {
        match alt.kind() {
            "elif_clause" => branches.push((
                field_expr(alt, "condition", source)?,
                lower_block(field_node(alt, "consequence")?, source)?,
            )),
            "else_clause" => {
                let block = named_children(alt);
                let block = block.first().ok_or_else(|| unsupported(alt))?;
                orelse = lower_block(*block, source)?;
            }
            _ => return Err(unsupported(alt)),
        }
    }
    Ok(StmtKind::If { branches, orelse })
}

fn lower_function(
    node: Node,
    source: &str,
    decorators: Vec<Expr>,
) -> Result<Rc<FunctionDef>, CompileError> {
    let name = text(field_node(node, "name")?, source).to_string();
    let mut params = Vec::new();
    for p in named_children(field_node(node, "parameters")?) {
        match p.kind() {
            "identifier" => {
                params.push(Param { name: text(p, source).to_string(), default: None });
            }
            "default_parameter" => {
                let pname = field_node(p, "name")?;
                if pname.kind() != "identifier" {
                    return Err(unsupported(pname));
                }
                params.push(Param {
                    name: text(pname, source).to_string(),
                    default: Some(lower_expr(field_node(p, "value")?, source)?),
                });
            }
            _ => return Err(unsupported(p)),
        }
    }
    let body = lower_block(field_node(node, "body")?, source)?;
    Ok(Rc::new(FunctionDef { name, params, body, decorators, line: line_of(node) }))
}

fn lower_try(node: Node, source: &str) -> Result<StmtKind, CompileError> {
    let body = lower_block(field_node(node, "body")?, source)?;
    let mut handlers = Vec::new();
    let mut orelse = Vec::new();
    let mut finally = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "except_clause" => {
                let parts = named_children(child);
                let block = parts
                    .iter()
                    .rev()
                    .find(|n| n.kind() == "block")
                    .ok_or_else(|| unsupported(child))?;
                let mut kind = None;
                let mut alias = None;
                if let Some(matcher) = parts.iter().find(|n| n.kind() != "block") {
                    match matcher.kind() {
                        "identifier" => kind = Some(text(*matcher, source).to_string()),
                        "as_pattern" => {
                            let inner = named_children(*matcher);
                            let ty = inner.first().ok_or_else(|| unsupported(*matcher))?;
                            if ty.kind() != "identifier" {
                                return Err(unsupported(*ty));
                            }
                            kind = Some(text(*ty, source).to_string());
                            if let Some(target) = inner.get(1) {
                                alias = Some(text(*target, source).to_string());
                            }
                        }
                        _ => return Err(unsupported(*matcher)),
                    }
                }
                handlers.push(Handler {
                    kind,
                    alias,
                    body: lower_block(*block, source)?,
                    line: line_of(child),
                });
            }
            "else_clause" => {
                let block = named_children(child);
                let block = block.first().ok_or_else(|| unsupported(child))?;
                orelse = lower_block(*block, source)?;
            }
            "finally_clause" => {
                let block = named_children(child);
                let block = block.first().ok_or_else(|| unsupported(child))?;
                finally = lower_block(*block, source)?;
            }
            _ => {}
        }
    }
    if handlers.is_empty() && finally.is_empty() {
        return Err(unsupported(node));
    }
    Ok(StmtKind::Try { body, handlers, orelse, finally })
}

fn field_node<'t>(node: Node<'t>, field: &str) -> Result<Node<'t>, CompileError> {
    node.child_by_field_name(field).ok_or_else(|| CompileError::Syntax {
        message: format!("malformed {} node", node.kind().replace('_', " ")),
        line: line_of(node) as usize,
    })
}

fn field_expr(node: Node, field: &str, source: &str) -> Result<Expr, CompileError> {
    lower_expr(field_node(node, field)?, source)
}

fn lower_expr(node: Node, source: &str) -> Result<Expr, CompileError> {
    let line = line_of(node);
    let kind = match node.kind() {
        "identifier" => ExprKind::Name(text(node, source).to_string()),
        "integer" => ExprKind::Int(parse_int(text(node, source), node)?),
        "float" => {
            let cleaned = text(node, source).replace('_', "");
            cleaned.parse::<f64>().map(ExprKind::Float).map_err(|_| CompileError::Syntax {
                message: format!("invalid float literal '{}'", cleaned),
                line: line as usize,
            })?
        }
        "string" => ExprKind::Str(decode_string(node, source)?),
        "concatenated_string" => {
            let mut joined = String::new();
            for part in named_children(node) {
                joined.push_str(&decode_string(part, source)?);
            }
            ExprKind::Str(joined)
        }
        "true" => ExprKind::Bool(true),
        "false" => ExprKind::Bool(false),
        "none" => ExprKind::NoneLit,
        "binary_operator" => {
            let op_node = field_node(node, "operator")?;
            let op = match op_node.kind() {
                "+" => BinOp::Add,
                "-" => BinOp::Sub,
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                "//" => BinOp::FloorDiv,
                "%" => BinOp::Mod,
                "**" => BinOp::Pow,
                _ => return Err(unsupported(op_node)),
            };
            ExprKind::Binary {
                op,
                left: Box::new(field_expr(node, "left", source)?),
                right: Box::new(field_expr(node, "right", source)?),
            }
        }
        "boolean_operator" => {
            let op = match field_node(node, "operator")?.kind() {
                "and" => BoolOp::And,
                _ => BoolOp::Or,
            };
            ExprKind::Bool2 {
                op,
                left: Box::new(field_expr(node, "left", source)?),
                right: Box::new(field_expr(node, "right", source)?),
            }
        }
        "not_operator" => ExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(field_expr(node, "argument", source)?),
        },
        "unary_operator" => {
            let op = match field_node(node, "operator")?.kind() {
                "-" => UnaryOp::Neg,
                "+" => UnaryOp::Pos,
                other => {
                    return Err(CompileError::Unsupported {
                        construct: format!("unary {}", other),
                        line: line as usize,
                    })
                }
            };
            ExprKind::Unary { op, operand: Box::new(field_expr(node, "argument", source)?) }
        }
        "comparison_operator" => lower_comparison(node, source)?,
        "conditional_expression" => {
            let parts = named_children(node);
            if parts.len() != 3 {
                return Err(unsupported(node));
            }
            ExprKind::Cond {
                then: Box::new(lower_expr(parts[0], source)?),
                cond: Box::new(lower_expr(parts[1], source)?),
                orelse: Box::new(lower_expr(parts[2], source)?),
            }
        }
        "parenthesized_expression" => {
            let inner = named_children(node);
            let inner = inner.first().ok_or_else(|| unsupported(node))?;
            return lower_expr(*inner, source);
        }
        "list" => ExprKind::List(
            named_children(node)
                .into_iter()
                .map(|n| lower_expr(n, source))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        "tuple" | "expression_list" => ExprKind::Tuple(
            named_children(node)
                .into_iter()
                .map(|n| lower_expr(n, source))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        "dictionary" => {
            let mut pairs = Vec::new();
            for pair in named_children(node) {
                if pair.kind() != "pair" {
                    return Err(unsupported(pair));
                }
                pairs.push((
                    field_expr(pair, "key", source)?,
                    field_expr(pair, "value", source)?,
                ));
            }
            ExprKind::Dict(pairs)
        }
        "subscript" => {
            let index = field_node(node, "subscript")?;
            if index.kind() == "slice" {
                return Err(unsupported(index));
            }
            ExprKind::Subscript {
                value: Box::new(field_expr(node, "value", source)?),
                index: Box::new(lower_expr(index, source)?),
            }
        }
        "attribute" => ExprKind::Attribute {
            value: Box::new(field_expr(node, "object", source)?),
            name: text(field_node(node, "attribute")?, source).to_string(),
        },
        "call" => {
            let args_node = field_node(node, "arguments")?;
            let mut args = Vec::new();
            for arg in named_children(args_node) {
                if matches!(arg.kind(), "keyword_argument" | "list_splat" | "dictionary_splat") {
                    return Err(unsupported(arg));
                }
                args.push(lower_expr(arg, source)?);
            }
            ExprKind::Call { func: Box::new(field_expr(node, "function", source)?), args }
        }
        _ => return Err(unsupported(node)),
    };
    Ok(Expr { kind, line })
}

fn lower_comparison(node: Node, source: &str) -> Result<ExprKind, CompileError> {
    let mut operands = Vec::new();
    let mut ops = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.is_named() {
            if child.kind() == "comment" {
                continue;
            }
            operands.push(child);
        } else {
            let op = match child.kind() {
                "==" => CmpOp::Eq,
                "!=" => CmpOp::NotEq,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::LtE,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::GtE,
                "in" => CmpOp::In,
                "not in" => CmpOp::NotIn,
                "is" | "is not" => {
                    return Err(CompileError::Unsupported {
                        construct: format!("'{}' comparison", child.kind()),
                        line: line_of(child) as usize,
                    })
                }
                _ => continue,
            };
            ops.push(op);
        }
    }
    if operands.len() != ops.len() + 1 || ops.is_empty() {
        return Err(unsupported(node));
    }
    let first = lower_expr(operands[0], source)?;
    let mut rest = Vec::with_capacity(ops.len());
    for (op, operand) in ops.into_iter().zip(operands.into_iter().skip(1)) {
        rest.push((op, lower_expr(operand, source)?));
    }
    Ok(ExprKind::Compare { first: Box::new(first), rest })
}

fn parse_int(raw: &str, node: Node) -> Result<i64, CompileError> {
    let cleaned = raw.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        cleaned.parse::<i64>()
    };
    parsed.map_err(|_| CompileError::Syntax {
        message: format!("integer literal '{}' out of range", raw),
        line: line_of(node) as usize,
    })
}

fn decode_string(node: Node, source: &str) -> Result<String, CompileError> {
    let mut out = String::new();
    let mut raw = false;
    let mut cursor = node.walk();
    for part in node.children(&mut cursor) {
        match part.kind() {
            "string_start" => {
                let prefix = text(part, source).to_ascii_lowercase();
                if prefix.contains('b') {
                    return Err(CompileError::Unsupported {
                        construct: "bytes literal".to_string(),
                        line: line_of(node) as usize,
                    });
                }
                raw = prefix.contains('r');
            }
            "string_content" => out.push_str(text(part, source)),
            "escape_sequence" => {
                let esc = text(part, source);
                if raw {
                    out.push_str(esc);
                } else {
                    decode_escape(esc, &mut out);
                }
            }
            "interpolation" => {
                return Err(CompileError::Unsupported {
                    construct: "f-string interpolation".to_string(),
                    line: line_of(part) as usize,
                })
            }
            _ => {}
        }
    }
    Ok(out)
}

fn decode_escape(esc: &str, out: &mut String) {
    let mut chars = esc.chars();
    let _backslash = chars.next();
    match chars.next() {
        Some('n') => out.push('\n'),
        Some('t') => out.push('\t'),
        Some('r') => out.push('\r'),
        Some('\\') => out.push('\\'),
        Some('\'') => out.push('\''),
        Some('"') => out.push('"'),
        Some('0') => out.push('\0'),
        Some('\n') => {}
        Some('x') => {
            let hex: String = chars.clone().take(2).collect();
            match u8::from_str_radix(&hex, 16) {
                Ok(byte) => out.push(byte as char),
                Err(_) => out.push_str(esc),
            }
        }
        _ => out.push_str(esc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_expression_mode() {
        let program = compile("1 + 1", "<test>", CompileMode::Expression).unwrap();
        assert_eq!(program.body.len(), 1);
        assert!(matches!(program.body[0].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn test_expression_mode_rejects_assignment() {
        let err = compile("a = 1", "<test>", CompileMode::Expression).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn test_expression_mode_rejects_multiple_statements() {
        let err = compile("a = 1; a + 1", "<test>", CompileMode::Expression).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn test_module_mode_accepts_statements() {
        let program = compile("a = 1; a + 1", "<test>", CompileMode::Module).unwrap();
        assert_eq!(program.body.len(), 2);
        assert!(matches!(program.body[0].kind, StmtKind::Assign { .. }));
        assert!(matches!(program.body[1].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn test_syntax_error_reported() {
        let err = compile("def f(:", "<test>", CompileMode::Module).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn test_unsupported_construct() {
        let err = compile("class A:\n    pass", "<test>", CompileMode::Module).unwrap_err();
        assert!(matches!(err, CompileError::Unsupported { .. }));
    }

    #[test]
    fn test_function_with_default_and_decorator() {
        let src = "@trace\ndef f(x, y=2):\n    return x + y";
        let program = compile(src, "<test>", CompileMode::Module).unwrap();
        match &program.body[0].kind {
            StmtKind::FunctionDef(def) => {
                assert_eq!(def.name, "f");
                assert_eq!(def.params.len(), 2);
                assert!(def.params[1].default.is_some());
                assert_eq!(def.decorators.len(), 1);
            }
            other => panic!("expected function definition, got {:?}", other),
        }
    }

    #[test]
    fn test_chained_comparison() {
        let program = compile("1 < 2 <= 3", "<test>", CompileMode::Expression).unwrap();
        match &program.body[0].kind {
            StmtKind::Expr(Expr { kind: ExprKind::Compare { rest, .. }, .. }) => {
                assert_eq!(rest.len(), 2);
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_string_escapes() {
        let program = compile("'a\\nb'", "<test>", CompileMode::Expression).unwrap();
        match &program.body[0].kind {
            StmtKind::Expr(Expr { kind: ExprKind::Str(s), .. }) => assert_eq!(s, "a\nb"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_try_except_lowering() {
        let src = "try:\n    risky()\nexcept ValueError as e:\n    pass\nfinally:\n    done()";
        let program = compile(src, "<test>", CompileMode::Module).unwrap();
        match &program.body[0].kind {
            StmtKind::Try { handlers, finally, .. } => {
                assert_eq!(handlers.len(), 1);
                assert_eq!(handlers[0].kind.as_deref(), Some("ValueError"));
                assert_eq!(handlers[0].alias.as_deref(), Some("e"));
                assert_eq!(finally.len(), 1);
            }
            other => panic!("expected try statement, got {:?}", other),
        }
    }
}
