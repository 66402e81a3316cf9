//! Dynamic value model for the engine.
//!
//! Containers (`List`, `Dict`) are reference-counted and mutable in place,
//! so they have object identity: two handles cloned from the same value
//! observe each other's mutations. The session's transcript bindings rely
//! on that identity when restoring deleted names.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ast::FunctionDef;
use super::builtins::BuiltinFn;

/// The single mutable name-to-value mapping used as both global and local
/// scope for top-level execution.
pub type Namespace = Rc<RefCell<IndexMap<String, Value>>>;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<IndexMap<DictKey, Value>>>;

pub fn new_namespace() -> Namespace {
    Rc::new(RefCell::new(IndexMap::new()))
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(ListRef),
    Tuple(Rc<Vec<Value>>),
    Dict(DictRef),
    Function(Rc<Function>),
    Builtin(&'static BuiltinFn),
    Method(Rc<BoundMethod>),
    /// A builtin exception class such as `ValueError`; calling it makes an
    /// `Exception` value.
    ExceptionType(&'static str),
    Exception(Rc<ExceptionValue>),
}

/// A function defined by user code.
pub struct Function {
    pub def: Rc<FunctionDef>,
    /// The namespace the function was defined in; lookups fall back to it,
    /// so interactively defined functions see names bound later.
    pub globals: Namespace,
    /// Default values, evaluated once at definition time.
    pub defaults: Vec<Value>,
    /// Virtual filename of the defining source.
    pub filename: Rc<str>,
    /// Interactive definitions report the main program scope, exactly as
    /// file-run top-level code does.
    pub module: &'static str,
}

pub struct BoundMethod {
    pub recv: Value,
    pub name: &'static str,
}

pub struct ExceptionValue {
    pub kind: String,
    pub message: String,
}

/// Hashable dict key subset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    Int(i64),
    Str(Rc<str>),
    Bool(bool),
}

impl DictKey {
    pub fn to_value(&self) -> Value {
        match self {
            DictKey::Int(n) => Value::Int(*n),
            DictKey::Str(s) => Value::Str(s.clone()),
            DictKey::Bool(b) => Value::Bool(*b),
        }
    }

    pub fn from_value(value: &Value) -> Option<DictKey> {
        match value {
            Value::Int(n) => Some(DictKey::Int(*n)),
            Value::Str(s) => Some(DictKey::Str(s.clone())),
            Value::Bool(b) => Some(DictKey::Bool(*b)),
            _ => None,
        }
    }

    pub fn repr(&self) -> String {
        self.to_value().repr()
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        let s: String = s.into();
        Value::Str(Rc::from(s.as_str()))
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(_) => "builtin_function_or_method",
            Value::ExceptionType(_) => "type",
            Value::Exception(_) => "Exception",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }

    /// The developer-facing form: strings quoted, containers recursive.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => fmt_float(*f),
            Value::Str(s) => repr_str(s),
            Value::List(items) => {
                let inner: Vec<String> = items.borrow().iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                if inner.len() == 1 {
                    format!("({},)", inner[0])
                } else {
                    format!("({})", inner.join(", "))
                }
            }
            Value::Dict(map) => {
                let inner: Vec<String> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Function(f) => format!("<function {}>", f.def.name),
            Value::Builtin(b) => format!("<built-in function {}>", b.name),
            Value::Method(m) => {
                format!("<built-in method {} of {} object>", m.name, m.recv.type_name())
            }
            Value::ExceptionType(kind) => format!("<class '{}'>", kind),
            Value::Exception(e) => format!("{}({})", e.kind, repr_str(&e.message)),
        }
    }
}

fn repr_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Floats always show a decimal point, matching the host language's echo.
pub fn fmt_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Exception(e) if !e.message.is_empty() => write!(f, "{}", e.message),
            other => write!(f, "{}", other.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

/// Structural equality with numeric promotion, as the surface language
/// defines `==`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        (Value::Bool(x), Value::Int(y)) | (Value::Int(y), Value::Bool(x)) => (*x as i64) == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Tuple(x), Value::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => std::ptr::eq(*x, *y),
        (Value::ExceptionType(x), Value::ExceptionType(y)) => x == y,
        (Value::Exception(x), Value::Exception(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Ordering for `<`-family operators. `None` means the pair is unordered
/// and the caller should raise a type error.
pub fn values_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            seq_cmp(&x, &y)
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_cmp(x, y),
        _ => None,
    }
}

fn seq_cmp(x: &[Value], y: &[Value]) -> Option<std::cmp::Ordering> {
    for (a, b) in x.iter().zip(y.iter()) {
        if values_equal(a, b) {
            continue;
        }
        return values_cmp(a, b);
    }
    Some(x.len().cmp(&y.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr_scalars() {
        assert_eq!(Value::Int(42).repr(), "42");
        assert_eq!(Value::Float(2.0).repr(), "2.0");
        assert_eq!(Value::Float(2.5).repr(), "2.5");
        assert_eq!(Value::Bool(true).repr(), "True");
        assert_eq!(Value::None.repr(), "None");
        assert_eq!(Value::str("a'b\n").repr(), "'a\\'b\\n'");
    }

    #[test]
    fn test_repr_containers() {
        let v = Value::list(vec![Value::Int(1), Value::str("x")]);
        assert_eq!(v.repr(), "[1, 'x']");
        let t = Value::Tuple(Rc::new(vec![Value::Int(1)]));
        assert_eq!(t.repr(), "(1,)");
    }

    #[test]
    fn test_numeric_equality_promotes() {
        assert!(values_equal(&Value::Int(1), &Value::Float(1.0)));
        assert!(values_equal(&Value::Bool(true), &Value::Int(1)));
        assert!(!values_equal(&Value::Int(1), &Value::str("1")));
    }

    #[test]
    fn test_cmp_rejects_mixed_kinds() {
        assert!(values_cmp(&Value::Int(1), &Value::str("a")).is_none());
        assert_eq!(
            values_cmp(&Value::Int(1), &Value::Float(2.0)),
            Some(std::cmp::Ordering::Less)
        );
    }

    #[test]
    fn test_list_identity_shared() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        if let (Value::List(x), Value::List(y)) = (&a, &b) {
            x.borrow_mut().push(Value::Int(2));
            assert_eq!(y.borrow().len(), 2);
        } else {
            panic!("expected lists");
        }
    }
}
