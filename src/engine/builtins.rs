//! Builtin functions, exception classes, and the method set for the
//! builtin types.
//!
//! Name resolution falls back here after the local and global scopes, so
//! user bindings shadow builtins.

use std::rc::Rc;

use super::interp::{Machine, RuntimeError};
use super::value::{values_cmp, values_equal, DictKey, ExceptionValue, Value};

pub struct BuiltinFn {
    pub name: &'static str,
    pub func: fn(&mut Machine, &[Value]) -> Result<Value, RuntimeError>,
}

static BUILTINS: &[BuiltinFn] = &[
    BuiltinFn { name: "print", func: builtin_print },
    BuiltinFn { name: "len", func: builtin_len },
    BuiltinFn { name: "repr", func: builtin_repr },
    BuiltinFn { name: "str", func: builtin_str },
    BuiltinFn { name: "int", func: builtin_int },
    BuiltinFn { name: "float", func: builtin_float },
    BuiltinFn { name: "bool", func: builtin_bool },
    BuiltinFn { name: "type", func: builtin_type },
    BuiltinFn { name: "range", func: builtin_range },
    BuiltinFn { name: "abs", func: builtin_abs },
    BuiltinFn { name: "min", func: builtin_min },
    BuiltinFn { name: "max", func: builtin_max },
    BuiltinFn { name: "sum", func: builtin_sum },
    BuiltinFn { name: "sorted", func: builtin_sorted },
];

/// Exception classes callable as constructors and matchable in `except`
/// clauses. `Exception` matches every kind.
pub const EXCEPTION_KINDS: &[&str] = &[
    "Exception",
    "ValueError",
    "TypeError",
    "NameError",
    "AttributeError",
    "IndexError",
    "KeyError",
    "ZeroDivisionError",
    "OverflowError",
    "RuntimeError",
    "RecursionError",
    "KeyboardInterrupt",
];

pub fn lookup(name: &str) -> Option<Value> {
    if let Some(b) = BUILTINS.iter().find(|b| b.name == name) {
        return Some(Value::Builtin(b));
    }
    EXCEPTION_KINDS
        .iter()
        .find(|k| **k == name)
        .map(|k| Value::ExceptionType(k))
}

/// All builtin names, for the REPL completer.
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|b| b.name).chain(EXCEPTION_KINDS.iter().copied())
}

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "split", "join", "startswith", "endswith", "replace",
];
const LIST_METHODS: &[&str] = &["append", "pop", "extend", "count", "reverse"];
const DICT_METHODS: &[&str] = &["keys", "values", "items", "get"];

/// Attribute access on a value: data attributes on functions, bound
/// methods on the builtin container types.
pub fn attr(machine: &Machine, value: &Value, name: &str) -> Result<Value, RuntimeError> {
    match value {
        Value::Function(f) => match name {
            "__name__" => return Ok(Value::str(f.def.name.clone())),
            "__module__" => return Ok(Value::str(f.module)),
            _ => {}
        },
        Value::Exception(e) => {
            if name == "args" {
                let args = if e.message.is_empty() {
                    vec![]
                } else {
                    vec![Value::str(e.message.clone())]
                };
                return Ok(Value::Tuple(Rc::new(args)));
            }
        }
        _ => {}
    }
    let table = match value {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        _ => &[],
    };
    if let Some(method) = table.iter().find(|m| **m == name).copied() {
        return Ok(Value::Method(Rc::new(super::value::BoundMethod {
            recv: value.clone(),
            name: method,
        })));
    }
    Err(machine.raise(
        "AttributeError",
        format!("'{}' object has no attribute '{}'", value.type_name(), name),
    ))
}

pub fn call_method(
    machine: &mut Machine,
    recv: &Value,
    name: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match recv {
        Value::Str(s) => str_method(machine, s, name, args),
        Value::List(items) => list_method(machine, items, name, args),
        Value::Dict(map) => dict_method(machine, map, name, args),
        _ => Err(machine.raise(
            "TypeError",
            format!("'{}' object has no method '{}'", recv.type_name(), name),
        )),
    }
}

fn str_method(
    machine: &mut Machine,
    s: &Rc<str>,
    name: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match name {
        "upper" => {
            expect_args(machine, name, args, 0, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            expect_args(machine, name, args, 0, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" => {
            expect_args(machine, name, args, 0, 0)?;
            Ok(Value::str(s.trim()))
        }
        "split" => {
            expect_args(machine, name, args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = expect_str(machine, name, sep)?;
                    s.split(sep.as_ref()).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            expect_args(machine, name, args, 1, 1)?;
            let items = sequence(machine, &args[0])?;
            let mut parts = Vec::with_capacity(items.len());
            for item in &items {
                parts.push(expect_str(machine, name, item)?.to_string());
            }
            Ok(Value::str(parts.join(s)))
        }
        "startswith" => {
            expect_args(machine, name, args, 1, 1)?;
            let prefix = expect_str(machine, name, &args[0])?;
            Ok(Value::Bool(s.starts_with(prefix.as_ref())))
        }
        "endswith" => {
            expect_args(machine, name, args, 1, 1)?;
            let suffix = expect_str(machine, name, &args[0])?;
            Ok(Value::Bool(s.ends_with(suffix.as_ref())))
        }
        "replace" => {
            expect_args(machine, name, args, 2, 2)?;
            let from = expect_str(machine, name, &args[0])?;
            let to = expect_str(machine, name, &args[1])?;
            Ok(Value::str(s.replace(from.as_ref(), to.as_ref())))
        }
        _ => Err(machine.raise("AttributeError", format!("str has no method '{}'", name))),
    }
}

fn list_method(
    machine: &mut Machine,
    items: &super::value::ListRef,
    name: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match name {
        "append" => {
            expect_args(machine, name, args, 1, 1)?;
            items.borrow_mut().push(args[0].clone());
            Ok(Value::None)
        }
        "pop" => {
            expect_args(machine, name, args, 0, 1)?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let idx = match args.first() {
                None => len.checked_sub(1),
                Some(v) => {
                    let i = expect_int(machine, name, v)?;
                    normalize_index(i, len)
                }
            };
            match idx {
                Some(i) if i < len => Ok(items.remove(i)),
                _ => Err(machine.raise("IndexError", "pop from empty list or index out of range")),
            }
        }
        "extend" => {
            expect_args(machine, name, args, 1, 1)?;
            let extra = sequence(machine, &args[0])?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "count" => {
            expect_args(machine, name, args, 1, 1)?;
            let n = items.borrow().iter().filter(|v| values_equal(v, &args[0])).count();
            Ok(Value::Int(n as i64))
        }
        "reverse" => {
            expect_args(machine, name, args, 0, 0)?;
            items.borrow_mut().reverse();
            Ok(Value::None)
        }
        _ => Err(machine.raise("AttributeError", format!("list has no method '{}'", name))),
    }
}

fn dict_method(
    machine: &mut Machine,
    map: &super::value::DictRef,
    name: &str,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    match name {
        "keys" => {
            expect_args(machine, name, args, 0, 0)?;
            Ok(Value::list(map.borrow().keys().map(DictKey::to_value).collect()))
        }
        "values" => {
            expect_args(machine, name, args, 0, 0)?;
            Ok(Value::list(map.borrow().values().cloned().collect()))
        }
        "items" => {
            expect_args(machine, name, args, 0, 0)?;
            let items = map
                .borrow()
                .iter()
                .map(|(k, v)| Value::Tuple(Rc::new(vec![k.to_value(), v.clone()])))
                .collect();
            Ok(Value::list(items))
        }
        "get" => {
            expect_args(machine, name, args, 1, 2)?;
            let key = match DictKey::from_value(&args[0]) {
                Some(k) => k,
                None => {
                    return Err(machine.raise(
                        "TypeError",
                        format!("unhashable type: '{}'", args[0].type_name()),
                    ))
                }
            };
            match map.borrow().get(&key) {
                Some(v) => Ok(v.clone()),
                None => Ok(args.get(1).cloned().unwrap_or(Value::None)),
            }
        }
        _ => Err(machine.raise("AttributeError", format!("dict has no method '{}'", name))),
    }
}

/// Materialize an iterable into a vector of values. Dicts iterate over
/// their keys, strings over their characters.
pub fn sequence(machine: &Machine, value: &Value) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.as_ref().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Dict(map) => Ok(map.borrow().keys().map(DictKey::to_value).collect()),
        _ => Err(machine.raise(
            "TypeError",
            format!("'{}' object is not iterable", value.type_name()),
        )),
    }
}

pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    if index >= 0 {
        let i = index as usize;
        (i < len).then_some(i)
    } else {
        len.checked_sub(index.unsigned_abs() as usize)
    }
}

fn expect_args(
    machine: &Machine,
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), RuntimeError> {
    if args.len() < min || args.len() > max {
        let expected = if max == usize::MAX {
            format!("at least {}", min)
        } else if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(machine.raise(
            "TypeError",
            format!("{}() takes {} arguments but {} were given", name, expected, args.len()),
        ));
    }
    Ok(())
}

fn expect_str(machine: &Machine, name: &str, value: &Value) -> Result<Rc<str>, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        _ => Err(machine.raise(
            "TypeError",
            format!("{}() expected str, got '{}'", name, value.type_name()),
        )),
    }
}

fn expect_int(machine: &Machine, name: &str, value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(*b as i64),
        _ => Err(machine.raise(
            "TypeError",
            format!("{}() expected int, got '{}'", name, value.type_name()),
        )),
    }
}

fn builtin_print(_machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    let line: Vec<String> = args.iter().map(|v| format!("{}", v)).collect();
    println!("{}", line.join(" "));
    Ok(Value::None)
}

fn builtin_len(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "len", args, 1, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(map) => map.borrow().len(),
        other => {
            return Err(machine.raise(
                "TypeError",
                format!("object of type '{}' has no len()", other.type_name()),
            ))
        }
    };
    Ok(Value::Int(n as i64))
}

fn builtin_repr(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "repr", args, 1, 1)?;
    Ok(Value::str(args[0].repr()))
}

fn builtin_str(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "str", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::str("")),
        Some(v) => Ok(Value::str(format!("{}", v))),
    }
}

fn builtin_int(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "int", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Int(0)),
        Some(Value::Int(n)) => Ok(Value::Int(*n)),
        Some(Value::Bool(b)) => Ok(Value::Int(*b as i64)),
        Some(Value::Float(f)) => Ok(Value::Int(*f as i64)),
        Some(Value::Str(s)) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            machine.raise(
                "ValueError",
                format!("invalid literal for int() with base 10: {}", Value::str(s.as_ref()).repr()),
            )
        }),
        Some(other) => Err(machine.raise(
            "TypeError",
            format!("int() argument must be a number or str, not '{}'", other.type_name()),
        )),
    }
}

fn builtin_float(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "float", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(Value::Int(n)) => Ok(Value::Float(*n as f64)),
        Some(Value::Bool(b)) => Ok(Value::Float(*b as i64 as f64)),
        Some(Value::Float(f)) => Ok(Value::Float(*f)),
        Some(Value::Str(s)) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            machine.raise("ValueError", format!("could not convert string to float: '{}'", s))
        }),
        Some(other) => Err(machine.raise(
            "TypeError",
            format!("float() argument must be a number or str, not '{}'", other.type_name()),
        )),
    }
}

fn builtin_bool(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().map(Value::truthy).unwrap_or(false)))
}

fn builtin_type(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "type", args, 1, 1)?;
    let name = match &args[0] {
        Value::Exception(e) => e.kind.clone(),
        other => other.type_name().to_string(),
    };
    Ok(Value::str(format!("<class '{}'>", name)))
}

fn builtin_range(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "range", args, 1, 3)?;
    let mut bounds = [0i64, 0, 1];
    match args.len() {
        1 => bounds[1] = expect_int(machine, "range", &args[0])?,
        _ => {
            bounds[0] = expect_int(machine, "range", &args[0])?;
            bounds[1] = expect_int(machine, "range", &args[1])?;
            if let Some(step) = args.get(2) {
                bounds[2] = expect_int(machine, "range", step)?;
            }
        }
    }
    let [start, stop, step] = bounds;
    if step == 0 {
        return Err(machine.raise("ValueError", "range() arg 3 must not be zero"));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(Value::Int(i));
        i += step;
    }
    Ok(Value::list(out))
}

fn builtin_abs(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "abs", args, 1, 1)?;
    match &args[0] {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| machine.raise("OverflowError", "int too large to negate")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(machine.raise(
            "TypeError",
            format!("bad operand type for abs(): '{}'", other.type_name()),
        )),
    }
}

fn extremum(
    machine: &mut Machine,
    name: &str,
    args: &[Value],
    want_greater: bool,
) -> Result<Value, RuntimeError> {
    expect_args(machine, name, args, 1, usize::MAX)?;
    let candidates = if args.len() == 1 {
        sequence(machine, &args[0])?
    } else {
        args.to_vec()
    };
    let mut best: Option<Value> = None;
    for v in candidates {
        best = Some(match best {
            None => v,
            Some(b) => match values_cmp(&v, &b) {
                Some(std::cmp::Ordering::Greater) if want_greater => v,
                Some(std::cmp::Ordering::Less) if !want_greater => v,
                Some(_) => b,
                None => {
                    return Err(machine.raise(
                        "TypeError",
                        format!(
                            "'{}' not supported between instances of '{}' and '{}'",
                            if want_greater { ">" } else { "<" },
                            v.type_name(),
                            b.type_name()
                        ),
                    ))
                }
            },
        });
    }
    best.ok_or_else(|| machine.raise("ValueError", format!("{}() arg is an empty sequence", name)))
}

fn builtin_min(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    extremum(machine, "min", args, false)
}

fn builtin_max(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    extremum(machine, "max", args, true)
}

fn builtin_sum(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "sum", args, 1, 2)?;
    let items = sequence(machine, &args[0])?;
    let mut acc = args.get(1).cloned().unwrap_or(Value::Int(0));
    for item in items {
        acc = match (&acc, &item) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| machine.raise("OverflowError", "integer addition overflow"))?,
            (Value::Int(a), Value::Float(b)) => Value::Float(*a as f64 + b),
            (Value::Float(a), Value::Int(b)) => Value::Float(a + *b as f64),
            (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
            _ => {
                return Err(machine.raise(
                    "TypeError",
                    format!("unsupported operand type(s) for +: '{}'", item.type_name()),
                ))
            }
        };
    }
    Ok(acc)
}

fn builtin_sorted(machine: &mut Machine, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_args(machine, "sorted", args, 1, 1)?;
    let mut items = sequence(machine, &args[0])?;
    let mut failed = None;
    items.sort_by(|a, b| match values_cmp(a, b) {
        Some(ord) => ord,
        None => {
            failed = Some((a.type_name(), b.type_name()));
            std::cmp::Ordering::Equal
        }
    });
    if let Some((a, b)) = failed {
        return Err(machine.raise(
            "TypeError",
            format!("'<' not supported between instances of '{}' and '{}'", b, a),
        ));
    }
    Ok(Value::list(items))
}

/// Exception constructor used for both `ValueError("boom")` calls and
/// `except` binding.
pub fn make_exception(kind: &str, message: impl Into<String>) -> Value {
    Value::Exception(Rc::new(ExceptionValue { kind: kind.to_string(), message: message.into() }))
}
