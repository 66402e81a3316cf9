//! Tree-walking interpreter with call-stack tracking.
//!
//! The machine keeps a stack of frames so raised errors carry a full
//! traceback. Its own entry frames are tagged with [`RUNTIME_FILE`], which
//! the traceback filter strips from user-facing reports.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ast::{BinOp, BoolOp, CmpOp, Expr, ExprKind, Handler, Stmt, StmtKind, Target, UnaryOp};
use super::builtins;
use super::compile::Program;
use super::value::{
    new_namespace, values_cmp, values_equal, DictKey, Function, Namespace, Value,
};
use crate::traceback::Frame;

/// Pseudo-filename for the machine's own frames.
pub const RUNTIME_FILE: &str = "<adder-runtime>";

/// Shared flag polled between statements and loop iterations; setting it
/// aborts the in-flight evaluation with `KeyboardInterrupt`.
pub type InterruptFlag = Arc<AtomicBool>;

/// A raised exception: kind, message, captured frames, and the chain of
/// earlier exceptions it grew out of.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: String,
    pub message: String,
    /// Oldest call first, raise site last.
    pub frames: Vec<Frame>,
    /// Explicit `raise ... from` predecessor.
    pub cause: Option<Box<RuntimeError>>,
    /// Implicit predecessor when raised inside an `except` handler.
    pub context: Option<Box<RuntimeError>>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Statement-level control flow.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Name resolution scope: optional function locals over the globals.
/// Top-level code has no separate locals, so the one namespace acts as
/// both, and definitions see later top-level bindings.
pub struct Scope {
    locals: Option<Namespace>,
    globals: Namespace,
}

impl Scope {
    pub fn module(globals: Namespace) -> Scope {
        Scope { locals: None, globals }
    }

    fn function(locals: Namespace, globals: Namespace) -> Scope {
        Scope { locals: Some(locals), globals }
    }

    fn target(&self) -> &Namespace {
        self.locals.as_ref().unwrap_or(&self.globals)
    }

    fn get(&self, name: &str) -> Option<Value> {
        if let Some(locals) = &self.locals {
            if let Some(v) = locals.borrow().get(name) {
                return Some(v.clone());
            }
        }
        self.globals.borrow().get(name).cloned()
    }

    fn assign(&self, name: &str, value: Value) {
        self.target().borrow_mut().insert(name.to_string(), value);
    }

    fn delete(&self, name: &str) -> bool {
        self.target().borrow_mut().shift_remove(name).is_some()
    }
}

pub struct Machine {
    stack: Vec<Frame>,
    interrupt: InterruptFlag,
    recursion_limit: usize,
    /// Exceptions currently being handled, innermost last; used by bare
    /// `raise` and implicit chaining.
    handling: Vec<RuntimeError>,
}

impl Machine {
    pub fn new(recursion_limit: usize) -> Machine {
        Machine {
            stack: Vec::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
            recursion_limit,
            handling: Vec::new(),
        }
    }

    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Build an error carrying the current traceback.
    pub fn raise(&self, kind: &str, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            kind: kind.to_string(),
            message: message.into(),
            frames: self.stack.clone(),
            cause: None,
            context: None,
        }
    }

    fn set_line(&mut self, line: u32) {
        if let Some(frame) = self.stack.last_mut() {
            frame.line = line;
        }
    }

    fn poll_interrupt(&self) -> Result<(), RuntimeError> {
        if self.interrupt.load(Ordering::Relaxed) {
            self.interrupt.store(false, Ordering::Relaxed);
            return Err(self.raise("KeyboardInterrupt", ""));
        }
        Ok(())
    }

    /// Execute a module-mode program for its effects.
    pub fn exec_program(&mut self, program: &Program, ns: &Namespace) -> Result<(), RuntimeError> {
        let base = self.stack.len();
        self.stack.push(Frame::internal("run"));
        let first_line = program.body.first().map(|s| s.line).unwrap_or(1);
        self.stack.push(Frame::new(program.filename.clone(), first_line, "<module>"));
        let scope = Scope::module(ns.clone());
        let result = self.exec_block(&program.body, &scope);
        let result = match result {
            Ok(Flow::Normal) => Ok(()),
            Ok(Flow::Return(_)) => Err(self.raise("SyntaxError", "'return' outside function")),
            Ok(Flow::Break) => Err(self.raise("SyntaxError", "'break' outside loop")),
            Ok(Flow::Continue) => Err(self.raise("SyntaxError", "'continue' not properly in loop")),
            Err(e) => Err(e),
        };
        self.stack.truncate(base);
        result
    }

    /// Evaluate an expression-mode program to its value.
    pub fn eval_program(
        &mut self,
        program: &Program,
        ns: &Namespace,
    ) -> Result<Value, RuntimeError> {
        let base = self.stack.len();
        self.stack.push(Frame::internal("run"));
        let first_line = program.body.first().map(|s| s.line).unwrap_or(1);
        self.stack.push(Frame::new(program.filename.clone(), first_line, "<module>"));
        let scope = Scope::module(ns.clone());
        let result = match program.body.first() {
            Some(Stmt { kind: StmtKind::Expr(expr), .. }) => self.eval(expr, &scope),
            _ => Err(self.raise("RuntimeError", "program is not a single expression")),
        };
        self.stack.truncate(base);
        result
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &Scope) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            self.poll_interrupt()?;
            self.set_line(stmt.line);
            match &stmt.kind {
                StmtKind::Expr(expr) => {
                    self.eval(expr, scope)?;
                }
                StmtKind::Assign { target, value } => {
                    let value = self.eval(value, scope)?;
                    self.store(target, value, scope)?;
                }
                StmtKind::AugAssign { target, op, value } => {
                    let current = self.load_target(target, scope)?;
                    let rhs = self.eval(value, scope)?;
                    let updated = self.binary(*op, &current, &rhs)?;
                    self.store(target, updated, scope)?;
                }
                StmtKind::Delete { targets } => {
                    for target in targets {
                        self.delete_target(target, scope)?;
                    }
                }
                StmtKind::If { branches, orelse } => {
                    let mut taken = false;
                    for (cond, body) in branches {
                        if self.eval(cond, scope)?.truthy() {
                            match self.exec_block(body, scope)? {
                                Flow::Normal => {}
                                flow => return Ok(flow),
                            }
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        match self.exec_block(orelse, scope)? {
                            Flow::Normal => {}
                            flow => return Ok(flow),
                        }
                    }
                }
                StmtKind::While { cond, body } => loop {
                    self.poll_interrupt()?;
                    if !self.eval(cond, scope)?.truthy() {
                        break;
                    }
                    match self.exec_block(body, scope)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                },
                StmtKind::For { var, iter, body } => {
                    let iterable = self.eval(iter, scope)?;
                    let items = builtins::sequence(self, &iterable)?;
                    for item in items {
                        self.poll_interrupt()?;
                        scope.assign(var, item);
                        match self.exec_block(body, scope)? {
                            Flow::Normal | Flow::Continue => {}
                            Flow::Break => break,
                            flow @ Flow::Return(_) => return Ok(flow),
                        }
                    }
                }
                StmtKind::FunctionDef(def) => {
                    let mut defaults = Vec::new();
                    for param in &def.params {
                        if let Some(default) = &param.default {
                            defaults.push(self.eval(default, scope)?);
                        }
                    }
                    let filename = self
                        .stack
                        .last()
                        .map(|f| f.filename.clone())
                        .unwrap_or_else(|| Rc::from(RUNTIME_FILE));
                    let mut value = Value::Function(Rc::new(Function {
                        def: def.clone(),
                        globals: scope.globals.clone(),
                        defaults,
                        filename,
                        module: "__main__",
                    }));
                    for decorator in def.decorators.iter().rev() {
                        let dec = self.eval(decorator, scope)?;
                        value = self.call_value(dec, vec![value])?;
                    }
                    scope.assign(&def.name, value);
                }
                StmtKind::Return(value) => {
                    let value = match value {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::None,
                    };
                    return Ok(Flow::Return(value));
                }
                StmtKind::Raise { exc, cause } => {
                    let mut err = match exc {
                        Some(expr) => {
                            let value = self.eval(expr, scope)?;
                            self.error_from_value(value)?
                        }
                        None => match self.handling.last() {
                            Some(active) => active.clone(),
                            None => self.raise("RuntimeError", "No active exception to re-raise"),
                        },
                    };
                    if let Some(expr) = cause {
                        let value = self.eval(expr, scope)?;
                        err.cause = Some(Box::new(self.error_from_value(value)?));
                    }
                    return Err(err);
                }
                StmtKind::Try { body, handlers, orelse, finally } => {
                    let flow = self.exec_try(body, handlers, orelse, finally, scope)?;
                    match flow {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }
                StmtKind::Pass => {}
                StmtKind::Break => return Ok(Flow::Break),
                StmtKind::Continue => return Ok(Flow::Continue),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[Handler],
        orelse: &[Stmt],
        finally: &[Stmt],
        scope: &Scope,
    ) -> Result<Flow, RuntimeError> {
        let outcome = match self.exec_block(body, scope) {
            Ok(Flow::Normal) => self.exec_block(orelse, scope),
            Ok(flow) => Ok(flow),
            Err(err) => {
                let mut handled = None;
                for handler in handlers {
                    if !handler_matches(handler, &err) {
                        continue;
                    }
                    self.set_line(handler.line);
                    if let Some(alias) = &handler.alias {
                        scope.assign(alias, builtins::make_exception(&err.kind, &err.message));
                    }
                    self.handling.push(err.clone());
                    let result = self.exec_block(&handler.body, scope);
                    self.handling.pop();
                    handled = Some(match result {
                        Err(mut raised) => {
                            if raised.context.is_none() && raised.cause.is_none() {
                                raised.context = Some(Box::new(err.clone()));
                            }
                            Err(raised)
                        }
                        ok => ok,
                    });
                    break;
                }
                handled.unwrap_or(Err(err))
            }
        };
        match self.exec_block(finally, scope)? {
            Flow::Normal => outcome,
            flow => Ok(flow),
        }
    }

    fn store(&mut self, target: &Target, value: Value, scope: &Scope) -> Result<(), RuntimeError> {
        match target {
            Target::Name(name) => {
                scope.assign(name, value);
                Ok(())
            }
            Target::Subscript { value: container, index } => {
                let container = self.eval(container, scope)?;
                let index = self.eval(index, scope)?;
                self.subscript_set(&container, &index, value)
            }
        }
    }

    fn load_target(&mut self, target: &Target, scope: &Scope) -> Result<Value, RuntimeError> {
        match target {
            Target::Name(name) => scope
                .get(name)
                .ok_or_else(|| self.raise("NameError", format!("name '{}' is not defined", name))),
            Target::Subscript { value: container, index } => {
                let container = self.eval(container, scope)?;
                let index = self.eval(index, scope)?;
                self.subscript_get(&container, &index)
            }
        }
    }

    fn delete_target(&mut self, target: &Target, scope: &Scope) -> Result<(), RuntimeError> {
        match target {
            Target::Name(name) => {
                if scope.delete(name) {
                    Ok(())
                } else {
                    Err(self.raise("NameError", format!("name '{}' is not defined", name)))
                }
            }
            Target::Subscript { value: container, index } => {
                let container = self.eval(container, scope)?;
                let index = self.eval(index, scope)?;
                self.subscript_del(&container, &index)
            }
        }
    }

    fn eval(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, RuntimeError> {
        self.set_line(expr.line);
        match &expr.kind {
            ExprKind::Name(name) => scope
                .get(name)
                .or_else(|| builtins::lookup(name))
                .ok_or_else(|| self.raise("NameError", format!("name '{}' is not defined", name))),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Str(s) => Ok(Value::str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::NoneLit => Ok(Value::None),
            ExprKind::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, scope)?);
                }
                Ok(Value::list(out))
            }
            ExprKind::Tuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, scope)?);
                }
                Ok(Value::Tuple(Rc::new(out)))
            }
            ExprKind::Dict(pairs) => {
                let mut map = indexmap::IndexMap::new();
                for (key, value) in pairs {
                    let key = self.eval(key, scope)?;
                    let key = DictKey::from_value(&key).ok_or_else(|| {
                        self.raise("TypeError", format!("unhashable type: '{}'", key.type_name()))
                    })?;
                    map.insert(key, self.eval(value, scope)?);
                }
                Ok(Value::Dict(Rc::new(std::cell::RefCell::new(map))))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right)
            }
            ExprKind::Compare { first, rest } => {
                let mut prev = self.eval(first, scope)?;
                for (op, operand) in rest {
                    let next = self.eval(operand, scope)?;
                    if !self.compare(*op, &prev, &next)? {
                        return Ok(Value::Bool(false));
                    }
                    prev = next;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::Bool2 { op, left, right } => {
                let left = self.eval(left, scope)?;
                match op {
                    BoolOp::And if !left.truthy() => Ok(left),
                    BoolOp::Or if left.truthy() => Ok(left),
                    _ => self.eval(right, scope),
                }
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| {
                            self.raise("OverflowError", "int too large to negate")
                        }),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        Value::Bool(b) => Ok(Value::Int(-(b as i64))),
                        other => Err(self.raise(
                            "TypeError",
                            format!("bad operand type for unary -: '{}'", other.type_name()),
                        )),
                    },
                    UnaryOp::Pos => match value {
                        Value::Int(_) | Value::Float(_) => Ok(value),
                        Value::Bool(b) => Ok(Value::Int(b as i64)),
                        other => Err(self.raise(
                            "TypeError",
                            format!("bad operand type for unary +: '{}'", other.type_name()),
                        )),
                    },
                }
            }
            ExprKind::Cond { cond, then, orelse } => {
                if self.eval(cond, scope)?.truthy() {
                    self.eval(then, scope)
                } else {
                    self.eval(orelse, scope)
                }
            }
            ExprKind::Subscript { value, index } => {
                let container = self.eval(value, scope)?;
                let index = self.eval(index, scope)?;
                self.subscript_get(&container, &index)
            }
            ExprKind::Attribute { value, name } => {
                let value = self.eval(value, scope)?;
                builtins::attr(self, &value, name)
            }
            ExprKind::Call { func, args } => {
                let callee = self.eval(func, scope)?;
                let mut call_args = Vec::with_capacity(args.len());
                for arg in args {
                    call_args.push(self.eval(arg, scope)?);
                }
                self.call_value(callee, call_args)
            }
        }
    }

    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(f) => self.call_function(&f, args),
            Value::Builtin(b) => (b.func)(self, &args),
            Value::Method(m) => {
                let recv = m.recv.clone();
                builtins::call_method(self, &recv, m.name, &args)
            }
            Value::ExceptionType(kind) => {
                let message = match args.first() {
                    None => String::new(),
                    Some(v) => format!("{}", v),
                };
                Ok(builtins::make_exception(kind, message))
            }
            other => Err(self.raise(
                "TypeError",
                format!("'{}' object is not callable", other.type_name()),
            )),
        }
    }

    fn call_function(&mut self, f: &Rc<Function>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if self.stack.len() >= self.recursion_limit {
            return Err(self.raise("RecursionError", "maximum recursion depth exceeded"));
        }
        let params = &f.def.params;
        let first_default = params.len() - f.defaults.len();
        if args.len() > params.len() || args.len() < first_default {
            return Err(self.raise(
                "TypeError",
                format!(
                    "{}() takes {} positional arguments but {} were given",
                    f.def.name,
                    params.len(),
                    args.len()
                ),
            ));
        }
        let locals = new_namespace();
        {
            let mut map = locals.borrow_mut();
            for (i, param) in params.iter().enumerate() {
                let value = if i < args.len() {
                    args[i].clone()
                } else {
                    f.defaults[i - first_default].clone()
                };
                map.insert(param.name.clone(), value);
            }
        }
        let base = self.stack.len();
        self.stack.push(Frame::new(f.filename.clone(), f.def.line, f.def.name.clone()));
        let scope = Scope::function(locals, f.globals.clone());
        let result = self.exec_block(&f.def.body, &scope);
        let result = match result {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(_) => Ok(Value::None),
            Err(e) => Err(e),
        };
        self.stack.truncate(base);
        result
    }

    fn error_from_value(&self, value: Value) -> Result<RuntimeError, RuntimeError> {
        match value {
            Value::Exception(e) => Ok(RuntimeError {
                kind: e.kind.clone(),
                message: e.message.clone(),
                frames: self.stack.clone(),
                cause: None,
                context: None,
            }),
            Value::ExceptionType(kind) => Ok(self.raise(kind, "")),
            _ => Err(self.raise("TypeError", "exceptions must derive from BaseException")),
        }
    }

    fn compare(&self, op: CmpOp, a: &Value, b: &Value) -> Result<bool, RuntimeError> {
        use std::cmp::Ordering;
        match op {
            CmpOp::Eq => Ok(values_equal(a, b)),
            CmpOp::NotEq => Ok(!values_equal(a, b)),
            CmpOp::In => self.contains(b, a),
            CmpOp::NotIn => self.contains(b, a).map(|r| !r),
            _ => {
                let ord = values_cmp(a, b).ok_or_else(|| {
                    self.raise(
                        "TypeError",
                        format!(
                            "'{}' not supported between instances of '{}' and '{}'",
                            op.symbol(),
                            a.type_name(),
                            b.type_name()
                        ),
                    )
                })?;
                Ok(match op {
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::LtE => ord != Ordering::Greater,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::GtE => ord != Ordering::Less,
                    _ => unreachable!("handled above"),
                })
            }
        }
    }

    fn contains(&self, container: &Value, item: &Value) -> Result<bool, RuntimeError> {
        match container {
            Value::List(items) => Ok(items.borrow().iter().any(|v| values_equal(v, item))),
            Value::Tuple(items) => Ok(items.iter().any(|v| values_equal(v, item))),
            Value::Str(s) => match item {
                Value::Str(needle) => Ok(s.contains(needle.as_ref())),
                other => Err(self.raise(
                    "TypeError",
                    format!("'in <string>' requires string, not '{}'", other.type_name()),
                )),
            },
            Value::Dict(map) => match DictKey::from_value(item) {
                Some(key) => Ok(map.borrow().contains_key(&key)),
                None => Err(self
                    .raise("TypeError", format!("unhashable type: '{}'", item.type_name()))),
            },
            other => Err(self.raise(
                "TypeError",
                format!("argument of type '{}' is not iterable", other.type_name()),
            )),
        }
    }

    fn binary(&self, op: BinOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
        use Value::{Float, Int, Str};
        let type_error = || {
            self.raise(
                "TypeError",
                format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    op.symbol(),
                    a.type_name(),
                    b.type_name()
                ),
            )
        };
        // bool participates in arithmetic as 0/1
        let as_int = |v: &Value| match v {
            Int(n) => Some(*n),
            Value::Bool(x) => Some(*x as i64),
            _ => None,
        };
        let as_float = |v: &Value| match v {
            Int(n) => Some(*n as f64),
            Float(f) => Some(*f),
            Value::Bool(x) => Some(*x as i64 as f64),
            _ => None,
        };
        match op {
            BinOp::Add => match (a, b) {
                _ if as_int(a).is_some() && as_int(b).is_some() => {
                    let (x, y) = (as_int(a).unwrap_or(0), as_int(b).unwrap_or(0));
                    x.checked_add(y)
                        .map(Int)
                        .ok_or_else(|| self.raise("OverflowError", "integer addition overflow"))
                }
                (Str(x), Str(y)) => Ok(Value::str(format!("{}{}", x, y))),
                (Value::List(x), Value::List(y)) => {
                    let mut out = x.borrow().clone();
                    out.extend(y.borrow().iter().cloned());
                    Ok(Value::list(out))
                }
                (Value::Tuple(x), Value::Tuple(y)) => {
                    let mut out = x.as_ref().clone();
                    out.extend(y.iter().cloned());
                    Ok(Value::Tuple(Rc::new(out)))
                }
                _ => match (as_float(a), as_float(b)) {
                    (Some(x), Some(y)) => Ok(Float(x + y)),
                    _ => Err(type_error()),
                },
            },
            BinOp::Sub => match (as_int(a), as_int(b)) {
                (Some(x), Some(y)) => x
                    .checked_sub(y)
                    .map(Int)
                    .ok_or_else(|| self.raise("OverflowError", "integer subtraction overflow")),
                _ => match (as_float(a), as_float(b)) {
                    (Some(x), Some(y)) => Ok(Float(x - y)),
                    _ => Err(type_error()),
                },
            },
            BinOp::Mul => match (a, b) {
                _ if as_int(a).is_some() && as_int(b).is_some() => {
                    let (x, y) = (as_int(a).unwrap_or(0), as_int(b).unwrap_or(0));
                    x.checked_mul(y)
                        .map(Int)
                        .ok_or_else(|| self.raise("OverflowError", "integer multiplication overflow"))
                }
                (Str(s), Int(n)) | (Int(n), Str(s)) => {
                    Ok(Value::str(s.repeat((*n).max(0) as usize)))
                }
                (Value::List(items), Int(n)) | (Int(n), Value::List(items)) => {
                    let items = items.borrow();
                    let mut out = Vec::new();
                    for _ in 0..(*n).max(0) {
                        out.extend(items.iter().cloned());
                    }
                    Ok(Value::list(out))
                }
                _ => match (as_float(a), as_float(b)) {
                    (Some(x), Some(y)) => Ok(Float(x * y)),
                    _ => Err(type_error()),
                },
            },
            BinOp::Div => match (as_float(a), as_float(b)) {
                (Some(_), Some(y)) if y == 0.0 => {
                    Err(self.raise("ZeroDivisionError", "division by zero"))
                }
                (Some(x), Some(y)) => Ok(Float(x / y)),
                _ => Err(type_error()),
            },
            BinOp::FloorDiv => match (as_int(a), as_int(b)) {
                (Some(_), Some(0)) => {
                    Err(self.raise("ZeroDivisionError", "integer division or modulo by zero"))
                }
                (Some(x), Some(y)) => {
                    let mut q = x / y;
                    if x % y != 0 && (x < 0) != (y < 0) {
                        q -= 1;
                    }
                    Ok(Int(q))
                }
                _ => match (as_float(a), as_float(b)) {
                    (Some(_), Some(y)) if y == 0.0 => {
                        Err(self.raise("ZeroDivisionError", "float floor division by zero"))
                    }
                    (Some(x), Some(y)) => Ok(Float((x / y).floor())),
                    _ => Err(type_error()),
                },
            },
            BinOp::Mod => match (as_int(a), as_int(b)) {
                (Some(_), Some(0)) => {
                    Err(self.raise("ZeroDivisionError", "integer division or modulo by zero"))
                }
                (Some(x), Some(y)) => {
                    let mut r = x % y;
                    if r != 0 && (r < 0) != (y < 0) {
                        r += y;
                    }
                    Ok(Int(r))
                }
                _ => match (as_float(a), as_float(b)) {
                    (Some(_), Some(y)) if y == 0.0 => {
                        Err(self.raise("ZeroDivisionError", "float modulo"))
                    }
                    (Some(x), Some(y)) => {
                        let mut r = x % y;
                        if r != 0.0 && (r < 0.0) != (y < 0.0) {
                            r += y;
                        }
                        Ok(Float(r))
                    }
                    _ => Err(type_error()),
                },
            },
            BinOp::Pow => match (as_int(a), as_int(b)) {
                (Some(x), Some(y)) if y >= 0 => {
                    let exp = u32::try_from(y)
                        .map_err(|_| self.raise("OverflowError", "exponent too large"))?;
                    x.checked_pow(exp)
                        .map(Int)
                        .ok_or_else(|| self.raise("OverflowError", "integer power overflow"))
                }
                _ => match (as_float(a), as_float(b)) {
                    (Some(x), Some(y)) => Ok(Float(x.powf(y))),
                    _ => Err(type_error()),
                },
            },
        }
    }

    fn subscript_get(&self, container: &Value, index: &Value) -> Result<Value, RuntimeError> {
        match container {
            Value::List(items) => {
                let items = items.borrow();
                self.seq_index(&items, index, "list")
            }
            Value::Tuple(items) => self.seq_index(items, index, "tuple"),
            Value::Str(s) => match index {
                Value::Int(i) => {
                    let chars: Vec<char> = s.chars().collect();
                    builtins::normalize_index(*i, chars.len())
                        .map(|idx| Value::str(chars[idx].to_string()))
                        .ok_or_else(|| self.raise("IndexError", "string index out of range"))
                }
                other => Err(self.raise(
                    "TypeError",
                    format!("string indices must be integers, not '{}'", other.type_name()),
                )),
            },
            Value::Dict(map) => {
                let key = DictKey::from_value(index).ok_or_else(|| {
                    self.raise("TypeError", format!("unhashable type: '{}'", index.type_name()))
                })?;
                map.borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| self.raise("KeyError", key.repr()))
            }
            other => Err(self.raise(
                "TypeError",
                format!("'{}' object is not subscriptable", other.type_name()),
            )),
        }
    }

    fn seq_index(&self, items: &[Value], index: &Value, kind: &str) -> Result<Value, RuntimeError> {
        match index {
            Value::Int(i) => builtins::normalize_index(*i, items.len())
                .map(|idx| items[idx].clone())
                .ok_or_else(|| self.raise("IndexError", format!("{} index out of range", kind))),
            other => Err(self.raise(
                "TypeError",
                format!("{} indices must be integers, not '{}'", kind, other.type_name()),
            )),
        }
    }

    fn subscript_set(
        &self,
        container: &Value,
        index: &Value,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match container {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                match index {
                    Value::Int(i) => match builtins::normalize_index(*i, len) {
                        Some(idx) => {
                            items[idx] = value;
                            Ok(())
                        }
                        None => {
                            Err(self.raise("IndexError", "list assignment index out of range"))
                        }
                    },
                    other => Err(self.raise(
                        "TypeError",
                        format!("list indices must be integers, not '{}'", other.type_name()),
                    )),
                }
            }
            Value::Dict(map) => {
                let key = DictKey::from_value(index).ok_or_else(|| {
                    self.raise("TypeError", format!("unhashable type: '{}'", index.type_name()))
                })?;
                map.borrow_mut().insert(key, value);
                Ok(())
            }
            other => Err(self.raise(
                "TypeError",
                format!("'{}' object does not support item assignment", other.type_name()),
            )),
        }
    }

    fn subscript_del(&self, container: &Value, index: &Value) -> Result<(), RuntimeError> {
        match container {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let len = items.len();
                match index {
                    Value::Int(i) => match builtins::normalize_index(*i, len) {
                        Some(idx) => {
                            items.remove(idx);
                            Ok(())
                        }
                        None => Err(self.raise("IndexError", "list index out of range")),
                    },
                    other => Err(self.raise(
                        "TypeError",
                        format!("list indices must be integers, not '{}'", other.type_name()),
                    )),
                }
            }
            Value::Dict(map) => {
                let key = DictKey::from_value(index).ok_or_else(|| {
                    self.raise("TypeError", format!("unhashable type: '{}'", index.type_name()))
                })?;
                map.borrow_mut()
                    .shift_remove(&key)
                    .map(|_| ())
                    .ok_or_else(|| self.raise("KeyError", key.repr()))
            }
            other => Err(self.raise(
                "TypeError",
                format!("'{}' object doesn't support item deletion", other.type_name()),
            )),
        }
    }
}

fn handler_matches(handler: &Handler, err: &RuntimeError) -> bool {
    match &handler.kind {
        None => true,
        Some(kind) => kind == "Exception" || *kind == err.kind,
    }
}
