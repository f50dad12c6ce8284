// ═══════════════════════════════════════════════════════════
// Lumen Standard Library: host functions
// ═══════════════════════════════════════════════════════════
//
// Every native function receives already-evaluated arguments and returns a
// value or an error. Natives never see the caller's scope.

pub mod collections;
pub mod io;
pub mod math;
pub mod string;
pub mod time;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::env::{Env, Mutability};
use crate::error::{ErrorKind, RuntimeError};
use crate::output::Output;
use crate::value::{ErrorValue, Module, NativeFunction, Value};

pub type NativeFn = fn(&mut NativeCtx<'_>, &NativeArgs) -> Result<Value, RuntimeError>;

/// Host capabilities a native may use.
pub struct NativeCtx<'a> {
    pub out: &'a Output,
}

impl NativeCtx<'_> {
    pub fn write(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.out
            .write_str(text)
            .map_err(|e| RuntimeError::io(format!("cannot write output: {}", e)))
    }
}

/// Call arguments: positional values in order plus `name = value` pairs.
#[derive(Debug, Clone, Default)]
pub struct NativeArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl NativeArgs {
    pub fn new(positional: Vec<Value>) -> Self {
        NativeArgs { positional, keyword: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate positional count against `min..=max` and keyword names
    /// against `keywords`.
    pub fn check(&self, func: &str, min: usize, max: usize, keywords: &[&str]) -> Result<(), RuntimeError> {
        let n = self.positional.len();
        if n < min || n > max {
            let expected = if min == max {
                format!("{}", min)
            } else if max == usize::MAX {
                format!("at least {}", min)
            } else {
                format!("{} to {}", min, max)
            };
            return Err(RuntimeError::type_error(format!(
                "{}() takes {} argument{} but {} were given",
                func,
                expected,
                if expected == "1" { "" } else { "s" },
                n
            )));
        }
        if let Some((name, _)) = self.keyword.iter().find(|(k, _)| !keywords.contains(&k.as_str())) {
            return Err(RuntimeError::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                func, name
            )));
        }
        Ok(())
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Positional argument `index`, or the keyword argument `name`.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.arg(index).or_else(|| self.keyword(name))
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn wrong_type(func: &str, expected: &str, got: &Value) -> RuntimeError {
    RuntimeError::type_error(format!("{}() expected {}, got '{}'", func, expected, got.type_name()))
}

pub fn expect_int(func: &str, value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(wrong_type(func, "an int", other)),
    }
}

pub fn expect_number(func: &str, value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(wrong_type(func, "a number", other)),
    }
}

pub fn expect_str(func: &str, value: &Value) -> Result<Rc<str>, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(wrong_type(func, "a string", other)),
    }
}

pub fn expect_list(func: &str, value: &Value) -> Result<Rc<RefCell<Vec<Value>>>, RuntimeError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        other => Err(wrong_type(func, "a list", other)),
    }
}

/// Float to int conversion that refuses NaN, infinities and out-of-range values.
pub fn float_to_int(func: &str, f: f64) -> Result<i64, RuntimeError> {
    if f.is_nan() || f.is_infinite() {
        return Err(RuntimeError::value(format!("{}() cannot convert {} to int", func, f)));
    }
    if f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return Err(RuntimeError::new(ErrorKind::Overflow, format!("{}() result {} does not fit in an int", func, f)));
    }
    Ok(f as i64)
}

pub(crate) fn native(name: &'static str, module: Option<&'static str>, func: NativeFn) -> Value {
    Value::Native(Rc::new(NativeFunction { name, module, func }))
}

// ── Prelude ───────────────────────────────────────────────────────────────────

const PRELUDE: &[(&str, NativeFn)] = &[
    ("print", print),
    ("len", collections::len),
    ("str", to_str),
    ("int", to_int),
    ("float", to_float),
    ("bool", to_bool),
    ("type", type_of),
    ("range", range),
    ("get", collections::get),
    ("keys", collections::keys),
    ("values", collections::values),
    ("push", collections::push),
    ("pop", collections::pop),
    ("error", error),
    ("input", io::input),
];

/// Bind the always-available builtins into `env`.
pub fn register_prelude(env: &Env) {
    for (name, func) in PRELUDE {
        env.define(name, native(name, None, *func), Mutability::Immutable);
    }
}

pub(crate) fn join_display(args: &[Value], sep: &str) -> String {
    args.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(sep)
}

fn separator(func: &str, args: &NativeArgs, name: &str, default: &str) -> Result<String, RuntimeError> {
    match args.keyword(name) {
        None => Ok(default.to_string()),
        Some(v) => Ok(expect_str(func, v)?.to_string()),
    }
}

fn print(ctx: &mut NativeCtx<'_>, args: &NativeArgs) -> Result<Value, RuntimeError> {
    args.check("print", 0, usize::MAX, &["sep", "end"])?;
    let sep = separator("print", args, "sep", " ")?;
    let end = separator("print", args, "end", "\n")?;
    let mut line = join_display(&args.positional, &sep);
    line.push_str(&end);
    ctx.write(&line)?;
    Ok(Value::Null)
}

fn to_str(_: &mut NativeCtx<'_>, args: &NativeArgs) -> Result<Value, RuntimeError> {
    args.check("str", 1, 1, &[])?;
    Ok(Value::str(args.positional[0].to_string()))
}

fn to_int(_: &mut NativeCtx<'_>, args: &NativeArgs) -> Result<Value, RuntimeError> {
    args.check("int", 1, 1, &[])?;
    match &args.positional[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => Ok(Value::Int(float_to_int("int", f.trunc())?)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => {
            let text = s.trim().replace('_', "");
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| RuntimeError::value(format!("invalid literal for int(): {}", Value::Str(s.clone()).repr())))
        }
        other => Err(wrong_type("int", "a number, bool or string", other)),
    }
}

fn to_float(_: &mut NativeCtx<'_>, args: &NativeArgs) -> Result<Value, RuntimeError> {
    args.check("float", 1, 1, &[])?;
    match &args.positional[0] {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| RuntimeError::value(format!("invalid literal for float(): {}", Value::Str(s.clone()).repr()))),
        other => Err(wrong_type("float", "a number, bool or string", other)),
    }
}

fn to_bool(_: &mut NativeCtx<'_>, args: &NativeArgs) -> Result<Value, RuntimeError> {
    args.check("bool", 1, 1, &[])?;
    Ok(Value::Bool(args.positional[0].is_truthy()))
}

fn type_of(_: &mut NativeCtx<'_>, args: &NativeArgs) -> Result<Value, RuntimeError> {
    args.check("type", 1, 1, &[])?;
    Ok(match &args.positional[0] {
        Value::Instance(inst) => Value::str(inst.class.name.as_str()),
        other => Value::str(other.type_name()),
    })
}

fn range(_: &mut NativeCtx<'_>, args: &NativeArgs) -> Result<Value, RuntimeError> {
    args.check("range", 1, 3, &[])?;
    let nums = args
        .positional
        .iter()
        .map(|v| expect_int("range", v))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match nums.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("arity checked above"),
    };
    if step == 0 {
        return Err(RuntimeError::value("range() step must not be zero"));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::list(out))
}

fn error(_: &mut NativeCtx<'_>, args: &NativeArgs) -> Result<Value, RuntimeError> {
    args.check("error", 1, 2, &["kind"])?;
    let message = args.positional[0].to_string();
    let kind = match args.get(1, "kind") {
        Some(v) => ErrorKind::from_name(&expect_str("error", v)?),
        None => ErrorKind::Error,
    };
    Ok(Value::Error(Rc::new(ErrorValue { kind, message, span: None })))
}

// ── Standard modules ──────────────────────────────────────────────────────────

pub const MODULE_NAMES: &[&str] = &["math", "string", "collections", "io", "time"];

pub fn module_name(name: &str) -> Option<&'static str> {
    MODULE_NAMES.iter().copied().find(|m| *m == name)
}

/// Build the namespace of a standard module.
pub fn load_module(name: &str) -> Option<Module> {
    let name = module_name(name)?;
    let (functions, constants): (&[(&'static str, NativeFn)], Vec<(&'static str, Value)>) = match name {
        "math" => (math::FUNCTIONS, math::constants()),
        "string" => (string::FUNCTIONS, Vec::new()),
        "collections" => (collections::FUNCTIONS, Vec::new()),
        "io" => (io::FUNCTIONS, Vec::new()),
        "time" => (time::FUNCTIONS, Vec::new()),
        _ => return None,
    };
    let mut exports = BTreeMap::new();
    for (fname, func) in functions {
        exports.insert(fname.to_string(), native(fname, Some(name), *func));
    }
    for (cname, value) in constants {
        exports.insert(cname.to_string(), value);
    }
    Some(Module { name: name.to_string(), path: None, exports })
}

// ── Methods on builtin values ─────────────────────────────────────────────────

const LIST_METHODS: &[(&str, NativeFn)] = &[
    ("push", collections::push),
    ("pop", collections::pop),
    ("len", collections::len),
    ("contains", collections::contains),
];

const STRING_METHODS: &[(&str, NativeFn)] = &[
    ("upper", string::upper),
    ("lower", string::lower),
    ("trim", string::trim),
    ("split", string::split),
    ("len", collections::len),
    ("contains", string::contains),
];

const DICT_METHODS: &[(&str, NativeFn)] = &[
    ("keys", collections::keys),
    ("values", collections::values),
    ("get", collections::get),
    ("has", collections::has),
    ("remove", collections::remove),
    ("len", collections::len),
];

fn method_table(receiver: &Value) -> &'static [(&'static str, NativeFn)] {
    match receiver {
        Value::List(_) => LIST_METHODS,
        Value::Str(_) => STRING_METHODS,
        Value::Dict(_) => DICT_METHODS,
        _ => &[],
    }
}

/// Native implementing `receiver.name(...)`; the receiver is passed as the
/// first positional argument.
pub fn builtin_method(receiver: &Value, name: &str) -> Option<Value> {
    method_table(receiver)
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, f)| native(n, None, *f))
}

pub fn builtin_method_names(receiver: &Value) -> Vec<&'static str> {
    method_table(receiver).iter().map(|(n, _)| *n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(func: NativeFn, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let out = Output::buffer();
        let mut ctx = NativeCtx { out: &out };
        func(&mut ctx, &NativeArgs::new(args))
    }

    #[test]
    fn print_honours_sep_and_end() {
        let out = Output::buffer();
        let mut ctx = NativeCtx { out: &out };
        let args = NativeArgs {
            positional: vec![Value::Int(1), Value::str("a")],
            keyword: vec![("sep".into(), Value::str("-")), ("end".into(), Value::str("!"))],
        };
        print(&mut ctx, &args).unwrap();
        assert_eq!(out.contents(), "1-a!");
    }

    #[test]
    fn conversions() {
        assert_eq!(call(to_int, vec![Value::str(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call(to_int, vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(call(to_int, vec![Value::str("4x")]).unwrap_err().kind, ErrorKind::Value);
        assert_eq!(call(to_float, vec![Value::Int(3)]).unwrap(), Value::Float(3.0));
        assert_eq!(call(to_str, vec![Value::Float(3.0)]).unwrap(), Value::str("3.0"));
    }

    #[test]
    fn range_forms() {
        assert_eq!(call(range, vec![Value::Int(3)]).unwrap().to_string(), "[0, 1, 2]");
        assert_eq!(call(range, vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap().to_string(), "[5, 3, 1]");
        assert_eq!(call(range, vec![Value::Int(0), Value::Int(1), Value::Int(0)]).unwrap_err().kind, ErrorKind::Value);
    }

    #[test]
    fn error_builds_custom_kinds() {
        let v = call(error, vec![Value::str("bad"), Value::str("TypeError")]).unwrap();
        match &v {
            Value::Error(e) => assert_eq!(e.kind, ErrorKind::Type),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn arity_is_checked() {
        let err = call(to_str, vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(err.message, "str() takes 1 argument but 0 were given");
    }

    #[test]
    fn every_standard_module_loads() {
        for name in MODULE_NAMES {
            let module = load_module(name).expect("module");
            assert!(!module.exports.is_empty(), "{} is empty", name);
        }
        assert!(load_module("net").is_none());
    }
}
