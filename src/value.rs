// ═══════════════════════════════════════════════════════════
// Lumen runtime values
// ═══════════════════════════════════════════════════════════

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::FuncDecl;
use crate::env::Env;
use crate::error::{ErrorKind, RuntimeError};
use crate::lexer::Span;
use crate::stdlib::NativeFn;

// Nesting beyond this prints as `...`, which also stops self-referencing lists.
const MAX_DISPLAY_DEPTH: usize = 64;

/// Deepest container nesting that `==` and ordering will walk.
pub const MAX_COMPARE_DEPTH: usize = 256;

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<DictMap>>),
    Function(Rc<Function>),
    Native(Rc<NativeFunction>),
    BoundMethod(Rc<BoundMethod>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Module(Rc<Module>),
    Error(Rc<ErrorValue>),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(map: DictMap) -> Value {
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) | Value::Native(_) => "function",
            Value::BoundMethod(_) => "method",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Module(_) => "module",
            Value::Error(_) => "error",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }

    /// Structural equality; `None` once nesting passes `MAX_COMPARE_DEPTH`.
    pub fn equals(&self, other: &Value) -> Option<bool> {
        values_equal(self, other, 0)
    }

    /// Quoted form used inside collections and by the REPL echo.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        write_value(&mut out, self, true, 0);
        out
    }
}

/// Floats always show a fractional part: `3.0`, `2.5`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn quote(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_value(out: &mut String, value: &Value, quoted: bool, depth: usize) {
    if depth > MAX_DISPLAY_DEPTH {
        out.push_str("...");
        return;
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::Str(s) if quoted => quote(out, s),
        Value::Str(s) => out.push_str(s),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, true, depth + 1);
            }
            out.push(']');
        }
        Value::Dict(map) => {
            out.push('{');
            for (i, (k, v)) in map.borrow().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, k, true, depth + 1);
                out.push_str(": ");
                write_value(out, v, true, depth + 1);
            }
            out.push('}');
        }
        Value::Function(func) => {
            out.push_str("<func ");
            out.push_str(func.name());
            out.push('>');
        }
        Value::Native(native) => {
            out.push_str("<native func ");
            out.push_str(native.name);
            out.push('>');
        }
        Value::BoundMethod(bound) => {
            out.push_str("<bound method ");
            match &bound.method {
                Value::Function(f) => out.push_str(f.name()),
                Value::Native(n) => out.push_str(n.name),
                _ => out.push('?'),
            }
            out.push('>');
        }
        Value::Class(class) => {
            out.push_str("<class ");
            out.push_str(&class.name);
            out.push('>');
        }
        Value::Instance(inst) => {
            out.push('<');
            out.push_str(&inst.class.name);
            out.push_str(" instance>");
        }
        Value::Module(module) => {
            out.push_str("<module ");
            out.push_str(&module.name);
            out.push('>');
        }
        Value::Error(err) => out.push_str(&err.to_string()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_value(&mut out, self, false, 0);
        f.write_str(&out)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

fn values_equal(a: &Value, b: &Value, depth: usize) -> Option<bool> {
    match (a, b) {
        (Value::List(x), Value::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return Some(true);
            }
            if depth >= MAX_COMPARE_DEPTH {
                return None;
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return Some(false);
            }
            for (l, r) in x.iter().zip(y.iter()) {
                if !values_equal(l, r, depth + 1)? {
                    return Some(false);
                }
            }
            Some(true)
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return Some(true);
            }
            if depth >= MAX_COMPARE_DEPTH {
                return None;
            }
            x.borrow().equals_at(&y.borrow(), depth + 1)
        }
        (Value::Null, Value::Null) => Some(true),
        (Value::Bool(x), Value::Bool(y)) => Some(x == y),
        (Value::Int(x), Value::Int(y)) => Some(x == y),
        (Value::Float(x), Value::Float(y)) => Some(x == y),
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => Some((*x as f64) == *y),
        (Value::Str(x), Value::Str(y)) => Some(x == y),
        (Value::Function(x), Value::Function(y)) => Some(Rc::ptr_eq(x, y)),
        (Value::Native(x), Value::Native(y)) => Some(Rc::ptr_eq(x, y) || x.name == y.name && x.module == y.module),
        (Value::BoundMethod(x), Value::BoundMethod(y)) => Some(Rc::ptr_eq(x, y)),
        (Value::Class(x), Value::Class(y)) => Some(Rc::ptr_eq(x, y)),
        (Value::Instance(x), Value::Instance(y)) => Some(Rc::ptr_eq(x, y)),
        (Value::Module(x), Value::Module(y)) => Some(Rc::ptr_eq(x, y)),
        (Value::Error(x), Value::Error(y)) => Some(Rc::ptr_eq(x, y) || (x.kind == y.kind && x.message == y.message)),
        _ => Some(false),
    }
}

// Uniquely owned containers are emptied into a work list, so nesting depth
// never reaches the native stack.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        take_children(self, &mut pending);
        while let Some(mut value) = pending.pop() {
            take_children(&mut value, &mut pending);
        }
    }
}

fn take_children(value: &mut Value, pending: &mut Vec<Value>) {
    match value {
        Value::List(items) if Rc::strong_count(items) == 1 => {
            if let Ok(mut items) = items.try_borrow_mut() {
                pending.append(&mut *items);
            }
        }
        Value::Dict(map) if Rc::strong_count(map) == 1 => {
            if let Ok(mut map) = map.try_borrow_mut() {
                pending.extend(map.drain_values());
            }
        }
        Value::Instance(inst) if Rc::strong_count(inst) == 1 => {
            if let Ok(mut fields) = inst.fields.try_borrow_mut() {
                pending.extend(fields.drain().map(|(_, v)| v));
            }
        }
        _ => {}
    }
}

// ── Dictionaries ──────────────────────────────────────────────────────────────

/// Key form of a hashable value. Integral floats collapse onto `Int`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
}

impl HashKey {
    pub fn from_value(value: &Value) -> Result<HashKey, RuntimeError> {
        match value {
            Value::Null => Ok(HashKey::Null),
            Value::Bool(b) => Ok(HashKey::Bool(*b)),
            Value::Int(n) => Ok(HashKey::Int(*n)),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Ok(HashKey::Int(*f as i64))
                } else {
                    Ok(HashKey::Float(f.to_bits()))
                }
            }
            Value::Str(s) => Ok(HashKey::Str(s.clone())),
            other => Err(RuntimeError::type_error(format!(
                "unhashable type '{}' cannot be used as a dict key",
                other.type_name()
            ))),
        }
    }
}

/// Insertion-ordered map from hashable values to values.
#[derive(Debug, Clone, Default)]
pub struct DictMap {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<HashKey, usize>,
}

impl DictMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<&Value>, RuntimeError> {
        let hk = HashKey::from_value(key)?;
        Ok(self.index.get(&hk).map(|&i| &self.entries[i].1))
    }

    pub fn contains_key(&self, key: &Value) -> Result<bool, RuntimeError> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite; an existing key keeps its position.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), RuntimeError> {
        let hk = HashKey::from_value(&key)?;
        match self.index.get(&hk) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(hk, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &Value) -> Result<Option<Value>, RuntimeError> {
        let hk = HashKey::from_value(key)?;
        let Some(pos) = self.index.remove(&hk) else {
            return Ok(None);
        };
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Ok(Some(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    fn drain_values(&mut self) -> impl Iterator<Item = Value> + '_ {
        self.index.clear();
        self.entries.drain(..).map(|(_, v)| v)
    }

    fn equals_at(&self, other: &DictMap, depth: usize) -> Option<bool> {
        if self.len() != other.len() {
            return Some(false);
        }
        for (k, v) in &self.entries {
            match other.get(k) {
                Ok(Some(ov)) => {
                    if !values_equal(v, ov, depth)? {
                        return Some(false);
                    }
                }
                _ => return Some(false),
            }
        }
        Some(true)
    }
}

impl PartialEq for DictMap {
    fn eq(&self, other: &Self) -> bool {
        self.equals_at(other, 0).unwrap_or(false)
    }
}

// ── Callables ─────────────────────────────────────────────────────────────────

pub struct Function {
    pub decl: Rc<FuncDecl>,
    pub closure: Env,
    /// Class that defines this method; `super` resolves against its parent.
    pub owner: Option<Rc<Class>>,
}

impl Function {
    pub fn name(&self) -> &str {
        self.decl.display_name()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<func {}>", self.name())
    }
}

pub struct NativeFunction {
    pub name: &'static str,
    pub module: Option<&'static str>,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native func {}>", self.name)
    }
}

/// A method paired with the receiver it was looked up on.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Value,
}

// ── Classes & instances ───────────────────────────────────────────────────────

pub struct Class {
    pub name: String,
    pub parent: Option<Rc<Class>>,
    pub methods: FxHashMap<String, Rc<FuncDecl>>,
    /// Scope the class was declared in; method bodies close over it.
    pub closure: Env,
}

impl Class {
    /// Walk the single-parent chain; returns the defining class with the method.
    pub fn find_method(self: &Rc<Self>, name: &str) -> Option<(Rc<Class>, Rc<FuncDecl>)> {
        let mut class = Some(self.clone());
        while let Some(c) = class {
            if let Some(decl) = c.methods.get(name) {
                return Some((c.clone(), decl.clone()));
            }
            class = c.parent.clone();
        }
        None
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        if let Some(parent) = &self.parent {
            names.extend(parent.method_names());
        }
        names
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<FxHashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Instance { class, fields: RefCell::new(FxHashMap::default()) }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}

// ── Modules ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub path: Option<PathBuf>,
    pub exports: BTreeMap<String, Value>,
}

impl Module {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.exports.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

// ── Error values ──────────────────────────────────────────────────────────────

/// A caught or constructed error as seen from user code.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl ErrorValue {
    pub fn to_runtime_error(&self) -> RuntimeError {
        RuntimeError { kind: self.kind.clone(), message: self.message.clone(), span: self.span, suggestions: Vec::new() }
    }
}

impl From<&RuntimeError> for ErrorValue {
    fn from(err: &RuntimeError) -> Self {
        ErrorValue { kind: err.kind.clone(), message: err.message.clone(), span: err.span }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        let list = Value::list(vec![Value::Int(1), Value::str("a"), Value::Float(2.0), Value::Null]);
        assert_eq!(list.to_string(), "[1, \"a\", 2.0, null]");
        assert_eq!(Value::str("plain").to_string(), "plain");
        assert_eq!(Value::str("q").repr(), "\"q\"");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }

    #[test]
    fn self_referencing_list_display_terminates() {
        let list = Value::list(vec![]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert!(list.to_string().contains("..."));
    }

    #[test]
    fn truthiness() {
        for falsy in [Value::Null, Value::Bool(false), Value::Int(0), Value::Float(0.0), Value::str(""), Value::list(vec![])] {
            assert!(!falsy.is_truthy(), "{:?}", falsy);
        }
        assert!(Value::dict(DictMap::new()).is_truthy() == false);
        assert!(Value::str("0").is_truthy());
    }

    #[test]
    fn mixed_numeric_equality_and_identity() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(1), Value::str("1"));
        assert_eq!(Value::list(vec![Value::Int(1)]), Value::list(vec![Value::Int(1)]));
    }

    #[test]
    fn dict_preserves_insertion_order_and_collapses_integral_floats() {
        let mut map = DictMap::new();
        map.insert(Value::str("b"), Value::Int(1)).unwrap();
        map.insert(Value::Int(1), Value::Int(2)).unwrap();
        map.insert(Value::str("a"), Value::Int(3)).unwrap();
        map.insert(Value::Float(1.0), Value::Int(20)).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&Value::Int(1)).unwrap(), Some(&Value::Int(20)));

        assert_eq!(map.remove(&Value::str("b")).unwrap(), Some(Value::Int(1)));
        assert_eq!(map.keys(), vec![Value::Int(1), Value::str("a")]);
        assert_eq!(map.get(&Value::str("a")).unwrap(), Some(&Value::Int(3)));

        let err = map.insert(Value::list(vec![]), Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }

    #[test]
    fn deep_nesting_drops_iteratively() {
        let mut value = Value::Null;
        for i in 0..300_000 {
            value = if i % 2 == 0 {
                Value::list(vec![value])
            } else {
                let mut map = DictMap::new();
                map.insert(Value::str("next"), value).unwrap();
                Value::dict(map)
            };
        }
        drop(value);
    }

    #[test]
    fn shared_children_survive_the_parent() {
        let child = Value::list(vec![Value::Int(7)]);
        let parent = Value::list(vec![child.clone()]);
        drop(parent);
        assert_eq!(child, Value::list(vec![Value::Int(7)]));
    }
}
