// `collections` module: list and dict helpers. Several of these double as
// prelude builtins and as methods on list/dict values.

use std::cmp::Ordering;

use super::{expect_int, expect_list, NativeArgs, NativeCtx, NativeFn};
use crate::error::RuntimeError;
use crate::ops;
use crate::value::{DictMap, Value};

pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("push", push),
    ("pop", pop),
    ("insert", insert),
    ("remove", remove),
    ("contains", contains),
    ("reverse", reverse),
    ("sort", sort),
    ("slice", slice),
    ("len", len),
    ("keys", keys),
    ("values", values),
    ("items", items),
    ("has", has),
    ("get", get),
];

type NativeResult = Result<Value, RuntimeError>;

fn expect_dict(func: &str, value: &Value) -> Result<std::rc::Rc<std::cell::RefCell<DictMap>>, RuntimeError> {
    match value {
        Value::Dict(map) => Ok(map.clone()),
        other => Err(RuntimeError::type_error(format!("{}() expected a dict, got '{}'", func, other.type_name()))),
    }
}

pub fn len(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("len", 1, 1, &[])?;
    let n = match &args.positional[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Dict(map) => map.borrow().len(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(n as i64))
}

pub fn push(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("push", 2, 2, &[])?;
    let list = expect_list("push", &args.positional[0])?;
    list.borrow_mut().push(args.positional[1].clone());
    Ok(Value::Null)
}

/// `pop(list, index = -1)`
pub fn pop(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("pop", 1, 2, &["index"])?;
    let list = expect_list("pop", &args.positional[0])?;
    let mut items = list.borrow_mut();
    if items.is_empty() {
        return Err(RuntimeError::index("pop from empty list"));
    }
    let index = match args.get(1, "index") {
        Some(v) => expect_int("pop", v)?,
        None => -1,
    };
    let len = items.len();
    let slot = ops::normalize_index(index, len)
        .ok_or_else(|| RuntimeError::index(format!("pop index {} out of range (length {})", index, len)))?;
    Ok(items.remove(slot))
}

pub fn insert(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("insert", 3, 3, &[])?;
    let list = expect_list("insert", &args.positional[0])?;
    let index = expect_int("insert", &args.positional[1])?;
    let mut items = list.borrow_mut();
    let len = items.len() as i64;
    let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
    items.insert(at as usize, args.positional[2].clone());
    Ok(Value::Null)
}

/// Remove by index from a list, or by key from a dict; returns the removed value.
pub fn remove(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("remove", 2, 2, &[])?;
    let target = &args.positional[1];
    match &args.positional[0] {
        Value::List(items) => {
            let index = expect_int("remove", target)?;
            let mut items = items.borrow_mut();
            let len = items.len();
            let slot = ops::normalize_index(index, len)
                .ok_or_else(|| RuntimeError::index(format!("remove index {} out of range (length {})", index, len)))?;
            Ok(items.remove(slot))
        }
        Value::Dict(map) => map
            .borrow_mut()
            .remove(target)?
            .ok_or_else(|| RuntimeError::key(format!("key {} not found", target.repr()))),
        other => Err(RuntimeError::type_error(format!(
            "remove() expected a list or dict, got '{}'",
            other.type_name()
        ))),
    }
}

pub fn contains(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("contains", 2, 2, &[])?;
    let needle = &args.positional[1];
    let found = match &args.positional[0] {
        Value::List(items) => items.borrow().iter().any(|v| v == needle),
        Value::Dict(map) => map.borrow().contains_key(needle)?,
        Value::Str(s) => match needle {
            Value::Str(sub) => s.contains(&**sub),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "contains() on a string needs a string, got '{}'",
                    other.type_name()
                )))
            }
        },
        other => {
            return Err(RuntimeError::type_error(format!(
                "contains() expected a list, dict or string, got '{}'",
                other.type_name()
            )))
        }
    };
    Ok(Value::Bool(found))
}

pub fn reverse(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("reverse", 1, 1, &[])?;
    match &args.positional[0] {
        Value::Str(s) => Ok(Value::str(s.chars().rev().collect::<String>())),
        other => {
            let list = expect_list("reverse", other)?;
            let mut items = list.borrow().clone();
            items.reverse();
            Ok(Value::list(items))
        }
    }
}

/// Sorted copy. Mixed or unordered elements are a TypeError.
pub fn sort(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("sort", 1, 1, &["reverse"])?;
    let list = expect_list("sort", &args.positional[0])?;
    let mut items = list.borrow().clone();
    let mut failure = None;
    items.sort_by(|a, b| match ops::ordering(a, b) {
        Ok(Some(ord)) => ord,
        Ok(None) => Ordering::Equal,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }
    if args.keyword("reverse").is_some_and(Value::is_truthy) {
        items.reverse();
    }
    Ok(Value::list(items))
}

/// `slice(seq, start, end = null)` over a list or string; bounds clamp.
pub fn slice(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("slice", 2, 3, &["end"])?;
    let start = expect_int("slice", &args.positional[1])?;
    let end = match args.get(2, "end") {
        None | Some(Value::Null) => None,
        Some(v) => Some(expect_int("slice", v)?),
    };
    let clamp = |i: i64, len: usize| -> usize {
        let len = len as i64;
        let i = if i < 0 { i + len } else { i };
        i.clamp(0, len) as usize
    };
    match &args.positional[0] {
        Value::List(items) => {
            let items = items.borrow();
            let (a, b) = (clamp(start, items.len()), clamp(end.unwrap_or(i64::MAX), items.len()));
            Ok(Value::list(if a < b { items[a..b].to_vec() } else { Vec::new() }))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (a, b) = (clamp(start, chars.len()), clamp(end.unwrap_or(i64::MAX), chars.len()));
            Ok(Value::str(if a < b { chars[a..b].iter().collect::<String>() } else { String::new() }))
        }
        other => Err(RuntimeError::type_error(format!(
            "slice() expected a list or string, got '{}'",
            other.type_name()
        ))),
    }
}

pub fn keys(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("keys", 1, 1, &[])?;
    Ok(Value::list(expect_dict("keys", &args.positional[0])?.borrow().keys()))
}

pub fn values(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("values", 1, 1, &[])?;
    Ok(Value::list(expect_dict("values", &args.positional[0])?.borrow().values()))
}

/// `[key, value]` pairs in insertion order.
pub fn items(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("items", 1, 1, &[])?;
    let map = expect_dict("items", &args.positional[0])?;
    let pairs = map
        .borrow()
        .iter()
        .map(|(k, v)| Value::list(vec![k.clone(), v.clone()]))
        .collect();
    Ok(Value::list(pairs))
}

pub fn has(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("has", 2, 2, &[])?;
    let map = expect_dict("has", &args.positional[0])?;
    let found = map.borrow().contains_key(&args.positional[1])?;
    Ok(Value::Bool(found))
}

/// `get(dict, key, default = null)`; lists take an index instead of a key.
pub fn get(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("get", 2, 3, &["default"])?;
    let default = args.get(2, "default").cloned().unwrap_or_default();
    let key = &args.positional[1];
    match &args.positional[0] {
        Value::Dict(map) => Ok(map.borrow().get(key)?.cloned().unwrap_or(default)),
        Value::List(items) => {
            let items = items.borrow();
            let index = expect_int("get", key)?;
            Ok(ops::normalize_index(index, items.len()).map_or(default, |i| items[i].clone()))
        }
        other => Err(RuntimeError::type_error(format!(
            "get() expected a dict or list, got '{}'",
            other.type_name()
        ))),
    }
}
