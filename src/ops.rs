// ── Operators ─────────────────────────────────────────────────────────────────
//
// Arithmetic, comparison, indexing and iteration over runtime values.
// Errors come back without a span; the evaluator attaches the node's.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, CompareOp, UnaryOp};
use crate::error::{ErrorKind, RuntimeError};
use crate::value::{Value, MAX_COMPARE_DEPTH};

type OpResult<T = Value> = Result<T, RuntimeError>;

// Longest string (in bytes) or list that `*` may build.
const MAX_REPEAT_LEN: usize = 1 << 28;

fn overflow(op: &str) -> RuntimeError {
    RuntimeError::new(ErrorKind::Overflow, format!("integer overflow in '{}'", op))
}

fn too_deep() -> RuntimeError {
    RuntimeError::new(
        ErrorKind::Recursion,
        format!("maximum comparison depth of {} exceeded", MAX_COMPARE_DEPTH),
    )
}

// Negative counts repeat zero times.
fn repeat_count(unit: usize, n: i64) -> OpResult<usize> {
    let times = usize::try_from(n).unwrap_or(0);
    if unit == 0 {
        return Ok(0);
    }
    match unit.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
        _ => Err(RuntimeError::new(ErrorKind::Overflow, "repeated sequence is too long")),
    }
}

fn division_by_zero(op: BinaryOp) -> RuntimeError {
    let what = if op == BinaryOp::Mod { "modulo" } else { "division" };
    RuntimeError::new(ErrorKind::DivisionByZero, format!("{} by zero", what))
}

fn unsupported(op: BinaryOp, l: &Value, r: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op.symbol(),
        l.type_name(),
        r.type_name()
    ))
}

pub fn binary(op: BinaryOp, l: &Value, r: &Value) -> OpResult {
    match op {
        BinaryOp::Eq => l.equals(r).map(Value::Bool).ok_or_else(too_deep),
        BinaryOp::NotEq => l.equals(r).map(|eq| Value::Bool(!eq)).ok_or_else(too_deep),
        BinaryOp::Add => match (l, r) {
            (Value::Str(a), b) => Ok(Value::str(format!("{}{}", a, b))),
            (a, Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                let mut combined = a.borrow().clone();
                combined.extend(b.borrow().iter().cloned());
                Ok(Value::list(combined))
            }
            _ => numeric_op(op, l, r, i64::checked_add, |a, b| a + b),
        },
        BinaryOp::Sub => numeric_op(op, l, r, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => match (l, r) {
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
                Ok(Value::str(s.repeat(repeat_count(s.len(), *n)?)))
            }
            (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
                let items = items.borrow();
                let times = repeat_count(items.len(), *n)?;
                let mut out = Vec::with_capacity(items.len() * times);
                for _ in 0..times {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::list(out))
            }
            _ => numeric_op(op, l, r, i64::checked_mul, |a, b| a * b),
        },
        BinaryOp::Div => {
            check_divisor(op, r)?;
            numeric_op(op, l, r, floor_div, |a, b| a / b)
        }
        BinaryOp::Mod => {
            check_divisor(op, r)?;
            numeric_op(op, l, r, floor_mod, |a, b| a - b * (a / b).floor())
        }
        BinaryOp::Pow => match (l, r) {
            (Value::Int(base), Value::Int(exp)) if *exp >= 0 => {
                let exp = u32::try_from(*exp).map_err(|_| overflow("**"))?;
                base.checked_pow(exp).map(Value::Int).ok_or_else(|| overflow("**"))
            }
            _ => numeric_op(op, l, r, |_, _| None, f64::powf),
        },
    }
}

fn check_divisor(op: BinaryOp, r: &Value) -> OpResult<()> {
    match r {
        Value::Int(0) => Err(division_by_zero(op)),
        Value::Float(f) if *f == 0.0 => Err(division_by_zero(op)),
        _ => Ok(()),
    }
}

// Floored: the result rounds toward negative infinity.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

// Result takes the sign of the divisor.
fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

// Ints stay ints; a float on either side promotes both. A `None` from the
// integer op means overflow, except for `**` where it means "use floats".
fn numeric_op(
    op: BinaryOp,
    l: &Value,
    r: &Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> OpResult {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => match int_op(*a, *b) {
            Some(n) => Ok(Value::Int(n)),
            None if op == BinaryOp::Pow => Ok(Value::Float(float_op(*a as f64, *b as f64))),
            None => Err(overflow(op.symbol())),
        },
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(*a, *b))),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(float_op(*a as f64, *b))),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(float_op(*a, *b as f64))),
        _ => Err(unsupported(op, l, r)),
    }
}

pub fn unary(op: UnaryOp, v: &Value) -> OpResult {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(|| overflow("-")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Plus, Value::Int(_) | Value::Float(_)) => Ok(v.clone()),
        (_, v) => Err(RuntimeError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            v.type_name()
        ))),
    }
}

// ── Comparison ────────────────────────────────────────────────────────────────

/// Ordering between two values; `None` when unordered (NaN involved).
pub fn ordering(l: &Value, r: &Value) -> OpResult<Option<Ordering>> {
    ordering_at(l, r, 0)
}

fn ordering_at(l: &Value, r: &Value, depth: usize) -> OpResult<Option<Ordering>> {
    Ok(match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            if std::rc::Rc::ptr_eq(a, b) {
                return Ok(Some(Ordering::Equal));
            }
            if depth >= MAX_COMPARE_DEPTH {
                return Err(too_deep());
            }
            let (a, b) = (a.borrow(), b.borrow());
            for (x, y) in a.iter().zip(b.iter()) {
                match ordering_at(x, y, depth + 1)? {
                    Some(Ordering::Equal) => continue,
                    other => return Ok(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => {
            return Err(RuntimeError::type_error(format!(
                "cannot compare '{}' with '{}'",
                l.type_name(),
                r.type_name()
            )))
        }
    })
}

pub fn compare(op: CompareOp, l: &Value, r: &Value) -> OpResult<bool> {
    let Some(ord) = ordering(l, r)? else {
        return Ok(false);
    };
    Ok(match op {
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::LtEq => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::GtEq => ord != Ordering::Less,
    })
}

// ── Indexing ──────────────────────────────────────────────────────────────────

/// Resolve a possibly-negative index against `len`.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) {
        usize::try_from(i).ok()
    } else {
        None
    }
}

fn int_index(container: &str, index: &Value) -> OpResult<i64> {
    match index {
        Value::Int(n) => Ok(*n),
        other => Err(RuntimeError::type_error(format!(
            "{} indices must be integers, not '{}'",
            container,
            other.type_name()
        ))),
    }
}

pub fn index_get(object: &Value, index: &Value) -> OpResult {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let i = int_index("list", index)?;
            normalize_index(i, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| RuntimeError::index(format!("list index {} out of range (length {})", i, items.len())))
        }
        Value::Str(s) => {
            let i = int_index("string", index)?;
            let len = s.chars().count();
            normalize_index(i, len)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::str(c.to_string()))
                .ok_or_else(|| RuntimeError::index(format!("string index {} out of range (length {})", i, len)))
        }
        Value::Dict(map) => map
            .borrow()
            .get(index)?
            .cloned()
            .ok_or_else(|| RuntimeError::key(format!("key {} not found", index.repr()))),
        other => Err(RuntimeError::type_error(format!("'{}' value is not indexable", other.type_name()))),
    }
}

pub fn index_set(object: &Value, index: &Value, value: Value) -> OpResult<()> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = int_index("list", index)?;
            let len = items.len();
            let slot = normalize_index(i, len)
                .ok_or_else(|| RuntimeError::index(format!("list assignment index {} out of range (length {})", i, len)))?;
            items[slot] = value;
            Ok(())
        }
        Value::Dict(map) => map.borrow_mut().insert(index.clone(), value),
        Value::Str(_) => Err(RuntimeError::type_error("strings are immutable")),
        other => Err(RuntimeError::type_error(format!(
            "'{}' value does not support item assignment",
            other.type_name()
        ))),
    }
}

/// Snapshot of the items a `for` loop walks: list elements, string
/// characters or dict keys.
pub fn iterate(value: &Value) -> OpResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Dict(map) => Ok(map.borrow().keys()),
        other => Err(RuntimeError::type_error(format!("'{}' value is not iterable", other.type_name()))),
    }
}
