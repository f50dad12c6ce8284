// `math` module. Results outside a function's domain are ValueErrors;
// rounding functions return ints.

use std::cmp::Ordering;
use std::f64::consts;

use super::{expect_number, float_to_int, NativeArgs, NativeCtx, NativeFn};
use crate::ast::BinaryOp;
use crate::error::{ErrorKind, RuntimeError};
use crate::ops;
use crate::value::Value;

pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("sqrt", sqrt),
    ("pow", pow),
    ("abs", abs),
    ("floor", floor),
    ("ceil", ceil),
    ("round", round),
    ("min", min),
    ("max", max),
    ("sin", sin),
    ("cos", cos),
    ("tan", tan),
    ("log", log),
    ("exp", exp),
];

pub fn constants() -> Vec<(&'static str, Value)> {
    vec![("pi", Value::Float(consts::PI)), ("e", Value::Float(consts::E))]
}

type NativeResult = Result<Value, RuntimeError>;

fn domain_error(func: &str) -> RuntimeError {
    RuntimeError::value(format!("math domain error in {}()", func))
}

fn unary_float(func: &str, args: &NativeArgs, f: fn(f64) -> f64) -> NativeResult {
    args.check(func, 1, 1, &[])?;
    Ok(Value::Float(f(expect_number(func, &args.positional[0])?)))
}

fn sqrt(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("sqrt", 1, 1, &[])?;
    let x = expect_number("sqrt", &args.positional[0])?;
    if x < 0.0 {
        return Err(domain_error("sqrt"));
    }
    Ok(Value::Float(x.sqrt()))
}

/// Same rules as the `**` operator.
fn pow(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("pow", 2, 2, &[])?;
    expect_number("pow", &args.positional[0])?;
    expect_number("pow", &args.positional[1])?;
    ops::binary(BinaryOp::Pow, &args.positional[0], &args.positional[1])
}

fn abs(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("abs", 1, 1, &[])?;
    match &args.positional[0] {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::new(ErrorKind::Overflow, "integer overflow in abs()")),
        other => Ok(Value::Float(expect_number("abs", other)?.abs())),
    }
}

fn rounding(func: &str, args: &NativeArgs, f: fn(f64) -> f64) -> NativeResult {
    args.check(func, 1, 1, &[])?;
    match &args.positional[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        other => Ok(Value::Int(float_to_int(func, f(expect_number(func, other)?))?)),
    }
}

fn floor(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    rounding("floor", args, f64::floor)
}

fn ceil(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    rounding("ceil", args, f64::ceil)
}

/// Halves round away from zero.
fn round(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    rounding("round", args, f64::round)
}

/// Either a single list argument or two or more values.
fn extreme(func: &str, args: &NativeArgs, want: Ordering) -> NativeResult {
    args.check(func, 1, usize::MAX, &[])?;
    let items: Vec<Value> = match args.positional.as_slice() {
        [Value::List(items)] => items.borrow().clone(),
        [single] => {
            return Err(RuntimeError::type_error(format!(
                "{}() of a single '{}' value; pass a list or several values",
                func,
                single.type_name()
            )))
        }
        many => many.to_vec(),
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| RuntimeError::value(format!("{}() of an empty list", func)))?;
    for item in iter {
        if ops::ordering(&item, &best)? == Some(want) {
            best = item;
        }
    }
    Ok(best)
}

fn min(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    extreme("min", args, Ordering::Less)
}

fn max(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    extreme("max", args, Ordering::Greater)
}

fn sin(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    unary_float("sin", args, f64::sin)
}

fn cos(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    unary_float("cos", args, f64::cos)
}

fn tan(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    unary_float("tan", args, f64::tan)
}

fn exp(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    unary_float("exp", args, f64::exp)
}

/// `log(x, base = e)`
fn log(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("log", 1, 2, &["base"])?;
    let x = expect_number("log", &args.positional[0])?;
    if x <= 0.0 {
        return Err(domain_error("log"));
    }
    match args.get(1, "base") {
        None => Ok(Value::Float(x.ln())),
        Some(base) => {
            let base = expect_number("log", base)?;
            if base <= 0.0 || base == 1.0 {
                return Err(domain_error("log"));
            }
            Ok(Value::Float(x.log(base)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Output;

    fn call(func: NativeFn, args: Vec<Value>) -> NativeResult {
        let out = Output::buffer();
        let mut ctx = NativeCtx { out: &out };
        func(&mut ctx, &NativeArgs::new(args))
    }

    #[test]
    fn domain_errors_are_value_errors() {
        assert_eq!(call(sqrt, vec![Value::Int(-1)]).unwrap_err().kind, ErrorKind::Value);
        assert_eq!(call(log, vec![Value::Int(0)]).unwrap_err().kind, ErrorKind::Value);
        assert_eq!(call(sqrt, vec![Value::Int(9)]).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn rounding_returns_ints() {
        assert_eq!(call(floor, vec![Value::Float(-1.5)]).unwrap(), Value::Int(-2));
        assert_eq!(call(ceil, vec![Value::Float(1.2)]).unwrap(), Value::Int(2));
        assert_eq!(call(round, vec![Value::Float(2.5)]).unwrap(), Value::Int(3));
        assert_eq!(call(floor, vec![Value::Float(f64::NAN)]).unwrap_err().kind, ErrorKind::Value);
    }

    #[test]
    fn min_max_accept_list_or_varargs() {
        let list = Value::list(vec![Value::Int(4), Value::Float(1.5), Value::Int(9)]);
        assert_eq!(call(min, vec![list.clone()]).unwrap(), Value::Float(1.5));
        assert_eq!(call(max, vec![list]).unwrap(), Value::Int(9));
        assert_eq!(call(max, vec![Value::Int(2), Value::Int(7)]).unwrap(), Value::Int(7));
        assert_eq!(call(min, vec![Value::list(vec![])]).unwrap_err().kind, ErrorKind::Value);
    }

    #[test]
    fn abs_overflow() {
        assert_eq!(call(abs, vec![Value::Int(i64::MIN)]).unwrap_err().kind, ErrorKind::Overflow);
        assert_eq!(call(abs, vec![Value::Float(-2.5)]).unwrap(), Value::Float(2.5));
    }
}
