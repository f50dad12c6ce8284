// `string` module. Strings are immutable; every function returns a new value.

use super::{expect_int, expect_list, expect_str, NativeArgs, NativeCtx, NativeFn};
use crate::error::RuntimeError;
use crate::value::Value;

pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("upper", upper),
    ("lower", lower),
    ("trim", trim),
    ("split", split),
    ("join", join),
    ("replace", replace),
    ("contains", contains),
    ("starts_with", starts_with),
    ("ends_with", ends_with),
    ("repeat", repeat),
    ("len", super::collections::len),
];

type NativeResult = Result<Value, RuntimeError>;

pub fn upper(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("upper", 1, 1, &[])?;
    Ok(Value::str(expect_str("upper", &args.positional[0])?.to_uppercase()))
}

pub fn lower(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("lower", 1, 1, &[])?;
    Ok(Value::str(expect_str("lower", &args.positional[0])?.to_lowercase()))
}

pub fn trim(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("trim", 1, 1, &[])?;
    Ok(Value::str(expect_str("trim", &args.positional[0])?.trim()))
}

/// `split(s, sep = null)`: a null separator splits on runs of whitespace.
pub fn split(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("split", 1, 2, &["sep"])?;
    let s = expect_str("split", &args.positional[0])?;
    let parts: Vec<Value> = match args.get(1, "sep") {
        None | Some(Value::Null) => s.split_whitespace().map(Value::str).collect(),
        Some(sep) => {
            let sep = expect_str("split", sep)?;
            if sep.is_empty() {
                return Err(RuntimeError::value("split() separator must not be empty"));
            }
            s.split(&*sep).map(Value::str).collect()
        }
    };
    Ok(Value::list(parts))
}

/// `join(list, sep = "")`; items are converted with their display form.
pub fn join(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("join", 1, 2, &["sep"])?;
    let list = expect_list("join", &args.positional[0])?;
    let sep = match args.get(1, "sep") {
        Some(v) => expect_str("join", v)?.to_string(),
        None => String::new(),
    };
    let joined = super::join_display(&list.borrow(), &sep);
    Ok(Value::str(joined))
}

pub fn replace(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("replace", 3, 3, &[])?;
    let s = expect_str("replace", &args.positional[0])?;
    let from = expect_str("replace", &args.positional[1])?;
    let to = expect_str("replace", &args.positional[2])?;
    if from.is_empty() {
        return Err(RuntimeError::value("replace() pattern must not be empty"));
    }
    Ok(Value::str(s.replace(&*from, &to)))
}

pub fn contains(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("contains", 2, 2, &[])?;
    let s = expect_str("contains", &args.positional[0])?;
    let sub = expect_str("contains", &args.positional[1])?;
    Ok(Value::Bool(s.contains(&*sub)))
}

pub fn starts_with(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("starts_with", 2, 2, &[])?;
    let s = expect_str("starts_with", &args.positional[0])?;
    let prefix = expect_str("starts_with", &args.positional[1])?;
    Ok(Value::Bool(s.starts_with(&*prefix)))
}

pub fn ends_with(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("ends_with", 2, 2, &[])?;
    let s = expect_str("ends_with", &args.positional[0])?;
    let suffix = expect_str("ends_with", &args.positional[1])?;
    Ok(Value::Bool(s.ends_with(&*suffix)))
}

pub fn repeat(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("repeat", 2, 2, &[])?;
    let s = expect_str("repeat", &args.positional[0])?;
    let n = expect_int("repeat", &args.positional[1])?;
    Ok(Value::str(s.repeat(usize::try_from(n).unwrap_or(0))))
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
    fn split_and_join() {
        let parts = call(split, vec![Value::str("a,b,,c"), Value::str(",")]).unwrap();
        assert_eq!(parts.to_string(), r#"["a", "b", "", "c"]"#);
        let words = call(split, vec![Value::str("  hello   world ")]).unwrap();
        assert_eq!(words.to_string(), r#"["hello", "world"]"#);
        let joined = call(join, vec![words, Value::str("-")]).unwrap();
        assert_eq!(joined, Value::str("hello-world"));
    }

    #[test]
    fn case_and_predicates() {
        assert_eq!(call(upper, vec![Value::str("abc")]).unwrap(), Value::str("ABC"));
        assert_eq!(call(starts_with, vec![Value::str("lumen"), Value::str("lu")]).unwrap(), Value::Bool(true));
        assert_eq!(call(ends_with, vec![Value::str("lumen"), Value::str("lu")]).unwrap(), Value::Bool(false));
        assert_eq!(call(repeat, vec![Value::str("ab"), Value::Int(-1)]).unwrap(), Value::str(""));
    }

    #[test]
    fn non_string_argument_is_a_type_error() {
        let err = call(upper, vec![Value::Int(1)]).unwrap_err();
        assert_eq!(err.message, "upper() expected a string, got 'int'");
    }
}
