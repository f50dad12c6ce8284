// `io` module: console and file access.

use std::fs;
use std::io::{self, BufRead};

use log::debug;

use super::{expect_str, join_display, NativeArgs, NativeCtx, NativeFn};
use crate::error::RuntimeError;
use crate::value::Value;

pub const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("print", print),
    ("println", println),
    ("input", input),
    ("read_file", read_file),
    ("write_file", write_file),
];

type NativeResult = Result<Value, RuntimeError>;

/// Space-separated, no trailing newline.
fn print(ctx: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("print", 0, usize::MAX, &[])?;
    ctx.write(&join_display(&args.positional, " "))?;
    Ok(Value::Null)
}

fn println(ctx: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("println", 0, usize::MAX, &[])?;
    let mut line = join_display(&args.positional, " ");
    line.push('\n');
    ctx.write(&line)?;
    Ok(Value::Null)
}

/// `input(prompt = "")`: one line from stdin without its terminator, or
/// null at end of input.
pub fn input(ctx: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("input", 0, 1, &["prompt"])?;
    if let Some(prompt) = args.get(0, "prompt") {
        ctx.write(&prompt.to_string())?;
    }
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| RuntimeError::io(format!("cannot read input: {}", e)))?;
    if read == 0 {
        return Ok(Value::Null);
    }
    let trimmed = line.strip_suffix('\n').unwrap_or(&line);
    Ok(Value::str(trimmed.strip_suffix('\r').unwrap_or(trimmed)))
}

fn read_file(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("read_file", 1, 1, &[])?;
    let path = expect_str("read_file", &args.positional[0])?;
    debug!("read_file {}", path);
    fs::read_to_string(&*path)
        .map(Value::str)
        .map_err(|e| RuntimeError::io(format!("cannot read '{}': {}", path, e)))
}

/// Replaces the file's contents; non-string content is written in display form.
fn write_file(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("write_file", 2, 2, &[])?;
    let path = expect_str("write_file", &args.positional[0])?;
    debug!("write_file {}", path);
    fs::write(&*path, args.positional[1].to_string())
        .map_err(|e| RuntimeError::io(format!("cannot write '{}': {}", path, e)))?;
    Ok(Value::Null)
}
