// `time` module.

use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use super::{expect_number, NativeArgs, NativeCtx, NativeFn};
use crate::error::RuntimeError;
use crate::value::Value;

pub const FUNCTIONS: &[(&str, NativeFn)] = &[("now", now), ("clock", clock), ("sleep", sleep)];

static START: OnceLock<Instant> = OnceLock::new();

type NativeResult = Result<Value, RuntimeError>;

/// Seconds since the Unix epoch.
fn now(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("now", 0, 0, &[])?;
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(Value::Float(secs))
}

/// Monotonic seconds since the first call; use differences for timing.
fn clock(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("clock", 0, 0, &[])?;
    Ok(Value::Float(START.get_or_init(Instant::now).elapsed().as_secs_f64()))
}

fn sleep(_: &mut NativeCtx<'_>, args: &NativeArgs) -> NativeResult {
    args.check("sleep", 1, 1, &[])?;
    let secs = expect_number("sleep", &args.positional[0])?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(RuntimeError::value(format!("sleep() needs a non-negative duration, got {}", secs)));
    }
    thread::sleep(Duration::from_secs_f64(secs));
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Output;

    #[test]
    fn clock_is_monotonic() {
        let out = Output::buffer();
        let mut ctx = NativeCtx { out: &out };
        let args = NativeArgs::default();
        let (Value::Float(a), Value::Float(b)) = (clock(&mut ctx, &args).unwrap(), clock(&mut ctx, &args).unwrap()) else {
            panic!("clock() must return floats");
        };
        assert!(b >= a);
        assert!(sleep(&mut ctx, &NativeArgs::new(vec![Value::Int(-1)])).is_err());
    }
}
