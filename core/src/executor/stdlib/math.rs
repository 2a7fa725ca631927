//! Math.* functions

use super::{expect_args, wrong_type};
use crate::executor::errors::{self, ErrorInfo};
use crate::executor::types::Val;

/// Convert a float result back to an int, failing if it does not fit
fn float_to_int(name: &str, x: f64) -> Result<Val, ErrorInfo> {
    if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(ErrorInfo::new(
            errors::OVERFLOW,
            format!("{}() result {} does not fit in an int", name, x),
        ));
    }
    Ok(Val::Int(x as i64))
}

fn rounding(name: &str, args: &[Val], op: fn(f64) -> f64) -> Result<Val, ErrorInfo> {
    expect_args(name, args, 1)?;
    match &args[0] {
        Val::Int(n) => Ok(Val::Int(*n)),
        Val::Float(x) => float_to_int(name, op(*x)),
        other => Err(wrong_type(name, "a number", other)),
    }
}

/// Math.floor(x) - largest int not above x
pub fn floor(args: &[Val]) -> Result<Val, ErrorInfo> {
    rounding("Math.floor", args, f64::floor)
}

/// Math.ceil(x) - smallest int not below x
pub fn ceil(args: &[Val]) -> Result<Val, ErrorInfo> {
    rounding("Math.ceil", args, f64::ceil)
}

/// Math.round(x) - nearest int, halves round up
pub fn round(args: &[Val]) -> Result<Val, ErrorInfo> {
    rounding("Math.round", args, |x| (x + 0.5).floor())
}

/// Math.abs(x)
pub fn abs(args: &[Val]) -> Result<Val, ErrorInfo> {
    expect_args("Math.abs", args, 1)?;
    match &args[0] {
        Val::Int(n) => n
            .checked_abs()
            .map(Val::Int)
            .ok_or_else(|| ErrorInfo::new(errors::OVERFLOW, "Math.abs() overflowed")),
        Val::Float(x) => Ok(Val::Float(x.abs())),
        other => Err(wrong_type("Math.abs", "a number", other)),
    }
}

pub fn min(args: &[Val]) -> Result<Val, ErrorInfo> {
    extreme("Math.min", args, |candidate, best| candidate < best)
}

pub fn max(args: &[Val]) -> Result<Val, ErrorInfo> {
    extreme("Math.max", args, |candidate, best| candidate > best)
}

/// Shared body of min/max: accepts numbers as arguments or a single list.
/// The winning value keeps its original type.
fn extreme(name: &str, args: &[Val], better: fn(f64, f64) -> bool) -> Result<Val, ErrorInfo> {
    let values = match args {
        [Val::List(items)] => items.as_slice(),
        _ => args,
    };
    let mut best: Option<(&Val, f64)> = None;
    for value in values {
        let n = match value {
            Val::Int(n) => *n as f64,
            Val::Float(x) => *x,
            other => return Err(wrong_type(name, "numbers", other)),
        };
        match best {
            Some((_, current)) if !better(n, current) => {}
            _ => best = Some((value, n)),
        }
    }
    best.map(|(value, _)| value.clone()).ok_or_else(|| {
        ErrorInfo::new(
            errors::WRONG_ARG_COUNT,
            format!("{}() needs at least one number", name),
        )
    })
}
