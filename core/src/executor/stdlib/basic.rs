//! Core builtins: conversions and collection helpers

use super::{expect_args, wrong_type};
use crate::executor::errors::{self, ErrorInfo};
use crate::executor::types::Val;

/// Largest list `range()` will build
pub const MAX_RANGE_LEN: i64 = 1_000_000;

/// len(x) - length of a list, string (in characters) or object
pub fn len(args: &[Val]) -> Result<Val, ErrorInfo> {
    expect_args("len", args, 1)?;
    let n = match &args[0] {
        Val::List(items) => items.len(),
        Val::Str(s) => s.chars().count(),
        Val::Obj(map) => map.len(),
        other => return Err(wrong_type("len", "a list, string or object", other)),
    };
    Ok(Val::Int(n as i64))
}

/// str(x) - display form of any value
pub fn str(args: &[Val]) -> Result<Val, ErrorInfo> {
    expect_args("str", args, 1)?;
    Ok(Val::Str(args[0].to_string()))
}

/// int(x) - truncating conversion from numbers, bools and numeric strings
pub fn int(args: &[Val]) -> Result<Val, ErrorInfo> {
    expect_args("int", args, 1)?;
    match &args[0] {
        Val::Int(n) => Ok(Val::Int(*n)),
        Val::Bool(b) => Ok(Val::Int(i64::from(*b))),
        Val::Float(x) => {
            let t = x.trunc();
            if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(ErrorInfo::new(
                    errors::OVERFLOW,
                    format!("int() cannot convert {}", x),
                ));
            }
            Ok(Val::Int(t as i64))
        }
        Val::Str(s) => s.trim().parse::<i64>().map(Val::Int).map_err(|_| {
            ErrorInfo::new(
                errors::VALUE_ERROR,
                format!("int() cannot parse '{}'", s),
            )
        }),
        other => Err(wrong_type("int", "a number, bool or string", other)),
    }
}

/// float(x)
pub fn float(args: &[Val]) -> Result<Val, ErrorInfo> {
    expect_args("float", args, 1)?;
    match &args[0] {
        Val::Int(n) => Ok(Val::Float(*n as f64)),
        Val::Float(x) => Ok(Val::Float(*x)),
        Val::Str(s) => s.trim().parse::<f64>().map(Val::Float).map_err(|_| {
            ErrorInfo::new(
                errors::VALUE_ERROR,
                format!("float() cannot parse '{}'", s),
            )
        }),
        other => Err(wrong_type("float", "a number or string", other)),
    }
}

/// keys(obj) - object keys in sorted order
pub fn keys(args: &[Val]) -> Result<Val, ErrorInfo> {
    expect_args("keys", args, 1)?;
    match &args[0] {
        Val::Obj(map) => Ok(Val::List(map.keys().cloned().map(Val::Str).collect())),
        other => Err(wrong_type("keys", "an object", other)),
    }
}

/// range(end) | range(start, end) | range(start, end, step)
pub fn range(args: &[Val]) -> Result<Val, ErrorInfo> {
    let mut bounds = [0i64, 0, 1];
    let slots: &mut [i64] = match args.len() {
        1 => &mut bounds[1..2],
        2 => &mut bounds[0..2],
        3 => &mut bounds[..],
        n => {
            return Err(ErrorInfo::new(
                errors::WRONG_ARG_COUNT,
                format!("range() expected 1 to 3 arguments, got {}", n),
            ))
        }
    };
    for (slot, arg) in slots.iter_mut().zip(args) {
        match arg {
            Val::Int(n) => *slot = *n,
            other => return Err(wrong_type("range", "ints", other)),
        }
    }
    let [start, end, step] = bounds;
    if step == 0 {
        return Err(ErrorInfo::new(
            errors::VALUE_ERROR,
            "range() step must not be zero",
        ));
    }

    let span = if step > 0 {
        (end as i128 - start as i128).max(0)
    } else {
        (start as i128 - end as i128).max(0)
    };
    let count = (span + step.unsigned_abs() as i128 - 1) / step.unsigned_abs() as i128;
    if count > MAX_RANGE_LEN as i128 {
        return Err(ErrorInfo::new(
            errors::VALUE_ERROR,
            format!("range() would produce {} items (limit {})", count, MAX_RANGE_LEN),
        ));
    }

    let items = (0..count as i64)
        .map(|i| Val::Int((start as i128 + i as i128 * step as i128) as i64))
        .collect();
    Ok(Val::List(items))
}

/// append(list, value) - a new list with `value` added at the end
pub fn append(args: &[Val]) -> Result<Val, ErrorInfo> {
    expect_args("append", args, 2)?;
    match &args[0] {
        Val::List(items) => {
            let mut items = items.clone();
            items.push(args[1].clone());
            Ok(Val::List(items))
        }
        other => Err(wrong_type("append", "a list", other)),
    }
}

/// Promise.all(list) - combine futures so a single `await` resolves them all
pub fn promise_all(args: &[Val]) -> Result<Val, ErrorInfo> {
    expect_args("Promise.all", args, 1)?;
    match &args[0] {
        Val::List(items) => Ok(Val::Gather(items.clone())),
        other => Err(wrong_type("Promise.all", "a list", other)),
    }
}
