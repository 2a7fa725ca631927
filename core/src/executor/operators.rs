//! Operator semantics and value access
//!
//! Every function here is pure: it takes values and returns a new value or the
//! error the script should see thrown.

use std::cmp::Ordering;

use super::errors::{self, ErrorInfo};
use super::types::ast::{BinaryOp, ForLoopKind, UnaryOp};
use super::types::Val;

/* ===================== Arithmetic & Comparison ===================== */

pub fn binary(op: BinaryOp, left: &Val, right: &Val) -> Result<Val, ErrorInfo> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arith(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arith(op, left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => divide(left, right),
        BinaryOp::Mod => modulo(left, right),
        BinaryOp::Eq => Ok(Val::Bool(loose_eq(left, right))),
        BinaryOp::Ne => Ok(Val::Bool(!loose_eq(left, right))),
        BinaryOp::Lt => compare(op, left, right, Ordering::is_lt),
        BinaryOp::Le => compare(op, left, right, Ordering::is_le),
        BinaryOp::Gt => compare(op, left, right, Ordering::is_gt),
        BinaryOp::Ge => compare(op, left, right, Ordering::is_ge),
    }
}

pub fn unary(op: UnaryOp, operand: &Val) -> Result<Val, ErrorInfo> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Val::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Val::Int(n)) => n.checked_neg().map(Val::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Val::Float(x)) => Ok(Val::Float(-x)),
        (UnaryOp::Neg, other) => Err(ErrorInfo::type_error(format!(
            "Cannot negate {} value",
            other.type_name()
        ))),
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
    }
}

fn operand_error(op: BinaryOp, left: &Val, right: &Val) -> ErrorInfo {
    ErrorInfo::type_error(format!(
        "Cannot apply '{}' to {} and {}",
        symbol(op),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> ErrorInfo {
    ErrorInfo::new(errors::OVERFLOW, "Integer overflow")
}

fn as_f64(v: &Val) -> Option<f64> {
    match v {
        Val::Int(n) => Some(*n as f64),
        Val::Float(x) => Some(*x),
        _ => None,
    }
}

fn add(left: &Val, right: &Val) -> Result<Val, ErrorInfo> {
    match (left, right) {
        (Val::Str(a), b) => Ok(Val::Str(format!("{}{}", a, b))),
        (a, Val::Str(b)) => Ok(Val::Str(format!("{}{}", a, b))),
        (Val::List(a), Val::List(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(Val::List(items))
        }
        _ => arith(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

/// Int op int stays int (checked); any float operand promotes to float
fn arith(
    op: BinaryOp,
    left: &Val,
    right: &Val,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Val, ErrorInfo> {
    if let (Val::Int(a), Val::Int(b)) = (left, right) {
        return int_op(*a, *b).map(Val::Int).ok_or_else(overflow);
    }
    match (as_f64(left), as_f64(right)) {
        (Some(a), Some(b)) => Ok(Val::Float(float_op(a, b))),
        _ => Err(operand_error(op, left, right)),
    }
}

/// `/` always produces a float
fn divide(left: &Val, right: &Val) -> Result<Val, ErrorInfo> {
    match (as_f64(left), as_f64(right)) {
        (Some(_), Some(b)) if b == 0.0 => Err(ErrorInfo::new(
            errors::DIVISION_BY_ZERO,
            "Division by zero",
        )),
        (Some(a), Some(b)) => Ok(Val::Float(a / b)),
        _ => Err(operand_error(BinaryOp::Div, left, right)),
    }
}

/// Remainder takes the sign of the dividend
fn modulo(left: &Val, right: &Val) -> Result<Val, ErrorInfo> {
    match (left, right) {
        (Val::Int(_), Val::Int(0)) => Err(ErrorInfo::new(
            errors::DIVISION_BY_ZERO,
            "Modulo by zero",
        )),
        (Val::Int(a), Val::Int(b)) => a.checked_rem(*b).map(Val::Int).ok_or_else(overflow),
        _ => match (as_f64(left), as_f64(right)) {
            (Some(_), Some(b)) if b == 0.0 => Err(ErrorInfo::new(
                errors::DIVISION_BY_ZERO,
                "Modulo by zero",
            )),
            (Some(a), Some(b)) => Ok(Val::Float(a % b)),
            _ => Err(operand_error(BinaryOp::Mod, left, right)),
        },
    }
}

/// Structural equality where ints and floats compare by numeric value
pub fn loose_eq(left: &Val, right: &Val) -> bool {
    match (left, right) {
        (Val::Int(a), Val::Float(b)) | (Val::Float(b), Val::Int(a)) => (*a as f64) == *b,
        (Val::List(a), Val::List(b)) | (Val::Gather(a), Val::Gather(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Val::Obj(a), Val::Obj(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|((ka, va), (kb, vb))| ka == kb && loose_eq(va, vb))
        }
        _ => left == right,
    }
}

fn compare(
    op: BinaryOp,
    left: &Val,
    right: &Val,
    test: fn(Ordering) -> bool,
) -> Result<Val, ErrorInfo> {
    let ordering = match (left, right) {
        (Val::Int(a), Val::Int(b)) => Some(a.cmp(b)),
        (Val::Str(a), Val::Str(b)) => Some(a.cmp(b)),
        _ => match (as_f64(left), as_f64(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(operand_error(op, left, right)),
        },
    };
    // NaN compares false against everything
    Ok(Val::Bool(ordering.map(test).unwrap_or(false)))
}

/* ===================== Member & Index Access ===================== */

/// `object.property`
pub fn get_member(object: &Val, property: &str) -> Result<Val, ErrorInfo> {
    match (object, property) {
        (Val::Obj(map), _) => map.get(property).cloned().ok_or_else(|| {
            ErrorInfo::new(
                errors::PROPERTY_NOT_FOUND,
                format!("Property '{}' not found", property),
            )
        }),
        (Val::Error(err), "code") => Ok(Val::Str(err.code.clone())),
        (Val::Error(err), "message") => Ok(Val::Str(err.message.clone())),
        (Val::List(items), "length") => Ok(Val::Int(items.len() as i64)),
        (Val::Str(s), "length") => Ok(Val::Int(s.chars().count() as i64)),
        _ => Err(ErrorInfo::type_error(format!(
            "Cannot access property '{}' on non-object value",
            property
        ))),
    }
}

/// `object[index]`
pub fn get_index(object: &Val, index: &Val) -> Result<Val, ErrorInfo> {
    match (object, index) {
        (Val::List(items), Val::Int(i)) => list_slot(items.len(), *i).map(|i| items[i].clone()),
        (Val::Str(s), Val::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            list_slot(chars.len(), *i).map(|i| Val::Str(chars[i].to_string()))
        }
        (Val::Obj(_) | Val::Error(_), Val::Str(key)) => get_member(object, key),
        _ => Err(ErrorInfo::type_error(format!(
            "Cannot index {} with {}",
            object.type_name(),
            index.type_name()
        ))),
    }
}

fn list_slot(len: usize, index: i64) -> Result<usize, ErrorInfo> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| {
            ErrorInfo::new(
                errors::INDEX_OUT_OF_RANGE,
                format!("Index {} out of range for length {}", index, len),
            )
        })
}

/// Assign `value` at `path` inside `target` (`target.a[i] = value`)
///
/// Object keys are created when missing; list indices must already exist.
pub fn set_path(target: &mut Val, path: &[Val], value: Val) -> Result<(), ErrorInfo> {
    let Some((segment, rest)) = path.split_first() else {
        *target = value;
        return Ok(());
    };

    let slot = match (target, segment) {
        (Val::Obj(map), Val::Str(key)) => {
            if rest.is_empty() {
                map.insert(key.clone(), value);
                return Ok(());
            }
            map.get_mut(key).ok_or_else(|| {
                ErrorInfo::new(
                    errors::PROPERTY_NOT_FOUND,
                    format!("Property '{}' not found", key),
                )
            })?
        }
        (Val::List(items), Val::Int(i)) => {
            let i = list_slot(items.len(), *i)?;
            &mut items[i]
        }
        (target, segment) => {
            return Err(ErrorInfo::type_error(format!(
                "Cannot assign to {} of {} value",
                describe_segment(segment),
                target.type_name()
            )))
        }
    };
    set_path(slot, rest, value)
}

fn describe_segment(segment: &Val) -> String {
    match segment {
        Val::Str(key) => format!("property '{}'", key),
        other => format!("index {}", other),
    }
}

/* ===================== Iteration ===================== */

/// Materialize the sequence a `for` loop walks over
pub fn iter_items(kind: ForLoopKind, iterable: &Val) -> Result<Vec<Val>, ErrorInfo> {
    match (kind, iterable) {
        (ForLoopKind::Of, Val::List(items)) => Ok(items.clone()),
        (ForLoopKind::Of, Val::Str(s)) => Ok(s.chars().map(|c| Val::Str(c.to_string())).collect()),
        (ForLoopKind::In, Val::Obj(map)) => Ok(map.keys().cloned().map(Val::Str).collect()),
        (ForLoopKind::In, Val::List(items)) => Ok((0..items.len() as i64).map(Val::Int).collect()),
        (ForLoopKind::Of, other) => Err(ErrorInfo::type_error(format!(
            "{} value is not iterable",
            other.type_name()
        ))),
        (ForLoopKind::In, other) => Err(ErrorInfo::type_error(format!(
            "Cannot enumerate keys of {} value",
            other.type_name()
        ))),
    }
}
