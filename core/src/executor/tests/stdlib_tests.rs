//! Tests for builtin functions

use super::helpers::{run, run_fault};
use crate::executor::stdlib::{call_builtin, Builtin};
use crate::executor::{errors, Val};

fn ints(values: &[i64]) -> Val {
    Val::List(values.iter().copied().map(Val::Int).collect())
}

#[test]
fn test_len() {
    assert_eq!(run("return len([1, 2, 3])"), Val::Int(3));
    assert_eq!(run(r#"return len("héllo")"#), Val::Int(5));
    assert_eq!(run("return len({a: 1, b: 2})"), Val::Int(2));
    assert_eq!(run_fault("return len(5)").code, errors::WRONG_ARG_TYPE);
    assert_eq!(run_fault("return len()").code, errors::WRONG_ARG_COUNT);
}

#[test]
fn test_conversions() {
    assert_eq!(run("return str(1.0)"), Val::from("1.0"));
    assert_eq!(run(r#"return str([1, "a"])"#), Val::from(r#"[1, "a"]"#));
    assert_eq!(run("return int(3.9)"), Val::Int(3));
    assert_eq!(run("return int(-3.9)"), Val::Int(-3));
    assert_eq!(run(r#"return int(" 42 ")"#), Val::Int(42));
    assert_eq!(run("return int(true)"), Val::Int(1));
    assert_eq!(run("return float(2)"), Val::Float(2.0));
    assert_eq!(run(r#"return float("2.5")"#), Val::Float(2.5));
    assert_eq!(run_fault(r#"return int("abc")"#).code, errors::VALUE_ERROR);
}

#[test]
fn test_keys_are_sorted() {
    assert_eq!(
        run("return keys({zeta: 1, alpha: 2, mid: 3})"),
        Val::List(vec![Val::from("alpha"), Val::from("mid"), Val::from("zeta")])
    );
}

#[test]
fn test_range_forms() {
    assert_eq!(run("return range(4)"), ints(&[0, 1, 2, 3]));
    assert_eq!(run("return range(2, 5)"), ints(&[2, 3, 4]));
    assert_eq!(run("return range(10, 0, -3)"), ints(&[10, 7, 4, 1]));
    assert_eq!(run("return range(5, 2)"), ints(&[]));
    assert_eq!(run_fault("return range(0, 5, 0)").code, errors::VALUE_ERROR);
    assert_eq!(run_fault("return range(2000000)").code, errors::VALUE_ERROR);
}

#[test]
fn test_append_returns_new_list() {
    let source = r#"
        let a = [1]
        let b = append(a, 2)
        return [a, b]
    "#;
    assert_eq!(
        run(source),
        Val::List(vec![ints(&[1]), ints(&[1, 2])])
    );
}

#[test]
fn test_math_rounding_returns_ints() {
    assert_eq!(run("return Math.floor(2.7)"), Val::Int(2));
    assert_eq!(run("return Math.floor(-2.5)"), Val::Int(-3));
    assert_eq!(run("return Math.ceil(2.1)"), Val::Int(3));
    assert_eq!(run("return Math.round(2.5)"), Val::Int(3));
    assert_eq!(run("return Math.round(-2.5)"), Val::Int(-2));
    assert_eq!(run("return Math.floor(7)"), Val::Int(7));
}

#[test]
fn test_math_abs_min_max() {
    assert_eq!(run("return Math.abs(-4)"), Val::Int(4));
    assert_eq!(run("return Math.abs(-1.5)"), Val::Float(1.5));
    assert_eq!(run("return Math.min(3, 1.5, 2)"), Val::Float(1.5));
    assert_eq!(run("return Math.max([3, 9, 2])"), Val::Int(9));
    assert_eq!(run_fault("return Math.max()").code, errors::WRONG_ARG_COUNT);
    assert_eq!(
        run_fault(r#"return Math.min(1, "2")"#).code,
        errors::WRONG_ARG_TYPE
    );
}

#[test]
fn test_builtin_errors_are_catchable() {
    let source = r#"
        try {
            return int("x")
        } catch (e) {
            return e.code
        }
    "#;
    assert_eq!(run(source), Val::from(errors::VALUE_ERROR));
}

#[test]
fn test_promise_all_builds_gather() {
    let list = Val::List(vec![Val::Future(1), Val::Int(2)]);
    assert_eq!(
        call_builtin(Builtin::PromiseAll, &[list]).unwrap(),
        Val::Gather(vec![Val::Future(1), Val::Int(2)])
    );
}

#[test]
fn test_builtin_names_round_trip() {
    assert_eq!(Builtin::from_name("Math.floor"), Some(Builtin::MathFloor));
    assert_eq!(Builtin::MathFloor.name(), "Math.floor");
    assert_eq!(Builtin::from_name("floor"), None);
}
