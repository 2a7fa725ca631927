//! Tests for expressions, statements and script functions

use super::helpers::{build_vm, run, run_with};
use crate::executor::{step, Control, Step, Val};
use maplit::btreemap;

/* ===================== Expressions ===================== */

#[test]
fn test_arithmetic_and_precedence() {
    assert_eq!(run("return 1 + 2 * 3"), Val::Int(7));
    assert_eq!(run("return (1 + 2) * 3"), Val::Int(9));
    assert_eq!(run("return 7 % 3"), Val::Int(1));
    assert_eq!(run("return -4 + 1"), Val::Int(-3));
    assert_eq!(run("return 1.5 * 2"), Val::Float(3.0));
}

#[test]
fn test_division_always_yields_float() {
    assert_eq!(run("return 7 / 2"), Val::Float(3.5));
    assert_eq!(run("return 4 / 2"), Val::Float(2.0));
}

#[test]
fn test_string_and_list_concatenation() {
    assert_eq!(run(r#"return "n=" + 3"#), Val::from("n=3"));
    assert_eq!(run(r#"return "a" + "b""#), Val::from("ab"));
    assert_eq!(
        run("return [1] + [2, 3]"),
        Val::List(vec![Val::Int(1), Val::Int(2), Val::Int(3)])
    );
}

#[test]
fn test_equality_and_comparison() {
    assert_eq!(run("return 1 == 1.0"), Val::Bool(true));
    assert_eq!(run(r#"return "a" != "a""#), Val::Bool(false));
    assert_eq!(run("return [1, {a: 2}] == [1, {a: 2}]"), Val::Bool(true));
    assert_eq!(run(r#"return "apple" < "banana""#), Val::Bool(true));
    assert_eq!(run("return 2 >= 2.5"), Val::Bool(false));
}

#[test]
fn test_logical_operators_short_circuit() {
    assert_eq!(run(r#"return 0 || "x""#), Val::from("x"));
    assert_eq!(run("return 1 && 2"), Val::Int(2));
    // The right side would divide by zero if evaluated
    assert_eq!(run("return false && (1 / 0)"), Val::Bool(false));
    assert_eq!(run("return true || (1 / 0)"), Val::Bool(true));
}

#[test]
fn test_nullish_coalescing_only_skips_null() {
    assert_eq!(run(r#"return null ?? "d""#), Val::from("d"));
    assert_eq!(run("return 0 ?? 1"), Val::Int(0));
    assert_eq!(run(r#"return "" ?? "d""#), Val::from(""));
}

#[test]
fn test_not_and_truthiness() {
    assert_eq!(run("return !0"), Val::Bool(true));
    assert_eq!(run(r#"return !"""#), Val::Bool(true));
    assert_eq!(run("return ![]"), Val::Bool(false));
    assert_eq!(run("return !{}"), Val::Bool(false));
    assert_eq!(run("return !null"), Val::Bool(true));
}

#[test]
fn test_ternary() {
    assert_eq!(run(r#"return 3 > 2 ? "yes" : "no""#), Val::from("yes"));
    assert_eq!(run(r#"return null ? "yes" : "no""#), Val::from("no"));
}

#[test]
fn test_member_and_index_access() {
    let source = r#"
        let o = {name: "x", items: [10, 20, 30]}
        return [o.name, o.items[1], o["name"], o.items.length, "héllo".length, "abc"[2]]
    "#;
    assert_eq!(
        run(source),
        Val::List(vec![
            Val::from("x"),
            Val::Int(20),
            Val::from("x"),
            Val::Int(3),
            Val::Int(5),
            Val::from("c"),
        ])
    );
}

/* ===================== Statements ===================== */

#[test]
fn test_script_without_return_yields_null() {
    assert_eq!(run("let a = 1\na = a + 1"), Val::Null);
}

#[test]
fn test_inputs_bind_in_order() {
    let value = run_with(
        "return [first, second]",
        &[("first", Val::Int(1)), ("second", Val::from("two"))],
    );
    assert_eq!(value, Val::List(vec![Val::Int(1), Val::from("two")]));
}

#[test]
fn test_block_scoping_uses_fresh_bindings() {
    let source = r#"
        let x = 1
        {
            let x = 2
            x = 3
        }
        if (true) { let x = 4 }
        return x
    "#;
    assert_eq!(run(source), Val::Int(1));
}

#[test]
fn test_path_assignment() {
    let source = r#"
        let o = {a: {b: 1}, items: [1, 2]}
        o.a.b = 5
        o.items[1] = 9
        o["c"] = true
        return o
    "#;
    assert_eq!(
        run(source),
        Val::Obj(btreemap! {
            "a".to_string() => Val::Obj(btreemap! { "b".to_string() => Val::Int(5) }),
            "c".to_string() => Val::Bool(true),
            "items".to_string() => Val::List(vec![Val::Int(1), Val::Int(9)]),
        })
    );
}

#[test]
fn test_if_else_chain() {
    let source = r#"
        function grade(n) {
            if (n >= 90) { return "A" }
            else if (n >= 80) { return "B" }
            else { return "C" }
        }
        return [grade(95), grade(85), grade(10)]
    "#;
    assert_eq!(
        run(source),
        Val::List(vec![Val::from("A"), Val::from("B"), Val::from("C")])
    );
}

#[test]
fn test_while_loop() {
    assert_eq!(
        run("let i = 0\nwhile (i < 5) { i = i + 1 }\nreturn i"),
        Val::Int(5)
    );
}

#[test]
fn test_for_of_with_break_and_continue() {
    let source = r#"
        let total = 0
        for (let n of [1, 2, 3, 4, 5, 6]) {
            if (n % 2 == 0) { continue }
            if (n > 4) { break }
            total = total + n
        }
        return total
    "#;
    assert_eq!(run(source), Val::Int(4));
}

#[test]
fn test_for_in_enumerates_sorted_keys_and_indices() {
    let source = r#"
        let keys = []
        for (let k in {b: 1, a: 2}) { keys = append(keys, k) }
        for (let i in ["x", "y"]) { keys = append(keys, i) }
        return keys
    "#;
    assert_eq!(
        run(source),
        Val::List(vec![
            Val::from("a"),
            Val::from("b"),
            Val::Int(0),
            Val::Int(1),
        ])
    );
}

#[test]
fn test_for_of_string_iterates_characters() {
    let source = r#"
        let out = ""
        for (let c of "abc") { out = c + out }
        return out
    "#;
    assert_eq!(run(source), Val::from("cba"));
}

#[test]
fn test_nested_loops_break_inner_only() {
    let source = r#"
        let pairs = 0
        for (let i of range(3)) {
            for (let j of range(3)) {
                if (j > i) { break }
                pairs = pairs + 1
            }
        }
        return pairs
    "#;
    assert_eq!(run(source), Val::Int(6));
}

/* ===================== Functions ===================== */

#[test]
fn test_function_call_and_recursion() {
    let source = r#"
        function fact(n) {
            if (n <= 1) { return 1 }
            return n * fact(n - 1)
        }
        return fact(10)
    "#;
    assert_eq!(run(source), Val::Int(3628800));
}

#[test]
fn test_functions_may_be_declared_after_use() {
    let source = r#"
        return twice(21)
        function twice(x) { return double(x) }
        function double(x) { return x * 2 }
    "#;
    assert_eq!(run(source), Val::Int(42));
}

#[test]
fn test_arguments_are_passed_by_value() {
    let source = r#"
        function mutate(o) {
            o.a = 2
            return o.a
        }
        let o = {a: 1}
        let inner = mutate(o)
        return [inner, o.a]
    "#;
    assert_eq!(run(source), Val::List(vec![Val::Int(2), Val::Int(1)]));
}

#[test]
fn test_function_without_return_yields_null() {
    assert_eq!(
        run("function noop(x) { x }\nreturn noop(1)"),
        Val::Null
    );
}

/* ===================== Stepping ===================== */

#[test]
fn test_step_until_done() {
    let mut vm = build_vm("let a = 1\nreturn a + 1", &[], &[]);
    let mut steps = 0;
    while step(&mut vm) == Step::Continue {
        steps += 1;
    }
    assert!(steps > 0);
    assert_eq!(vm.control, Control::Return(Val::Int(2)));
    assert_eq!(vm.steps, steps);

    // Stepping a finished VM does nothing
    assert_eq!(step(&mut vm), Step::Done);
    assert_eq!(vm.control, Control::Return(Val::Int(2)));
}
