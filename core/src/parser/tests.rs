//! Parser tests - verify parsing and AST structure
//!
//! These tests verify that the parser correctly converts source code into AST structures.
//! They do NOT execute the code - that's tested in executor tests.

use crate::executor::types::ast::{BinaryOp, Expr, ForLoopKind, LogicalOp, MemberAccess, Stmt, VarKind};
use crate::parser::{self, ParseError};

/// Parse a script and return its top-level statements
fn body(source: &str) -> Vec<Stmt> {
    let script = parser::parse_script(source).expect("Should parse");
    match script.body {
        Stmt::Block { body, .. } => body,
        other => panic!("Expected Block body, got {:?}", other),
    }
}

/* ===================== Literals ===================== */

#[test]
fn test_parse_return_int() {
    let stmts = body("return 42");
    match &stmts[0] {
        Stmt::Return {
            value: Some(Expr::LitInt { v, .. }),
            ..
        } => assert_eq!(*v, 42),
        other => panic!("Expected Return with LitInt, got {:?}", other),
    }
}

#[test]
fn test_parse_negative_float_is_folded() {
    let expr = parser::parse_expression("-3.5").expect("Should parse");
    match expr {
        Expr::LitFloat { v, .. } => assert_eq!(v, -3.5),
        other => panic!("Expected LitFloat, got {:?}", other),
    }
}

#[test]
fn test_parse_exponent_is_float() {
    let expr = parser::parse_expression("1e3").expect("Should parse");
    assert!(matches!(expr, Expr::LitFloat { v, .. } if v == 1000.0));
}

#[test]
fn test_parse_string_escapes() {
    let expr = parser::parse_expression(r#""a\n\"b\"""#).expect("Should parse");
    match expr {
        Expr::LitStr { v, .. } => assert_eq!(v, "a\n\"b\""),
        other => panic!("Expected LitStr, got {:?}", other),
    }

    let expr = parser::parse_expression("'it\\'s'").expect("Should parse");
    assert!(matches!(expr, Expr::LitStr { ref v, .. } if v == "it's"));
}

#[test]
fn test_parse_object_and_list_literals() {
    let expr = parser::parse_expression(r#"{a: 1, "b c": [true, null], }"#).expect("Should parse");
    let Expr::LitObj { properties, .. } = expr else {
        panic!("Expected LitObj");
    };
    assert_eq!(properties.len(), 2);
    assert_eq!(properties[0].0, "a");
    assert_eq!(properties[1].0, "b c");
    match &properties[1].1 {
        Expr::LitList { elements, .. } => {
            assert!(matches!(elements[0], Expr::LitBool { v: true, .. }));
            assert!(matches!(elements[1], Expr::LitNull { .. }));
        }
        other => panic!("Expected LitList, got {:?}", other),
    }
}

#[test]
fn test_parse_integer_out_of_range() {
    let err = parser::parse_expression("99999999999999999999").unwrap_err();
    assert!(matches!(err, ParseError::BuildError(..)));
    assert!(err.message().contains("out of range"));
}

/* ===================== Operators ===================== */

#[test]
fn test_parse_precedence() {
    let expr = parser::parse_expression("1 + 2 * 3").expect("Should parse");
    let Expr::Binary { op, right, .. } = expr else {
        panic!("Expected Binary");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn test_parse_logical_and_nullish() {
    let expr = parser::parse_expression("a ?? b || c && d").expect("Should parse");
    let Expr::Logical { op, right, .. } = expr else {
        panic!("Expected Logical");
    };
    assert_eq!(op, LogicalOp::Nullish);
    let Expr::Logical { op, right, .. } = *right else {
        panic!("Expected nested Logical");
    };
    assert_eq!(op, LogicalOp::Or);
    assert!(matches!(*right, Expr::Logical { op: LogicalOp::And, .. }));
}

#[test]
fn test_parse_ternary() {
    let expr = parser::parse_expression("x > 1 ? 'big' : 'small'").expect("Should parse");
    assert!(matches!(expr, Expr::Ternary { .. }));
}

#[test]
fn test_parse_await_async_call() {
    let expr = parser::parse_expression("await async fetch(1)").expect("Should parse");
    let Expr::Await { inner, .. } = expr else {
        panic!("Expected Await");
    };
    let Expr::Async { call, .. } = *inner else {
        panic!("Expected Async");
    };
    assert!(matches!(*call, Expr::Call { .. }));
}

/* ===================== Calls ===================== */

#[test]
fn test_parse_call_with_kwargs() {
    let expr = parser::parse_expression("fetch('a', 2, timeout = 5, retry = true)")
        .expect("Should parse");
    let Expr::Call {
        callee,
        args,
        kwargs,
        ..
    } = expr
    else {
        panic!("Expected Call");
    };
    assert!(matches!(*callee, Expr::Ident { ref name, .. } if name == "fetch"));
    assert_eq!(args.len(), 2);
    assert_eq!(kwargs.len(), 2);
    assert_eq!(kwargs[0].0, "timeout");
    assert_eq!(kwargs[1].0, "retry");
}

#[test]
fn test_parse_equality_is_not_kwarg() {
    let expr = parser::parse_expression("check(a == b)").expect("Should parse");
    let Expr::Call { args, kwargs, .. } = expr else {
        panic!("Expected Call");
    };
    assert_eq!(args.len(), 1);
    assert!(kwargs.is_empty());
}

#[test]
fn test_parse_positional_after_kwarg_fails() {
    let err = parser::parse_expression("f(a = 1, 2)").unwrap_err();
    assert!(err.message().contains("Positional argument follows keyword argument"));
}

#[test]
fn test_parse_method_call_chain() {
    let expr = parser::parse_expression("client.get(1).body[0]").expect("Should parse");
    let Expr::Index { object, .. } = expr else {
        panic!("Expected Index");
    };
    let Expr::Member { object, property, .. } = *object else {
        panic!("Expected Member");
    };
    assert_eq!(property, "body");
    let Expr::Call { callee, .. } = *object else {
        panic!("Expected Call");
    };
    assert!(matches!(*callee, Expr::Member { ref property, .. } if property == "get"));
}

/* ===================== Statements ===================== */

#[test]
fn test_parse_declarations() {
    let stmts = body("let a = 1; const b = 2\nlet c");
    assert_eq!(stmts.len(), 3);
    assert!(matches!(
        stmts[0],
        Stmt::Declare { var_kind: VarKind::Let, ref name, init: Some(_), .. } if name == "a"
    ));
    assert!(matches!(stmts[1], Stmt::Declare { var_kind: VarKind::Const, .. }));
    assert!(matches!(stmts[2], Stmt::Declare { init: None, .. }));
}

#[test]
fn test_parse_const_requires_initializer() {
    let err = parser::parse_script("const x").unwrap_err();
    assert!(err.message().contains("Missing initializer"));
}

#[test]
fn test_parse_keyword_prefixed_identifiers() {
    let stmts = body("let iffy = 1\nlet format = iffy\nlet constant = format");
    assert_eq!(stmts.len(), 3);
    assert!(matches!(stmts[1], Stmt::Declare { ref name, .. } if name == "format"));
}

#[test]
fn test_parse_assign_with_path() {
    let stmts = body("x.a[i + 1].b = 5");
    let Stmt::Assign { var, path, .. } = &stmts[0] else {
        panic!("Expected Assign");
    };
    assert_eq!(var, "x");
    assert_eq!(path.len(), 3);
    assert!(matches!(path[0], MemberAccess::Prop { ref property, .. } if property == "a"));
    assert!(matches!(path[1], MemberAccess::Index { .. }));
    assert!(matches!(path[2], MemberAccess::Prop { ref property, .. } if property == "b"));
}

#[test]
fn test_parse_control_flow() {
    let source = r#"
        for (let item of items) {
            if (item == 2) { continue } else if (item > 5) { break }
        }
        for (const key in obj) { }
        while (true) { break; }
        try { throw "x" } catch (e) { return e }
    "#;
    let stmts = body(source);
    assert_eq!(stmts.len(), 4);
    assert!(matches!(
        stmts[0],
        Stmt::ForLoop { kind: ForLoopKind::Of, ref binding, .. } if binding == "item"
    ));
    assert!(matches!(stmts[1], Stmt::ForLoop { kind: ForLoopKind::In, .. }));
    assert!(matches!(stmts[2], Stmt::While { .. }));
    assert!(matches!(stmts[3], Stmt::Try { ref catch_var, .. } if catch_var == "e"));
}

#[test]
fn test_parse_bare_return() {
    let stmts = body("if (x) { return }\nreturn 1");
    let Stmt::If { then_s, .. } = &stmts[0] else {
        panic!("Expected If");
    };
    let Stmt::Block { body, .. } = then_s.as_ref() else {
        panic!("Expected Block");
    };
    assert!(matches!(body[0], Stmt::Return { value: None, .. }));
}

#[test]
fn test_parse_functions() {
    let source = r#"
        // helpers come first
        function double(n) { return n * 2 }
        function noop() {}
        return double(21)
    "#;
    let script = parser::parse_script(source).expect("Should parse");
    assert_eq!(script.functions.len(), 2);
    assert_eq!(script.functions[0].name, "double");
    assert_eq!(script.functions[0].params, vec!["n".to_string()]);
    assert!(script.functions[1].params.is_empty());
}

#[test]
fn test_parse_comments() {
    let stmts = body("/* block\ncomment */ let a = 1 // trailing\n");
    assert_eq!(stmts.len(), 1);
}

/* ===================== Errors ===================== */

#[test]
fn test_parse_error_has_position() {
    let err = parser::parse_script("let x = 1\nlet = 2").unwrap_err();
    assert!(matches!(err, ParseError::PestError(..)));
    let span = err.span().expect("Syntax errors carry a span");
    assert_eq!(span.start_line, 1);
}

#[test]
fn test_parse_keyword_as_identifier_fails() {
    assert!(parser::parse_script("let return = 1").is_err());
}

#[test]
fn test_ast_json_round_trip() {
    let script = parser::parse_script("function f(a) { return a }\nreturn f(1)").expect("Should parse");
    let json = serde_json::to_string(&script).expect("serialize");
    let back: crate::executor::types::ast::ScriptDef = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.functions.len(), 1);
    assert_eq!(back.span, script.span);
}
