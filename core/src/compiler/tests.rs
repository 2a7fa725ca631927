//! Tests for lowering scripts to instructions

use std::collections::BTreeSet;

use super::*;
use crate::executor::os::OsFunction;
use crate::executor::stdlib::Builtin;
use crate::executor::types::ast::BinaryOp;
use crate::parser::parse_script;

fn compile_with(source: &str, inputs: &[&str], externals: &[&str]) -> CompileResult<CompiledProgram> {
    let script = parse_script(source).expect("Parse should succeed");
    let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
    let externals: BTreeSet<String> = externals.iter().map(|s| s.to_string()).collect();
    compile(&script, "test.st", &inputs, &externals)
}

fn compile_ok(source: &str) -> CompiledProgram {
    compile_with(source, &[], &[]).expect("Compile should succeed")
}

fn compile_err(source: &str) -> ValidationError {
    compile_with(source, &[], &[]).expect_err("Compile should fail")
}

#[test]
fn test_main_is_first_function() {
    let program = compile_ok("function helper(a, b) { return a }\nreturn helper(1, 2)");
    let names: Vec<&str> = program.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec![MAIN_FUNCTION, "helper"]);
    assert_eq!(program.functions[1].arity, 2);
    assert_eq!(program.function_name(1), "helper");
    assert_eq!(program.main().map(|f| f.arity), Some(0));
}

#[test]
fn test_instruction_shape() {
    let program = compile_with("return x + 1", &["x"], &[]).unwrap();
    assert_eq!(
        program.functions[0].code,
        vec![
            Instr::LoadLocal(0),
            Instr::Const(Val::Int(1)),
            Instr::Binary(BinaryOp::Add),
            Instr::Return,
            Instr::Const(Val::Null),
            Instr::Return,
        ]
    );
}

#[test]
fn test_every_declaration_gets_fresh_slot() {
    let source = r#"
        let a = 1
        { let a = 2 }
        { let b = 3 }
        return a
    "#;
    let program = compile_with(source, &["input"], &[]).unwrap();
    assert_eq!(program.functions[0].num_locals, 4);
    // `return a` reads the outer binding in slot 1, after the input
    let code = &program.functions[0].code;
    assert!(code.contains(&Instr::LoadLocal(1)));
}

#[test]
fn test_for_loop_uses_hidden_slots() {
    let program = compile_ok("for (let x of [1]) { x }");
    // list, index, binding
    assert_eq!(program.functions[0].num_locals, 3);
    assert!(program.functions[0]
        .code
        .iter()
        .any(|i| matches!(i, Instr::ForNext { var_slot: 2, .. })));
}

#[test]
fn test_externals_are_sorted_and_calls_are_lowered() {
    let program = compile_with(
        "let c = {}\nreturn c.query(1, limit = 2) + async fetch(3)",
        &[],
        &["query", "fetch"],
    )
    .unwrap();
    assert_eq!(program.externals, vec!["fetch", "query"]);

    let calls: Vec<&Instr> = program.functions[0]
        .code
        .iter()
        .filter(|i| matches!(i, Instr::CallExternal { .. }))
        .collect();
    assert_eq!(
        calls,
        vec![
            &Instr::CallExternal {
                name: "query".to_string(),
                argc: 2,
                kwnames: vec!["limit".to_string()],
                method_call: true,
                deferred: false,
            },
            &Instr::CallExternal {
                name: "fetch".to_string(),
                argc: 1,
                kwnames: vec![],
                method_call: false,
                deferred: true,
            },
        ]
    );
}

#[test]
fn test_os_calls_are_lowered() {
    let program = compile_ok("return os.write_text('out.txt', 'hi', append = true)");
    let code = &program.functions[0].code;
    assert!(code.contains(&Instr::CallOs {
        function: OsFunction::WriteText,
        argc: 2,
        kwnames: vec!["append".to_string()],
    }));
    assert!(program.externals.is_empty());

    let err = compile_err("return os.spawn()");
    assert!(err.message.contains("Unknown OS function 'os.spawn'"));

    let err = compile_err("return async os.time()");
    assert!(err.message.contains("'async'"));
}

#[test]
fn test_builtins_resolve_at_compile_time() {
    let program = compile_ok("return Math.floor(len([1.5]))");
    let code = &program.functions[0].code;
    assert!(code.contains(&Instr::CallBuiltin {
        builtin: Builtin::Len,
        argc: 1
    }));
    assert!(code.contains(&Instr::CallBuiltin {
        builtin: Builtin::MathFloor,
        argc: 1
    }));
}

#[test]
fn test_break_inside_try_pops_handler() {
    let program = compile_ok("while (true) { try { break } catch (e) { e } }");
    let code = &program.functions[0].code;
    let setup = code
        .iter()
        .position(|i| matches!(i, Instr::SetupTry { .. }))
        .unwrap();
    // The break emits its own PopTry before jumping out
    assert_eq!(code[setup + 1], Instr::PopTry);
    assert!(matches!(code[setup + 2], Instr::Jump(_)));
}

#[test]
fn test_compile_errors() {
    let err = compile_err("return nope");
    assert!(err.message.contains("Undefined variable 'nope'"));
    assert_eq!(err.rule_id, "compile");

    let err = compile_err("return mystery()");
    assert!(err.message.contains("Unknown function 'mystery'"));

    let err = compile_err("function f(a) { return a }\nreturn f()");
    assert!(err.message.contains("expects 1 argument(s), got 0"));

    let err = compile_err("return async len([])");
    assert!(err.message.contains("'async'"));

    let err = compile_err("return len(x = 1)");
    assert!(err.message.contains("Keyword arguments"));

    let err = compile_err("break");
    assert!(err.message.contains("'break' outside of a loop"));
}

#[test]
fn test_compiled_program_round_trips() {
    let program = compile_with(
        "let r = fetch(1, mode = 'x')\nreturn [r, 1.5, null, {k: true}]",
        &[],
        &["fetch"],
    )
    .unwrap();
    let bytes = postcard::to_allocvec(&program).unwrap();
    let restored: CompiledProgram = postcard::from_bytes(&bytes).unwrap();
    assert_eq!(restored, program);
}
