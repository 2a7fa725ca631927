//! Tests for external calls: suspension, call records and resumption

use super::helpers::build_vm;
use crate::executor::calls::resume_call;
use crate::executor::{
    errors, run_until_done, Control, ExternalResult, PendingCall, Suspension, Val, VM,
};
use maplit::btreemap;

/// Take the call a suspended VM is waiting on
fn in_flight(vm: &VM) -> PendingCall {
    let Control::Suspend(Suspension::Call(call_id)) = &vm.control else {
        unreachable!("Expected a suspended call, got {:?}", vm.control);
    };
    let call = vm.coordinator.in_flight.clone().expect("No in-flight call");
    assert_eq!(call.call_id, *call_id);
    call
}

fn answer(vm: &mut VM, result: ExternalResult) {
    let call = in_flight(vm);
    resume_call(vm, call, result);
    run_until_done(vm);
}

#[test]
fn test_external_call_suspends() {
    let mut vm = build_vm(r#"return read_file("a.txt")"#, &[], &["read_file"]);
    run_until_done(&mut vm);

    let call = in_flight(&vm);
    assert_eq!(call.call_id, 1);
    assert_eq!(call.function_name, "read_file");
    assert!(!call.method_call);
    assert_eq!(call.args, vec![Val::from("a.txt")]);
    assert!(call.kwargs.is_empty());

    // The frame is still live and nothing has been returned
    assert_eq!(vm.frames.len(), 1);
}

#[test]
fn test_resume_with_value() {
    let mut vm = build_vm(
        r#"let text = read_file("a.txt")
        return text + "!""#,
        &[],
        &["read_file"],
    );
    run_until_done(&mut vm);
    answer(&mut vm, ExternalResult::Return(Val::from("hello")));
    assert_eq!(vm.control, Control::Return(Val::from("hello!")));
    assert!(vm.coordinator.in_flight.is_none());
}

#[test]
fn test_method_call_with_kwargs() {
    let source = r#"
        let db = {name: "main"}
        return db.query("select 1", limit = 5, strict = true)
    "#;
    let mut vm = build_vm(source, &[], &["query"]);
    run_until_done(&mut vm);

    let call = in_flight(&vm);
    assert_eq!(call.function_name, "query");
    assert!(call.method_call);
    assert_eq!(
        call.args,
        vec![
            Val::Obj(btreemap! { "name".to_string() => Val::from("main") }),
            Val::from("select 1"),
        ]
    );
    assert_eq!(
        call.kwargs,
        vec![
            ("limit".to_string(), Val::Int(5)),
            ("strict".to_string(), Val::Bool(true)),
        ]
    );
}

#[test]
fn test_call_ids_are_sequential() {
    let source = r#"
        let a = fetch(1)
        let b = fetch(2)
        return a + b
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    assert_eq!(in_flight(&vm).call_id, 1);

    answer(&mut vm, ExternalResult::Return(Val::Int(10)));
    let second = in_flight(&vm);
    assert_eq!(second.call_id, 2);
    assert_eq!(second.args, vec![Val::Int(2)]);

    answer(&mut vm, ExternalResult::Return(Val::Int(5)));
    assert_eq!(vm.control, Control::Return(Val::Int(15)));
}

#[test]
fn test_host_error_is_catchable() {
    let source = r#"
        try {
            return fetch("x")
        } catch (e) {
            return [e.code, e.message]
        }
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    answer(&mut vm, ExternalResult::Error("connection refused".to_string()));
    assert_eq!(
        vm.control,
        Control::Return(Val::List(vec![
            Val::from(errors::HOST_CALL_FAILURE),
            Val::from("connection refused"),
        ]))
    );
}

#[test]
fn test_uncaught_host_error_faults() {
    let source = r#"
        function load() { return fetch(1) }
        return load()
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    answer(&mut vm, ExternalResult::Error("timeout".to_string()));

    let Control::Fault(fault) = &vm.control else {
        unreachable!("Expected Control::Fault, got {:?}", vm.control);
    };
    assert_eq!(fault.code, errors::HOST_CALL_FAILURE);
    assert_eq!(fault.message, "timeout");
    assert_eq!(fault.function, "load");
}

#[test]
fn test_external_call_inside_function_and_loop() {
    let source = r#"
        function total(ids) {
            let sum = 0
            for (let id of ids) { sum = sum + price(id) }
            return sum
        }
        return total([1, 2, 3])
    "#;
    let mut vm = build_vm(source, &[], &["price"]);
    run_until_done(&mut vm);
    for expected in 1..=3 {
        let call = in_flight(&vm);
        assert_eq!(call.args, vec![Val::Int(expected)]);
        answer(&mut vm, ExternalResult::Return(Val::Int(expected * 10)));
    }
    assert_eq!(vm.control, Control::Return(Val::Int(60)));
}

#[test]
fn test_async_call_returns_future_without_suspending() {
    let source = r#"
        let f = async fetch(1)
        return f
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    assert_eq!(vm.control, Control::Return(Val::Future(1)));
    assert_eq!(vm.coordinator.deferred_ids(), vec![1]);
}

#[test]
fn test_suspended_vm_survives_serialization() {
    let mut vm = build_vm(
        r#"let n = fetch(1)
        return n * 2"#,
        &[],
        &["fetch"],
    );
    run_until_done(&mut vm);

    let bytes = postcard::to_allocvec(&vm).unwrap();
    let mut restored: VM = postcard::from_bytes(&bytes).unwrap();
    assert_eq!(restored, vm);

    answer(&mut restored, ExternalResult::Return(Val::Int(21)));
    assert_eq!(restored.control, Control::Return(Val::Int(42)));
}
