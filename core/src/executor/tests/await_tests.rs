//! Tests for async calls, await and batch resumption

use super::helpers::build_vm;
use crate::executor::calls::{resume_batch, resume_call};
use crate::executor::{
    errors, run_until_done, Control, ExternalResult, Suspension, Val, VM,
};

fn assert_batch(vm: &VM, expected: &[u32]) {
    assert_eq!(vm.control, Control::Suspend(Suspension::Batch));
    assert_eq!(vm.coordinator.deferred_ids(), expected);
}

fn ok(call_id: u32, value: Val) -> (u32, ExternalResult) {
    (call_id, ExternalResult::Return(value))
}

#[test]
fn test_await_future_suspends_for_batch() {
    let source = r#"
        let f = async fetch("a")
        return await f
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    assert_batch(&vm, &[1]);
    assert_eq!(vm.awaiting, Some(Val::Future(1)));

    resume_batch(&mut vm, vec![ok(1, Val::from("A"))]);
    run_until_done(&mut vm);
    assert_eq!(vm.control, Control::Return(Val::from("A")));
    assert_eq!(vm.awaiting, None);
}

#[test]
fn test_await_plain_value_is_identity() {
    let mut vm = build_vm("return await 5", &[], &[]);
    run_until_done(&mut vm);
    assert_eq!(vm.control, Control::Return(Val::Int(5)));
}

#[test]
fn test_promise_all_mixes_futures_and_values() {
    let source = r#"
        let a = async fetch(1)
        let b = async fetch(2)
        return await Promise.all([a, 7, b])
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    assert_batch(&vm, &[1, 2]);

    // Order of results does not matter
    resume_batch(&mut vm, vec![ok(2, Val::from("B")), ok(1, Val::from("A"))]);
    run_until_done(&mut vm);
    assert_eq!(
        vm.control,
        Control::Return(Val::List(vec![Val::from("A"), Val::Int(7), Val::from("B")]))
    );
}

#[test]
fn test_failed_future_in_gather_is_catchable() {
    let source = r#"
        let a = async fetch(1)
        let b = async fetch(2)
        try {
            return await Promise.all([a, b])
        } catch (e) {
            return e.message
        }
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    resume_batch(
        &mut vm,
        vec![
            ok(1, Val::Int(1)),
            (2, ExternalResult::Error("second failed".to_string())),
        ],
    );
    run_until_done(&mut vm);
    assert_eq!(vm.control, Control::Return(Val::from("second failed")));
}

#[test]
fn test_failed_future_uncaught() {
    let source = r#"
        let a = async fetch(1)
        return await a
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    resume_batch(&mut vm, vec![(1, ExternalResult::Error("nope".to_string()))]);
    run_until_done(&mut vm);

    let Control::Fault(fault) = &vm.control else {
        unreachable!("Expected Control::Fault, got {:?}", vm.control);
    };
    assert_eq!(fault.code, errors::HOST_CALL_FAILURE);
    assert_eq!(fault.message, "nope");
}

#[test]
fn test_await_resolved_future_again_does_not_suspend() {
    let source = r#"
        let f = async fetch(1)
        let first = await f
        let second = await f
        return [first, second]
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    resume_batch(&mut vm, vec![ok(1, Val::Int(3))]);
    run_until_done(&mut vm);
    assert_eq!(
        vm.control,
        Control::Return(Val::List(vec![Val::Int(3), Val::Int(3)]))
    );
}

#[test]
fn test_batch_includes_every_outstanding_call() {
    // Awaiting `a` still requires `b` to be answered in the same batch
    let source = r#"
        let a = async fetch(1)
        let b = async fetch(2)
        let x = await a
        let y = await b
        return x + y
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);
    assert_batch(&vm, &[1, 2]);
    assert_eq!(vm.awaiting, Some(Val::Future(1)));

    resume_batch(&mut vm, vec![ok(1, Val::Int(1)), ok(2, Val::Int(2))]);
    run_until_done(&mut vm);
    assert_eq!(vm.control, Control::Return(Val::Int(3)));
}

#[test]
fn test_deferred_sync_call_becomes_future() {
    let source = r#"
        let x = fetch(1)
        let y = fetch(2)
        return [await x, y]
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    run_until_done(&mut vm);

    // Defer the first call; the script receives a future and continues
    let call = vm.coordinator.in_flight.clone().unwrap();
    resume_call(&mut vm, call, ExternalResult::Defer);
    run_until_done(&mut vm);
    assert_eq!(vm.control, Control::Suspend(Suspension::Call(2)));

    let call = vm.coordinator.in_flight.clone().unwrap();
    resume_call(&mut vm, call, ExternalResult::Return(Val::from("y")));
    run_until_done(&mut vm);
    assert_batch(&vm, &[1]);

    resume_batch(&mut vm, vec![ok(1, Val::from("x"))]);
    run_until_done(&mut vm);
    assert_eq!(
        vm.control,
        Control::Return(Val::List(vec![Val::from("x"), Val::from("y")]))
    );
}

#[test]
fn test_sync_call_while_futures_outstanding() {
    let source = r#"
        let a = async fetch(1)
        let b = lookup(2)
        return [await a, b]
    "#;
    let mut vm = build_vm(source, &[], &["fetch", "lookup"]);
    run_until_done(&mut vm);
    assert_eq!(vm.control, Control::Suspend(Suspension::Call(2)));
    assert_eq!(vm.coordinator.outstanding(), 2);

    let call = vm.coordinator.in_flight.clone().unwrap();
    resume_call(&mut vm, call, ExternalResult::Return(Val::Int(20)));
    run_until_done(&mut vm);
    assert_batch(&vm, &[1]);

    resume_batch(&mut vm, vec![ok(1, Val::Int(10))]);
    run_until_done(&mut vm);
    assert_eq!(
        vm.control,
        Control::Return(Val::List(vec![Val::Int(10), Val::Int(20)]))
    );
}

#[test]
fn test_unknown_future_throws() {
    let mut vm = build_vm("return await f", &[("f", Val::Future(99))], &[]);
    run_until_done(&mut vm);
    let Control::Fault(fault) = &vm.control else {
        unreachable!("Expected Control::Fault, got {:?}", vm.control);
    };
    assert_eq!(fault.code, errors::UNKNOWN_FUTURE);
}

#[test]
fn test_outcomes_of_unreachable_futures_are_pruned() {
    let source = r#"
        let total = 0
        let i = 0
        while (i < 5) {
            let f = async fetch(i)
            total = total + await f
            i = i + 1
        }
        return total
    "#;
    let mut vm = build_vm(source, &[], &["fetch"]);
    for call_id in 1..=5 {
        run_until_done(&mut vm);
        vm.prune_resolved();
        assert_batch(&vm, &[call_id]);
        // The previous iteration's future was overwritten, so nothing is kept
        assert_eq!(vm.coordinator.resolved_count(), 0);
        resume_batch(&mut vm, vec![ok(call_id, Val::Int(10))]);
    }
    run_until_done(&mut vm);
    assert_eq!(vm.control, Control::Return(Val::Int(50)));
}

#[test]
fn test_pruning_keeps_futures_still_held() {
    let source = r#"
        let f = async fetch(1)
        let first = await f
        let g = lookup(2)
        return [first, await f, g]
    "#;
    let mut vm = build_vm(source, &[], &["fetch", "lookup"]);
    run_until_done(&mut vm);
    resume_batch(&mut vm, vec![ok(1, Val::from("A"))]);
    run_until_done(&mut vm);
    vm.prune_resolved();
    assert_eq!(vm.coordinator.resolved_count(), 1);

    let call = vm.coordinator.in_flight.clone().unwrap();
    resume_call(&mut vm, call, ExternalResult::Return(Val::from("G")));
    run_until_done(&mut vm);
    assert_eq!(
        vm.control,
        Control::Return(Val::List(vec![Val::from("A"), Val::from("A"), Val::from("G")]))
    );
}
