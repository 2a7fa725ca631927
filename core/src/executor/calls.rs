//! External calls, await and resumption
//!
//! The interpreter never performs an external or OS call. It records the call
//! with the coordinator and either suspends (synchronous call) or hands the
//! script a future (`async` call). `await` suspends for a batch when anything it
//! depends on is still outstanding.

use super::coordinator::{ExternalResult, PendingCall, Settled};
use super::errors::{self, ErrorInfo};
use super::exec_loop::{limit_exceeded, pop, pop_n, throw, top};
use super::os::OsFunction;
use super::types::{CallId, Control, Suspension, Val};
use super::vm::VM;

/* ===================== Issuing Calls ===================== */

pub(crate) fn issue_external(
    vm: &mut VM,
    name: &str,
    argc: usize,
    kwnames: &[String],
    method_call: bool,
    deferred: bool,
) -> Result<(), ErrorInfo> {
    let Some(call) = record_call(vm, name.to_string(), argc, kwnames, method_call, None)? else {
        return Ok(());
    };

    if deferred {
        tracing::debug!(call_id = call.call_id, function = name, "deferred external call");
        let call_id = call.call_id;
        vm.coordinator.defer(call);
        top(vm)?.stack.push(Val::Future(call_id));
    } else {
        suspend_on(vm, call);
    }
    Ok(())
}

/// `os.<function>(...)` always suspends; the host performs the system call
pub(crate) fn issue_os(
    vm: &mut VM,
    function: OsFunction,
    argc: usize,
    kwnames: &[String],
) -> Result<(), ErrorInfo> {
    let name = function.qualified_name();
    if let Some(call) = record_call(vm, name, argc, kwnames, false, Some(function))? {
        suspend_on(vm, call);
    }
    Ok(())
}

/// Pop the call's arguments and allocate its id
///
/// `None` means the pending-call limit ended the run.
fn record_call(
    vm: &mut VM,
    function_name: String,
    argc: usize,
    kwnames: &[String],
    method_call: bool,
    os_function: Option<OsFunction>,
) -> Result<Option<PendingCall>, ErrorInfo> {
    if vm.coordinator.outstanding() >= vm.limits.max_pending_calls {
        limit_exceeded(
            vm,
            format!(
                "Pending external call limit of {} exceeded",
                vm.limits.max_pending_calls
            ),
        );
        return Ok(None);
    }

    let frame = top(vm)?;
    let kwvalues = pop_n(frame, kwnames.len())?;
    let args = pop_n(frame, argc)?;
    let call_id = vm.coordinator.allocate()?;
    Ok(Some(PendingCall {
        call_id,
        function_name,
        method_call,
        args,
        kwargs: kwnames.iter().cloned().zip(kwvalues).collect(),
        os_function,
    }))
}

fn suspend_on(vm: &mut VM, call: PendingCall) {
    tracing::debug!(call_id = call.call_id, function = %call.function_name, "suspending on external call");
    vm.control = Control::Suspend(Suspension::Call(call.call_id));
    vm.coordinator.in_flight = Some(call);
}

/* ===================== Await ===================== */

pub(crate) fn await_value(vm: &mut VM) -> Result<(), ErrorInfo> {
    let value = pop(top(vm)?)?;
    match settle(vm, &value) {
        Settled::Ready(v) => top(vm)?.stack.push(v),
        Settled::Failed(err) => return Err(err),
        Settled::Pending => {
            tracing::debug!(
                pending = vm.coordinator.deferred_ids().len(),
                "suspending on await"
            );
            vm.awaiting = Some(value);
            vm.control = Control::Suspend(Suspension::Batch);
        }
    }
    Ok(())
}

/// What `await value` produces given the calls answered so far
fn settle(vm: &VM, value: &Val) -> Settled {
    match value {
        Val::Future(id) => vm.coordinator.settle_future(*id),
        Val::Gather(items) => {
            let settled: Vec<Settled> = items
                .iter()
                .map(|item| match item {
                    Val::Future(id) => vm.coordinator.settle_future(*id),
                    other => Settled::Ready(other.clone()),
                })
                .collect();
            if settled.iter().any(|s| matches!(s, Settled::Pending)) {
                return Settled::Pending;
            }
            let mut values = Vec::with_capacity(settled.len());
            for s in settled {
                match s {
                    Settled::Ready(v) => values.push(v),
                    failed => return failed,
                }
            }
            Settled::Ready(Val::List(values))
        }
        other => Settled::Ready(other.clone()),
    }
}

/* ===================== Resumption ===================== */

/// Deliver the outcome of the synchronous call the VM is suspended on
///
/// The caller has already matched `call.call_id` against the suspension.
pub(crate) fn resume_call(vm: &mut VM, call: PendingCall, result: ExternalResult) {
    vm.control = Control::None;
    vm.coordinator.in_flight = None;
    let call_id = call.call_id;

    match result {
        ExternalResult::Return(value) => push_result(vm, value),
        ExternalResult::Error(message) => {
            throw(vm, host_failure(message));
        }
        ExternalResult::Defer => {
            tracing::debug!(call_id, "external call deferred by host");
            vm.coordinator.defer(call);
            push_result(vm, Val::Future(call_id));
        }
    }
}

/// Deliver a validated batch and complete the blocked `await`
pub(crate) fn resume_batch(vm: &mut VM, results: Vec<(CallId, ExternalResult)>) {
    vm.control = Control::None;
    vm.coordinator.resolve_batch(results);

    let Some(value) = vm.awaiting.take() else {
        throw(
            vm,
            Val::Error(ErrorInfo::internal("Batch resumed with no pending await")),
        );
        return;
    };
    match settle(vm, &value) {
        Settled::Ready(v) => push_result(vm, v),
        Settled::Failed(err) => throw(vm, Val::Error(err)),
        Settled::Pending => {
            vm.awaiting = Some(value);
            vm.control = Control::Suspend(Suspension::Batch);
        }
    }
}

/// Push a value delivered by the host; it is held to the same value limits
/// as anything the script builds
fn push_result(vm: &mut VM, value: Val) {
    if let Err(message) = vm.limits.check_value(&value) {
        limit_exceeded(vm, message);
        return;
    }
    match vm.frames.last_mut() {
        Some(frame) => frame.stack.push(value),
        None => throw(
            vm,
            Val::Error(ErrorInfo::internal("Resumed a run with no frames")),
        ),
    }
}

fn host_failure(message: String) -> Val {
    Val::Error(ErrorInfo::new(errors::HOST_CALL_FAILURE, message))
}
