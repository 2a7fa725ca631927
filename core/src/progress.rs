//! Progress of a run
//!
//! Every start or resume drives the VM to its next stopping point and turns
//! that point into a `Progress` value, the only thing a caller ever sees.

use crate::executor::types::{CallId, Control, Suspension, Val};
use crate::executor::{run_until_done, ErrorInfo, PendingCall, ScriptFault, VM};
use crate::snapshot::{FutureSnapshot, Snapshot};

/// Outcome of advancing a run
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// The script returned a value
    Completed(Val),
    /// An error escaped the script or a resource limit was hit
    Failed(ScriptFault),
    /// The script called an external function and waits for its result
    CallRequested { call: PendingCall, snapshot: Snapshot },
    /// The script awaits deferred calls; all of them must be answered together
    BatchRequested {
        call_ids: Vec<CallId>,
        snapshot: FutureSnapshot,
    },
}

impl Progress {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Progress::Completed(_) | Progress::Failed(_))
    }

    pub fn into_completed(self) -> Option<Val> {
        match self {
            Progress::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_call(self) -> Option<(PendingCall, Snapshot)> {
        match self {
            Progress::CallRequested { call, snapshot } => Some((call, snapshot)),
            _ => None,
        }
    }

    pub fn into_batch(self) -> Option<(Vec<CallId>, FutureSnapshot)> {
        match self {
            Progress::BatchRequested { call_ids, snapshot } => Some((call_ids, snapshot)),
            _ => None,
        }
    }
}

/// Run `vm` to its next stopping point and package the result
pub(crate) fn drive(mut vm: VM) -> Progress {
    run_until_done(&mut vm);
    let script = vm.program.script_name.clone();
    if matches!(vm.control, Control::Suspend(_)) {
        vm.prune_resolved();
    }

    match std::mem::replace(&mut vm.control, Control::None) {
        Control::Return(value) => {
            let dropped = vm.coordinator.drop_unawaited();
            if !dropped.is_empty() {
                tracing::warn!(%script, call_ids = ?dropped, "completed with unawaited deferred calls");
            }
            tracing::debug!(%script, steps = vm.steps, "run completed");
            Progress::Completed(value)
        }

        Control::Fault(fault) => {
            tracing::debug!(%script, code = %fault.code, function = %fault.function, "run failed");
            Progress::Failed(fault)
        }

        Control::Suspend(Suspension::Call(call_id)) => {
            vm.control = Control::Suspend(Suspension::Call(call_id));
            match vm.coordinator.in_flight.take() {
                Some(call) if call.call_id == call_id => {
                    tracing::debug!(%script, call_id, function = %call.function_name, "call requested");
                    Progress::CallRequested {
                        snapshot: Snapshot::capture(call.clone(), vm),
                        call,
                    }
                }
                _ => internal_failure(&vm, "suspended without an in-flight call"),
            }
        }

        Control::Suspend(Suspension::Batch) => {
            vm.control = Control::Suspend(Suspension::Batch);
            let call_ids = vm.coordinator.deferred_ids();
            tracing::debug!(%script, ?call_ids, "batch requested");
            Progress::BatchRequested {
                call_ids,
                snapshot: FutureSnapshot::capture(vm),
            }
        }

        Control::None | Control::Throw { .. } => internal_failure(&vm, "run stopped without an outcome"),
    }
}

fn internal_failure(vm: &VM, message: &str) -> Progress {
    let err = ErrorInfo::internal(message);
    Progress::Failed(ScriptFault::from_thrown(
        &Val::Error(err),
        vm.current_function(),
    ))
}
