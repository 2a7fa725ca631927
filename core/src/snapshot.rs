//! Snapshot and Future-Snapshot
//!
//! A snapshot is a frozen VM plus the call it is waiting on. Resuming never
//! touches the snapshot: the captured VM is cloned and the clone runs on, so
//! the same snapshot can be resumed again (retry after a crash, fan-out, ...).

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, ProtocolError};
use crate::executor::calls;
use crate::executor::types::CallId;
use crate::executor::{ExternalResult, PendingCall, VM};
use crate::format::{self, ArtifactKind};
use crate::progress::{drive, Progress};

/* ===================== Snapshot ===================== */

/// A run suspended on exactly one synchronous external call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    call: PendingCall,
    vm: VM,
}

impl Snapshot {
    pub(crate) fn capture(call: PendingCall, vm: VM) -> Self {
        Self { call, vm }
    }

    /// The call this snapshot waits on
    pub fn call(&self) -> &PendingCall {
        &self.call
    }

    pub fn call_id(&self) -> CallId {
        self.call.call_id
    }

    pub fn script_name(&self) -> &str {
        &self.vm.program.script_name
    }

    /// Continue the run with the outcome of the pending call
    ///
    /// `call_id` must name the pending call; anything else is rejected before
    /// any state is touched.
    pub fn resume(&self, call_id: CallId, result: ExternalResult) -> Result<Progress, ProtocolError> {
        if call_id != self.call.call_id {
            return Err(ProtocolError::CallIdMismatch {
                expected: self.call.call_id,
                received: call_id,
            });
        }
        tracing::debug!(script = %self.script_name(), call_id, "resuming call");

        let mut vm = self.vm.clone();
        calls::resume_call(&mut vm, self.call.clone(), result);
        Ok(drive(vm))
    }

    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        format::encode(ArtifactKind::Snapshot, self)
    }

    pub fn load(bytes: &[u8]) -> Result<Self, DecodeError> {
        format::decode(ArtifactKind::Snapshot, bytes)
    }
}

/* ===================== FutureSnapshot ===================== */

/// A run suspended in `await` until every outstanding deferred call is answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureSnapshot {
    vm: VM,
}

impl FutureSnapshot {
    pub(crate) fn capture(vm: VM) -> Self {
        Self { vm }
    }

    /// Outstanding calls in issuance order
    pub fn pending_calls(&self) -> Vec<&PendingCall> {
        self.vm.coordinator.deferred_calls().collect()
    }

    pub fn pending_call_ids(&self) -> Vec<CallId> {
        self.vm.coordinator.deferred_ids()
    }

    pub fn script_name(&self) -> &str {
        &self.vm.program.script_name
    }

    /// Continue the run with outcomes for every pending call
    ///
    /// Order of `results` does not matter; the script observes outcomes by
    /// call. Partial, duplicated or unknown entries are rejected.
    pub fn resume(&self, results: Vec<(CallId, ExternalResult)>) -> Result<Progress, ProtocolError> {
        self.vm.coordinator.check_batch(&results)?;
        tracing::debug!(script = %self.script_name(), calls = results.len(), "resuming batch");

        let mut vm = self.vm.clone();
        calls::resume_batch(&mut vm, results);
        Ok(drive(vm))
    }

    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        format::encode(ArtifactKind::FutureSnapshot, self)
    }

    pub fn load(bytes: &[u8]) -> Result<Self, DecodeError> {
        format::decode(ArtifactKind::FutureSnapshot, bytes)
    }
}
