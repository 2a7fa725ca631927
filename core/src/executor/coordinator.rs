//! Call Coordinator
//!
//! Tracks every external call a run has issued but not yet consumed. Call ids
//! are allocated sequentially from 1 and never reused within a run, so the
//! `BTreeMap` key order is issuance order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::errors::{self, ErrorInfo};
use super::os::OsFunction;
use super::types::{CallId, Val};
use crate::error::ProtocolError;

/* ===================== Pending Calls ===================== */

/// An issued external call awaiting its outcome from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCall {
    pub call_id: CallId,
    pub function_name: String,
    /// `recv.f(...)`; the receiver is the first positional argument
    pub method_call: bool,
    pub args: Vec<Val>,
    pub kwargs: Vec<(String, Val)>,
    /// Set for `os.*` calls; `function_name` then holds the qualified name
    pub os_function: Option<OsFunction>,
}

/// Outcome the host supplies for a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExternalResult {
    Return(Val),
    /// Failure text; raised in the script as a `HostCallFailure` error
    Error(String),
    /// Answer later: the call becomes a future (single-call resume only)
    Defer,
}

/// A settled call as the script will observe it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallOutcome {
    Value(Val),
    Failed(ErrorInfo),
}

impl CallOutcome {
    pub fn host_failure(message: impl Into<String>) -> Self {
        CallOutcome::Failed(ErrorInfo::new(errors::HOST_CALL_FAILURE, message))
    }
}

/// How an awaited value settles right now
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    Ready(Val),
    Failed(ErrorInfo),
    /// At least one underlying call is still outstanding
    Pending,
}

/* ===================== Coordinator ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallCoordinator {
    next_call_id: CallId,
    /// Synchronous call the run is suspended on
    pub in_flight: Option<PendingCall>,
    /// Deferred calls not yet answered, in issuance order
    deferred: BTreeMap<CallId, PendingCall>,
    /// Answered deferred calls, kept so futures can be awaited repeatedly;
    /// pruned to the futures still reachable whenever the run suspends
    resolved: BTreeMap<CallId, CallOutcome>,
}

impl Default for CallCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CallCoordinator {
    pub fn new() -> Self {
        Self {
            next_call_id: 1,
            in_flight: None,
            deferred: BTreeMap::new(),
            resolved: BTreeMap::new(),
        }
    }

    /// Allocate the next run-scoped call id
    pub fn allocate(&mut self) -> Result<CallId, ErrorInfo> {
        let id = self.next_call_id;
        self.next_call_id = id
            .checked_add(1)
            .ok_or_else(|| ErrorInfo::internal("Call id space exhausted"))?;
        Ok(id)
    }

    /// Calls issued and not yet answered
    pub fn outstanding(&self) -> usize {
        self.deferred.len() + usize::from(self.in_flight.is_some())
    }

    pub fn defer(&mut self, call: PendingCall) {
        self.deferred.insert(call.call_id, call);
    }

    pub fn deferred_calls(&self) -> impl Iterator<Item = &PendingCall> {
        self.deferred.values()
    }

    pub fn deferred_ids(&self) -> Vec<CallId> {
        self.deferred.keys().copied().collect()
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Settle a future: resolved, still pending, or unknown to this run
    pub fn settle_future(&self, id: CallId) -> Settled {
        if let Some(outcome) = self.resolved.get(&id) {
            return match outcome {
                CallOutcome::Value(v) => Settled::Ready(v.clone()),
                CallOutcome::Failed(err) => Settled::Failed(err.clone()),
            };
        }
        if self.deferred.contains_key(&id) {
            return Settled::Pending;
        }
        Settled::Failed(ErrorInfo::new(
            errors::UNKNOWN_FUTURE,
            format!("Future {} does not belong to this run", id),
        ))
    }

    /// Check that `results` answers exactly the deferred set
    ///
    /// Nothing is modified; a rejected batch leaves the coordinator untouched.
    pub fn check_batch(&self, results: &[(CallId, ExternalResult)]) -> Result<(), ProtocolError> {
        let mut seen = BTreeSet::new();
        for (id, result) in results {
            if !self.deferred.contains_key(id) {
                return Err(ProtocolError::UnknownCallId(*id));
            }
            if !seen.insert(*id) {
                return Err(ProtocolError::DuplicateCallId(*id));
            }
            if matches!(result, ExternalResult::Defer) {
                return Err(ProtocolError::DeferInBatch(*id));
            }
        }
        let missing: Vec<CallId> = self
            .deferred
            .keys()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(ProtocolError::MissingCallIds(missing));
        }
        Ok(())
    }

    /// Move answered deferred calls into the resolved set
    ///
    /// Callers validate with `check_batch` first.
    pub fn resolve_batch(&mut self, results: Vec<(CallId, ExternalResult)>) {
        for (id, result) in results {
            let outcome = match result {
                ExternalResult::Return(v) => CallOutcome::Value(v),
                ExternalResult::Error(message) => CallOutcome::host_failure(message),
                ExternalResult::Defer => continue,
            };
            self.deferred.remove(&id);
            self.resolved.insert(id, outcome);
        }
    }

    /// Answered calls whose outcomes are still held
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Drop outcomes of futures outside `live`
    pub fn retain_resolved(&mut self, live: &BTreeSet<CallId>) {
        self.resolved.retain(|id, _| live.contains(id));
    }

    /// Forget deferred calls nobody awaited; returns their ids
    pub fn drop_unawaited(&mut self) -> Vec<CallId> {
        let ids = self.deferred_ids();
        self.deferred.clear();
        ids
    }
}
