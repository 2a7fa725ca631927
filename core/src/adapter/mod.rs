//! Host adapter
//!
//! The boundary a host process drives the engine through. Programs and
//! snapshots live in generational arenas owned by an `Engine`; the host only
//! ever holds `{ index, generation }` handles. Values cross the boundary as
//! JSON text and state crosses it as versioned bytes.
//!
//! Ownership mirrors a C-style API: every handle the engine returns stays
//! valid until the host frees it, and resuming a snapshot does not consume it.

pub mod arena;


use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::{CompileError, DecodeError, InputError, ProtocolError};
use crate::executor::types::{CallId, Val};
use crate::executor::{ExternalResult, PendingCall, ResourceLimits};
use crate::json;
use crate::program::Program;
use crate::progress::Progress;
use crate::snapshot::{FutureSnapshot, Snapshot};

use arena::{Arena, Handle};

/* ===================== Handles ===================== */

macro_rules! typed_handle {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Handle);
    };
}

typed_handle!(RunHandle);
typed_handle!(SnapshotHandle);
typed_handle!(FutureHandle);

/* ===================== Errors ===================== */

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("stale or unknown {kind} handle")]
    StaleHandle { kind: &'static str },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode state: {0}")]
    Encode(#[from] postcard::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/* ===================== Progress Result ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressKind {
    Complete,
    Failed,
    FunctionCall,
    /// An `os.*` call; answered with `snapshot_resume` like a function call
    OsCall,
    ResolveFutures,
}

/// Flattened progress as handed to the host
///
/// `kind` decides which fields are set; all others are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressResult {
    pub kind: ProgressKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_call: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kwargs_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
    #[serde(skip)]
    pub snapshot: Option<SnapshotHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_call_ids: Option<Vec<CallId>>,
    /// JSON array of `PendingCallRecord`, in issuance order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_calls_json: Option<String>,
    #[serde(skip)]
    pub future_snapshot: Option<FutureHandle>,
}

impl ProgressResult {
    fn empty(kind: ProgressKind) -> Self {
        Self {
            kind,
            result_json: None,
            error_code: None,
            error_message: None,
            error_function: None,
            function_name: None,
            os_function: None,
            method_call: None,
            args_json: None,
            kwargs_json: None,
            call_id: None,
            snapshot: None,
            pending_call_ids: None,
            pending_calls_json: None,
            future_snapshot: None,
        }
    }
}

/// A call the host is asked to perform, as listed for a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingCallRecord {
    pub call_id: CallId,
    pub function_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_function: Option<String>,
    pub method_call: bool,
    /// Positional arguments; a method call's receiver comes first
    pub args: Value,
    pub kwargs: Value,
}

impl PendingCallRecord {
    fn from_call(call: &PendingCall) -> Self {
        Self {
            call_id: call.call_id,
            function_name: call.function_name.clone(),
            os_function: call.os_function.map(|_| call.function_name.clone()),
            method_call: call.method_call,
            args: Value::Array(call.args.iter().map(json::val_to_json).collect()),
            kwargs: kwargs_json(&call.kwargs),
        }
    }
}

fn kwargs_json(kwargs: &[(String, Val)]) -> Value {
    Value::Object(
        kwargs
            .iter()
            .map(|(k, v)| (k.clone(), json::val_to_json(v)))
            .collect(),
    )
}

/// One entry of a batch resume: `{"call_id": n, "result": v}` or
/// `{"call_id": n, "error": "msg"}`
#[derive(Debug, Deserialize)]
struct FutureResultJson {
    call_id: CallId,
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// A present field, even `null`, is `Some`
fn present<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/* ===================== Engine ===================== */

#[derive(Debug, Default)]
pub struct Engine {
    runs: Arena<Program>,
    snapshots: Arena<Snapshot>,
    futures: Arena<FutureSnapshot>,
    limits: ResourceLimits,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine whose runs start with `limits`
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Number of live handles: runs, snapshots, future snapshots
    pub fn live_handles(&self) -> (usize, usize, usize) {
        (self.runs.len(), self.snapshots.len(), self.futures.len())
    }

    /* ----- runs ----- */

    pub fn run_new(
        &mut self,
        code: &str,
        script_name: &str,
        input_names: &[&str],
        external_functions: &[&str],
    ) -> AdapterResult<RunHandle> {
        let program = Program::new(code, script_name, input_names, external_functions)?;
        Ok(RunHandle(self.runs.insert(program)))
    }

    /// Start a run; `inputs_json` is a JSON array with one value per input
    pub fn run_start(&mut self, run: RunHandle, inputs_json: &str) -> AdapterResult<ProgressResult> {
        let inputs = match json::parse(inputs_json)? {
            Val::List(items) => items,
            other => {
                return Err(AdapterError::InvalidRequest(format!(
                    "inputs must be a JSON array, got {}",
                    other.type_name()
                )))
            }
        };
        let program = self
            .runs
            .get(run.0)
            .ok_or(AdapterError::StaleHandle { kind: "run" })?;
        let progress = program.start_with_limits(inputs, self.limits)?;
        Ok(self.publish(progress))
    }

    pub fn run_dump(&self, run: RunHandle) -> AdapterResult<Vec<u8>> {
        let program = self
            .runs
            .get(run.0)
            .ok_or(AdapterError::StaleHandle { kind: "run" })?;
        Ok(program.dump()?)
    }

    pub fn run_load(&mut self, bytes: &[u8]) -> AdapterResult<RunHandle> {
        let program = Program::load(bytes)?;
        Ok(RunHandle(self.runs.insert(program)))
    }

    pub fn run_free(&mut self, run: RunHandle) -> bool {
        self.runs.remove(run.0).is_some()
    }

    /* ----- snapshots ----- */

    /// Answer the snapshot's call with a JSON result, an error message, or
    /// neither (defer the call)
    pub fn snapshot_resume(
        &mut self,
        snapshot: SnapshotHandle,
        call_id: CallId,
        result_json: Option<&str>,
        error: Option<&str>,
    ) -> AdapterResult<ProgressResult> {
        let result = match (result_json, error) {
            (Some(_), Some(_)) => {
                return Err(AdapterError::InvalidRequest(
                    "supply a result or an error, not both".to_string(),
                ))
            }
            (_, Some(message)) => ExternalResult::Error(message.to_string()),
            (Some(text), None) => ExternalResult::Return(json::parse(text)?),
            (None, None) => ExternalResult::Defer,
        };
        let progress = self
            .snapshots
            .get(snapshot.0)
            .ok_or(AdapterError::StaleHandle { kind: "snapshot" })?
            .resume(call_id, result)?;
        Ok(self.publish(progress))
    }

    pub fn snapshot_dump(&self, snapshot: SnapshotHandle) -> AdapterResult<Vec<u8>> {
        let snapshot = self
            .snapshots
            .get(snapshot.0)
            .ok_or(AdapterError::StaleHandle { kind: "snapshot" })?;
        Ok(snapshot.dump()?)
    }

    pub fn snapshot_load(&mut self, bytes: &[u8]) -> AdapterResult<SnapshotHandle> {
        let snapshot = Snapshot::load(bytes)?;
        Ok(SnapshotHandle(self.snapshots.insert(snapshot)))
    }

    pub fn snapshot_free(&mut self, snapshot: SnapshotHandle) -> bool {
        self.snapshots.remove(snapshot.0).is_some()
    }

    /* ----- future snapshots ----- */

    pub fn future_snapshot_resume(
        &mut self,
        future: FutureHandle,
        results_json: &str,
    ) -> AdapterResult<ProgressResult> {
        let results = decode_future_results(results_json)?;
        let progress = self
            .futures
            .get(future.0)
            .ok_or(AdapterError::StaleHandle {
                kind: "future snapshot",
            })?
            .resume(results)?;
        Ok(self.publish(progress))
    }

    /// The calls a future snapshot waits on, in issuance order
    pub fn future_snapshot_pending(
        &self,
        future: FutureHandle,
    ) -> AdapterResult<Vec<PendingCallRecord>> {
        let snapshot = self.futures.get(future.0).ok_or(AdapterError::StaleHandle {
            kind: "future snapshot",
        })?;
        Ok(pending_records(snapshot))
    }

    pub fn future_snapshot_dump(&self, future: FutureHandle) -> AdapterResult<Vec<u8>> {
        let snapshot = self.futures.get(future.0).ok_or(AdapterError::StaleHandle {
            kind: "future snapshot",
        })?;
        Ok(snapshot.dump()?)
    }

    pub fn future_snapshot_load(&mut self, bytes: &[u8]) -> AdapterResult<FutureHandle> {
        let snapshot = FutureSnapshot::load(bytes)?;
        Ok(FutureHandle(self.futures.insert(snapshot)))
    }

    pub fn future_snapshot_free(&mut self, future: FutureHandle) -> bool {
        self.futures.remove(future.0).is_some()
    }

    /* ----- progress ----- */

    /// Flatten progress, moving any new snapshot into its arena
    fn publish(&mut self, progress: Progress) -> ProgressResult {
        match progress {
            Progress::Completed(value) => ProgressResult {
                result_json: Some(json::render(&value)),
                ..ProgressResult::empty(ProgressKind::Complete)
            },
            Progress::Failed(fault) => ProgressResult {
                error_code: Some(fault.code),
                error_message: Some(fault.message),
                error_function: Some(fault.function),
                ..ProgressResult::empty(ProgressKind::Failed)
            },
            Progress::CallRequested { call, snapshot } => {
                let (kind, function_name, os_function) = match call.os_function {
                    Some(_) => (ProgressKind::OsCall, None, Some(call.function_name.clone())),
                    None => (ProgressKind::FunctionCall, Some(call.function_name.clone()), None),
                };
                ProgressResult {
                    function_name,
                    os_function,
                    method_call: Some(call.method_call),
                    args_json: Some(json::render(&Val::List(call.args.clone()))),
                    kwargs_json: Some(kwargs_json(&call.kwargs).to_string()),
                    call_id: Some(call.call_id),
                    snapshot: Some(SnapshotHandle(self.snapshots.insert(snapshot))),
                    ..ProgressResult::empty(kind)
                }
            }
            Progress::BatchRequested { call_ids, snapshot } => {
                let records = pending_records(&snapshot);
                ProgressResult {
                    pending_call_ids: Some(call_ids),
                    pending_calls_json: Some(Value::from(records_json(&records)).to_string()),
                    future_snapshot: Some(FutureHandle(self.futures.insert(snapshot))),
                    ..ProgressResult::empty(ProgressKind::ResolveFutures)
                }
            }
        }
    }
}

fn pending_records(snapshot: &FutureSnapshot) -> Vec<PendingCallRecord> {
    snapshot
        .pending_calls()
        .into_iter()
        .map(PendingCallRecord::from_call)
        .collect()
}

fn records_json(records: &[PendingCallRecord]) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| serde_json::to_value(record).ok())
        .collect()
}

fn decode_future_results(text: &str) -> AdapterResult<Vec<(CallId, ExternalResult)>> {
    let raw: Vec<FutureResultJson> = serde_json::from_str(text)?;
    raw.into_iter()
        .map(|entry| match (entry.result, entry.error) {
            (Some(_), Some(_)) => Err(AdapterError::InvalidRequest(format!(
                "call {} has both a result and an error",
                entry.call_id
            ))),
            (_, Some(message)) => Ok((entry.call_id, ExternalResult::Error(message))),
            (Some(value), None) => Ok((entry.call_id, ExternalResult::Return(json::json_to_val(&value)))),
            (None, None) => Err(AdapterError::InvalidRequest(format!(
                "call {} needs a result or an error",
                entry.call_id
            ))),
        })
        .collect()
}
