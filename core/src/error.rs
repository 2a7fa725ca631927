//! Boundary-level errors
//!
//! Script faults are not errors here: a run that raises an uncaught error ends
//! with `Progress::Failed`. These types cover failures of the request itself.

use thiserror::Error;

use crate::executor::types::CallId;
use crate::executor::ScriptFault;
use crate::parser::semantic_validator::ValidationError;

/// The script could not be turned into a program
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{script_name}:{line}:{column}: syntax error: {message}")]
    Syntax {
        script_name: String,
        message: String,
        /// 1-indexed
        line: usize,
        /// 1-indexed
        column: usize,
    },

    #[error("{script_name}: {}", format_validation(.errors))]
    Invalid {
        script_name: String,
        errors: Vec<ValidationError>,
    },
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("expected {expected} input value(s), got {received}")]
    CountMismatch { expected: usize, received: usize },

    #[error("input {index} exceeds the run's limits: {message}")]
    LimitExceeded { index: usize, message: String },
}

/// A resume did not match the suspension it targeted
///
/// Raised before any state is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("snapshot is waiting on call {expected}, not call {received}")]
    CallIdMismatch { expected: CallId, received: CallId },

    #[error("call {0} is not pending in this snapshot")]
    UnknownCallId(CallId),

    #[error("batch is missing results for call(s) {0:?}")]
    MissingCallIds(Vec<CallId>),

    #[error("call {0} appears more than once in the batch")]
    DuplicateCallId(CallId),

    #[error("call {0} cannot be deferred again in a batch resume")]
    DeferInBatch(CallId),
}

/// A stored byte buffer could not be restored
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer truncated: need at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("not a stasis artifact (bad magic)")]
    BadMagic,

    #[error("unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("expected a {expected} artifact, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("payload checksum mismatch")]
    ChecksumMismatch,

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Any boundary-level failure
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to encode state: {0}")]
    Encode(#[from] postcard::Error),

    /// `run_to_completion` reached an external call
    #[error("script suspended on external call '{function_name}'")]
    Suspended { function_name: String },

    #[error("script failed: {0}")]
    Fault(ScriptFault),
}
