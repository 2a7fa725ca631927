pub mod adapter;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod format;
pub mod json;
pub mod parser;
pub mod program;
pub mod progress;
pub mod snapshot;


// Re-export the host-facing types
pub use error::{CompileError, DecodeError, EngineError, InputError, ProtocolError};
pub use executor::{CallId, ErrorInfo, ExternalResult, PendingCall, ResourceLimits, ScriptFault, Val};
pub use program::{Checked, Program};
pub use progress::Progress;
pub use snapshot::{FutureSnapshot, Snapshot};
