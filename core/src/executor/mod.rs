//! # Executor - Resumable Stack-Driven Interpreter
//!
//! ## Core Principles
//!
//! 1. **Stack-driven execution**: All state in `frames: Vec<Frame>`, no recursion
//! 2. **Instruction-level stepping**: Each frame has an instruction pointer into
//!    its function's flat instruction list
//! 3. **Centralized control flow**: `Control` tracks return/throw/suspend/fault
//! 4. **Pure executor**: No I/O - runs until it completes or suspends on an
//!    external call

pub mod calls;
pub mod coordinator;
pub mod errors;
pub mod exec_loop;
pub mod limits;
pub mod operators;
pub mod os;
pub mod stdlib;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use coordinator::{CallCoordinator, CallOutcome, ExternalResult, PendingCall};
pub use errors::{ErrorInfo, ScriptFault};
pub use exec_loop::{run_until_done, step};
pub use limits::ResourceLimits;
pub use os::OsFunction;
pub use types::{CallId, Control, Suspension, Val};
pub use vm::{Step, VM};
