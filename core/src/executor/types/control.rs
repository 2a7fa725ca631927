//! Control flow and execution frame types

use super::super::errors::ScriptFault;
use super::values::{CallId, Val};
use serde::{Deserialize, Serialize};

/* ===================== Control Flow ===================== */

/// Control flow state
///
/// `Throw` is transient: the VM unwinds to the nearest `try` handler. The other
/// non-`None` states stop the run; `Suspend` leaves the VM serializable and
/// resumable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Control {
    None,
    Return(Val),
    Throw {
        value: Val,
        /// Function in which the value was raised
        function: String,
    },
    Suspend(Suspension),
    /// Uncaught error or exceeded resource limit; terminal
    Fault(ScriptFault),
}

/// Why a run stopped at an external-call boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suspension {
    /// A synchronous external call awaits its single result
    Call(CallId),
    /// An `await` needs every outstanding deferred call answered
    Batch,
}

/* ===================== Frames ===================== */

/// Execution frame - one per active function call
///
/// The frame stack replaces the native call stack, making execution serializable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Index of the function in the compiled program
    pub func: u32,
    /// Next instruction to execute
    pub ip: usize,
    /// Operand stack
    pub stack: Vec<Val>,
    /// Local slots: parameters first, then block-scoped bindings
    pub locals: Vec<Val>,
    /// Active `try` handlers, innermost last
    pub handlers: Vec<TryHandler>,
}

/// An installed `catch` target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryHandler {
    pub catch_ip: u32,
    /// Operand stack height to restore before entering the catch block
    pub stack_len: u32,
}
