//! Instruction set
//!
//! Each function body is a flat `Vec<Instr>`; control transfers are absolute
//! instruction indices within the same function. Everything here is
//! serializable so a suspended frame can point into it.

use serde::{Deserialize, Serialize};

use crate::executor::os::OsFunction;
use crate::executor::stdlib::Builtin;
use crate::executor::types::ast::{BinaryOp, ForLoopKind, UnaryOp};
use crate::executor::types::Val;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    /* ----- stack & locals ----- */
    Const(Val),
    LoadLocal(u32),
    /// Pop into a local slot
    StoreLocal(u32),
    /// Pop the value, then `depth` path segments, and assign inside the local
    StorePath { slot: u32, depth: u32 },
    Pop,

    /* ----- operators ----- */
    Binary(BinaryOp),
    Unary(UnaryOp),
    MakeList(u32),
    /// Pop one value per key, in key order
    MakeObject(Vec<String>),
    GetMember(String),
    GetIndex,

    /* ----- jumps ----- */
    Jump(u32),
    /// Pop; jump when falsy
    JumpIfFalse(u32),
    /// `&&`: jump keeping the top when falsy, else pop it
    JumpIfFalseOrPop(u32),
    /// `||`: jump keeping the top when truthy, else pop it
    JumpIfTrueOrPop(u32),
    /// `??`: jump keeping the top when not null, else pop it
    JumpIfNotNullOrPop(u32),

    /* ----- calls ----- */
    CallFunction { func: u32, argc: u32 },
    CallBuiltin { builtin: Builtin, argc: u32 },
    /// Stack holds `argc` positionals (receiver first for method calls), then
    /// one value per keyword name
    CallExternal {
        name: String,
        argc: u32,
        kwnames: Vec<String>,
        method_call: bool,
        /// `async f()`: record the call and push a future instead of suspending
        deferred: bool,
    },
    /// `os.<function>(...)`: record the call and suspend, like a synchronous
    /// external call
    CallOs {
        function: OsFunction,
        argc: u32,
        kwnames: Vec<String>,
    },
    Await,
    Return,

    /* ----- exceptions ----- */
    Throw,
    SetupTry { catch_ip: u32 },
    PopTry,

    /* ----- iteration ----- */
    /// Pop a value and push the list a `for` loop walks
    IterList(ForLoopKind),
    /// Bind the next item of `locals[list_slot]` or jump to `exit` when done
    ForNext {
        list_slot: u32,
        idx_slot: u32,
        var_slot: u32,
        exit: u32,
    },
}
