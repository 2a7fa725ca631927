//! Virtual Machine state
//!
//! The VM holds all execution state:
//! - frames: Stack of active function calls
//! - control: Current control flow state (return, throw, suspend, ...)
//! - coordinator: External calls issued by this run
//!
//! Everything is plain data, so a suspended VM is the continuation itself.

use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::coordinator::CallCoordinator;
use super::limits::ResourceLimits;
use super::types::{CallId, Control, Frame, Val};
use crate::compiler::{CompiledProgram, MAIN_FUNCTION};

/* ===================== VM ===================== */

/// Virtual Machine state
///
/// This contains everything needed to execute (and serialize/resume) a run.
/// The compiled program is shared by every run and snapshot derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VM {
    pub program: Arc<CompiledProgram>,

    /// Stack of execution frames
    pub frames: Vec<Frame>,

    /// Current control flow state
    pub control: Control,

    /// External call bookkeeping
    pub coordinator: CallCoordinator,

    /// Value an `await` is blocked on while suspended for a batch
    pub awaiting: Option<Val>,

    /// Instructions executed so far, across suspensions
    pub steps: u64,

    pub limits: ResourceLimits,
}

impl VM {
    /// Create a VM positioned at the first instruction of main
    ///
    /// `inputs` bind to main's first slots in declaration order; callers check
    /// the count.
    pub fn new(program: Arc<CompiledProgram>, inputs: Vec<Val>, limits: ResourceLimits) -> Self {
        let num_locals = program.main().map(|f| f.num_locals as usize).unwrap_or(0);
        let mut locals = inputs;
        if locals.len() < num_locals {
            locals.resize(num_locals, Val::Null);
        }

        VM {
            program,
            frames: vec![Frame {
                func: 0,
                ip: 0,
                stack: Vec::new(),
                locals,
                handlers: Vec::new(),
            }],
            control: Control::None,
            coordinator: CallCoordinator::new(),
            awaiting: None,
            steps: 0,
            limits,
        }
    }

    /// Name of the innermost active script function
    pub fn current_function(&self) -> String {
        self.frames
            .last()
            .map(|frame| self.program.function_name(frame.func))
            .unwrap_or(MAIN_FUNCTION)
            .to_string()
    }
}

impl VM {
    /// Futures still reachable from the run's values
    ///
    /// Covers every frame, the blocked `await`, and the arguments of calls
    /// the host has not answered yet.
    pub fn live_futures(&self) -> BTreeSet<CallId> {
        let mut live = BTreeSet::new();
        let mut mark = |val: &Val, _depth: usize| {
            if let Val::Future(id) = val {
                live.insert(*id);
            }
            ControlFlow::<()>::Continue(())
        };

        let frame_values = self
            .frames
            .iter()
            .flat_map(|frame| frame.locals.iter().chain(frame.stack.iter()));
        let call_values = self
            .coordinator
            .in_flight
            .iter()
            .chain(self.coordinator.deferred_calls())
            .flat_map(|call| call.args.iter().chain(call.kwargs.iter().map(|(_, v)| v)));
        for value in frame_values.chain(self.awaiting.iter()).chain(call_values) {
            let _ = value.try_visit(&mut mark);
        }
        live
    }

    /// Drop answered outcomes no live value refers to
    pub fn prune_resolved(&mut self) {
        let live = self.live_futures();
        self.coordinator.retain_resolved(&live);
    }
}

/// Structural equality; a shared program compares by pointer first
impl PartialEq for VM {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.program, &other.program) || self.program == other.program)
            && self.frames == other.frames
            && self.control == other.control
            && self.coordinator == other.coordinator
            && self.awaiting == other.awaiting
            && self.steps == other.steps
            && self.limits == other.limits
    }
}

/* ===================== Step Result ===================== */

/// Result of executing one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue to next step
    Continue,
    /// Execution stopped; inspect `vm.control`
    Done,
}
