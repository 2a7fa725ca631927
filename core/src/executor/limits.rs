//! Resource limits enforced while stepping

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use super::types::Val;

/// Bounds on a single run
///
/// Limits travel with the run: they are captured in every snapshot, so a
/// resumed run is held to the limits it started with. Every field is a plain
/// number; `unlimited()` lifts every bound except value depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Instructions executed over the whole run, across suspensions
    pub max_steps: u64,
    /// Nested script function calls
    pub max_call_depth: usize,
    /// Outstanding external calls (deferred plus in flight)
    pub max_pending_calls: usize,
    /// Nesting of lists and objects inside a single value
    pub max_value_depth: usize,
    /// Approximate bytes a single value may occupy, nested values included
    pub max_value_bytes: usize,
}

impl ResourceLimits {
    pub const DEFAULT_MAX_STEPS: u64 = 10_000_000;
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;
    pub const DEFAULT_MAX_PENDING_CALLS: usize = 1024;
    /// Below serde_json's recursion limit, so any value can be handed to a host
    pub const DEFAULT_MAX_VALUE_DEPTH: usize = 100;
    /// serde_json refuses to parse deeper JSON
    pub const MAX_VALUE_DEPTH_CEILING: usize = 128;
    pub const DEFAULT_MAX_VALUE_BYTES: usize = 64 * 1024 * 1024;

    /// No practical limit; for trusted scripts and tests
    ///
    /// Value depth keeps its default: deeper values would overflow the thread
    /// stack when cloned or dropped.
    pub fn unlimited() -> Self {
        Self {
            max_steps: u64::MAX,
            max_call_depth: usize::MAX,
            max_pending_calls: usize::MAX,
            max_value_depth: Self::DEFAULT_MAX_VALUE_DEPTH,
            max_value_bytes: usize::MAX,
        }
    }

    /// Check a value against the depth and size limits
    ///
    /// Returns the fault message for the first limit crossed. The walk stops
    /// there, so checking an oversized value costs no more than the limit.
    pub fn check_value(&self, value: &Val) -> Result<(), String> {
        let mut bytes = 0usize;
        let outcome = value.try_visit(|val, depth| {
            if depth > self.max_value_depth {
                return ControlFlow::Break(format!(
                    "Value nesting limit of {} exceeded",
                    self.max_value_depth
                ));
            }
            bytes = bytes.saturating_add(val.shallow_size());
            if bytes > self.max_value_bytes {
                return ControlFlow::Break(format!(
                    "Value size limit of {} bytes exceeded",
                    self.max_value_bytes
                ));
            }
            ControlFlow::Continue(())
        });
        match outcome {
            ControlFlow::Break(message) => Err(message),
            ControlFlow::Continue(()) => Ok(()),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_steps: Self::DEFAULT_MAX_STEPS,
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            max_pending_calls: Self::DEFAULT_MAX_PENDING_CALLS,
            max_value_depth: Self::DEFAULT_MAX_VALUE_DEPTH,
            max_value_bytes: Self::DEFAULT_MAX_VALUE_BYTES,
        }
    }
}
