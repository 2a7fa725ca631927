//! Script-level error values and the fault reported when one escapes

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::Val;

/* ===================== Error Codes ===================== */

pub const TYPE_ERROR: &str = "TypeError";
pub const PROPERTY_NOT_FOUND: &str = "PropertyNotFound";
pub const INDEX_OUT_OF_RANGE: &str = "IndexOutOfRange";
pub const WRONG_ARG_COUNT: &str = "WrongArgCount";
pub const WRONG_ARG_TYPE: &str = "WrongArgType";
pub const VALUE_ERROR: &str = "ValueError";
pub const DIVISION_BY_ZERO: &str = "DivisionByZero";
pub const OVERFLOW: &str = "Overflow";
pub const UNKNOWN_FUTURE: &str = "UnknownFuture";
/// The host reported a failure for an external call
pub const HOST_CALL_FAILURE: &str = "HostCallFailure";
/// A configured resource limit was exceeded; cannot be caught
pub const RESOURCE_LIMIT: &str = "ResourceLimit";
/// A non-error value was thrown and never caught
pub const UNCAUGHT: &str = "Uncaught";
pub const INTERNAL: &str = "InternalError";

/* ===================== ErrorInfo ===================== */

/// Error value carried by `Val::Error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(TYPE_ERROR, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL, message)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/* ===================== ScriptFault ===================== */

/// An error that escaped the outermost frame, ending the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFault {
    pub code: String,
    pub message: String,
    /// Innermost script function the error escaped from
    pub function: String,
}

impl ScriptFault {
    /// Build the fault for an uncaught thrown value
    pub fn from_thrown(value: &Val, function: String) -> Self {
        match value {
            Val::Error(err) => Self {
                code: err.code.clone(),
                message: err.message.clone(),
                function,
            },
            other => Self {
                code: UNCAUGHT.to_string(),
                message: other.to_string(),
                function,
            },
        }
    }

    pub fn resource_limit(message: impl Into<String>, function: String) -> Self {
        Self {
            code: RESOURCE_LIMIT.to_string(),
            message: message.into(),
            function,
        }
    }
}

impl fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (in {})", self.code, self.message, self.function)
    }
}

impl std::error::Error for ScriptFault {}
