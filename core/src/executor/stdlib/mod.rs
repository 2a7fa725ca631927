//! Standard library function implementations
//!
//! Builtins run inside the engine and never suspend. They are resolved at
//! compile time, so the instruction stream stores a `Builtin` directly.

pub mod basic;
pub mod math;

use super::errors::{self, ErrorInfo};
use super::types::Val;
use serde::{Deserialize, Serialize};

/* ===================== Builtin Identifiers ===================== */

/// Standard library function identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Builtin {
    Len,
    Str,
    Int,
    Float,
    Keys,
    Range,
    Append,
    MathFloor,
    MathCeil,
    MathAbs,
    MathRound,
    MathMin,
    MathMax,
    PromiseAll,
}

const NAMES: &[(&str, Builtin)] = &[
    ("len", Builtin::Len),
    ("str", Builtin::Str),
    ("int", Builtin::Int),
    ("float", Builtin::Float),
    ("keys", Builtin::Keys),
    ("range", Builtin::Range),
    ("append", Builtin::Append),
    ("Math.floor", Builtin::MathFloor),
    ("Math.ceil", Builtin::MathCeil),
    ("Math.abs", Builtin::MathAbs),
    ("Math.round", Builtin::MathRound),
    ("Math.min", Builtin::MathMin),
    ("Math.max", Builtin::MathMax),
    ("Promise.all", Builtin::PromiseAll),
];

impl Builtin {
    /// Look up a builtin by its script-visible name (`len`, `Math.floor`, ...)
    pub fn from_name(name: &str) -> Option<Builtin> {
        NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, builtin)| *builtin)
    }

    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, builtin)| *builtin == self)
            .map(|(name, _)| *name)
            .unwrap_or("<builtin>")
    }

    /// Namespaces whose members are builtins rather than values
    pub fn is_namespace(name: &str) -> bool {
        matches!(name, "Math" | "Promise")
    }
}

/* ===================== Stdlib Dispatcher ===================== */

/// Call a standard library function with arguments
pub fn call_builtin(builtin: Builtin, args: &[Val]) -> Result<Val, ErrorInfo> {
    match builtin {
        Builtin::Len => basic::len(args),
        Builtin::Str => basic::str(args),
        Builtin::Int => basic::int(args),
        Builtin::Float => basic::float(args),
        Builtin::Keys => basic::keys(args),
        Builtin::Range => basic::range(args),
        Builtin::Append => basic::append(args),
        Builtin::MathFloor => math::floor(args),
        Builtin::MathCeil => math::ceil(args),
        Builtin::MathAbs => math::abs(args),
        Builtin::MathRound => math::round(args),
        Builtin::MathMin => math::min(args),
        Builtin::MathMax => math::max(args),
        Builtin::PromiseAll => basic::promise_all(args),
    }
}

/* ===================== Argument Helpers ===================== */

pub(crate) fn expect_args(name: &str, args: &[Val], expected: usize) -> Result<(), ErrorInfo> {
    if args.len() != expected {
        return Err(ErrorInfo::new(
            errors::WRONG_ARG_COUNT,
            format!(
                "{}() expected {} argument(s), got {}",
                name,
                expected,
                args.len()
            ),
        ));
    }
    Ok(())
}

pub(crate) fn wrong_type(name: &str, expected: &str, got: &Val) -> ErrorInfo {
    ErrorInfo::new(
        errors::WRONG_ARG_TYPE,
        format!("{}() expected {}, got {}", name, expected, got.type_name()),
    )
}
