//! Runtime value types

use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;

use super::super::errors::ErrorInfo;
use serde::{Deserialize, Serialize};

/// Identifier of an external call, unique within one run
pub type CallId = u32;

/// Runtime value type
///
/// Objects use `BTreeMap` so that key order, and therefore every serialized
/// state, is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Val {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Val>),
    Obj(BTreeMap<String, Val>),
    /// Error value with code and message
    Error(ErrorInfo),
    /// Handle to a deferred external call
    Future(CallId),
    /// Result of `Promise.all`; awaiting it yields a list
    Gather(Vec<Val>),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Int(n) => *n != 0,
            Val::Float(f) => *f != 0.0 && !f.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "bool",
            Val::Int(_) => "int",
            Val::Float(_) => "float",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::Error(_) => "error",
            Val::Future(_) => "future",
            Val::Gather(_) => "gather",
        }
    }
}

/* ===================== Traversal ===================== */

impl Val {
    /// Visit this value and everything nested in it, outermost first
    ///
    /// `f` receives each value with its nesting depth (the root is 1). The
    /// walk keeps its own stack, so arbitrarily deep values cannot overflow
    /// the thread stack, and it stops descending as soon as `f` breaks.
    pub fn try_visit<B>(&self, mut f: impl FnMut(&Val, usize) -> ControlFlow<B>) -> ControlFlow<B> {
        let mut pending: Vec<(&Val, usize)> = vec![(self, 1)];
        while let Some((val, depth)) = pending.pop() {
            if let ControlFlow::Break(found) = f(val, depth) {
                return ControlFlow::Break(found);
            }
            match val {
                Val::List(items) | Val::Gather(items) => {
                    pending.extend(items.iter().rev().map(|item| (item, depth + 1)))
                }
                Val::Obj(map) => pending.extend(map.values().rev().map(|v| (v, depth + 1))),
                _ => {}
            }
        }
        ControlFlow::Continue(())
    }

    /// Approximate bytes this value occupies, excluding nested values
    pub fn shallow_size(&self) -> usize {
        let own = match self {
            Val::Str(s) => s.len(),
            Val::Obj(map) => map.keys().map(String::len).sum(),
            Val::Error(err) => err.code.len() + err.message.len(),
            _ => 0,
        };
        std::mem::size_of::<Val>() + own
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Int(n)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Int(n) => write!(f, "{}", n),
            Val::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Val::Str(s) => write!(f, "{}", s),
            Val::List(items) | Val::Gather(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_nested(f, item)?;
                }
                write!(f, "]")
            }
            Val::Obj(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    write_nested(f, value)?;
                }
                write!(f, "}}")
            }
            Val::Error(err) => write!(f, "{}: {}", err.code, err.message),
            Val::Future(id) => write!(f, "<future {}>", id),
        }
    }
}

/// Strings nested in containers are shown quoted
fn write_nested(f: &mut fmt::Formatter<'_>, val: &Val) -> fmt::Result {
    match val {
        Val::Str(s) => write!(f, "{:?}", s),
        other => write!(f, "{}", other),
    }
}
