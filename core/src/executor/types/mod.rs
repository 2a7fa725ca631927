//! Type definitions for the executor
//!
//! This module contains all the core types used by the executor:
//! - AST nodes (Stmt, Expr)
//! - Runtime values (Val)
//! - Control flow (Control, Frame, TryHandler)

pub mod ast;
pub mod control;
pub mod values;

// Re-export all types for convenient access
pub use ast::{Expr, Stmt};
pub use control::{Control, Frame, Suspension, TryHandler};
pub use values::{CallId, Val};
