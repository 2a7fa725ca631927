//! Validation Rules
//!
//! Each file in this module contains one validation rule.
//! Rules are organized by what they check:
//!
//! - `duplicate_declaration.rs` - Names declared twice, or colliding with externals
//! - `undefined_variable.rs` - Variables used before declaration
//! - `const_assignment.rs` - Assignment to `const` bindings
//! - `call_target.rs` - Calls to unknown functions and misuse of `async`/keyword args
//! - `loop_control.rs` - `break`/`continue` outside of loops
//! - `unreachable_code.rs` - Code that can never execute
//! - `unused_variable.rs` - Variables declared but never used

mod call_target;
mod const_assignment;
mod duplicate_declaration;
mod loop_control;
mod scope;
mod undefined_variable;
mod unreachable_code;
mod unused_variable;

pub use call_target::CallTargetRule;
pub use const_assignment::ConstAssignmentRule;
pub use duplicate_declaration::DuplicateDeclarationRule;
pub use loop_control::LoopControlRule;
pub use undefined_variable::UndefinedVariableRule;
pub use unreachable_code::UnreachableCodeRule;
pub use unused_variable::UnusedVariableRule;
