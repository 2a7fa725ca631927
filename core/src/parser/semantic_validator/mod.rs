//! Semantic Validation for Stasis scripts
//!
//! This module provides an extensible rule-based validation system that runs
//! after parsing to catch semantic errors that the grammar can't enforce.
//!
//! # Usage
//!
//! ```ignore
//! use stasis_core::parser::{parse_script, semantic_validator::{validate_script, ValidationContext}};
//!
//! let script = parse_script(source)?;
//! let ctx = ValidationContext::new(&script, source, &inputs, &externals);
//! let errors = validate_script(&script, &ctx);
//! ```
//!
//! # Architecture
//!
//! 1. **ValidationRule trait** - Each rule implements this trait
//! 2. **Validator** - Collects and runs all rules
//! 3. **ValidationError** - The output of validation (errors, warnings, hints)
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `semantic_validator/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod rules;

use std::collections::BTreeSet;

use crate::executor::types::ast::{ScriptDef, Span};
use crate::parser::resolve::CallNames;

// ============================================================================
// Validation Error Types
// ============================================================================

/// A validation error produced by semantic analysis.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The source location of the issue
    pub span: Span,
    /// Human-readable message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Which rule produced this error
    pub rule_id: &'static str,
}

/// Severity levels for validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Must be fixed - code is incorrect
    Error,
    /// Should probably be fixed - potential bug
    Warning,
}

impl ValidationError {
    /// Create a new error
    pub fn error(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Error,
            rule_id,
        }
    }

    /// Create a new warning
    pub fn warning(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            message: message.into(),
            severity: Severity::Warning,
            rule_id,
        }
    }

    /// Check if this is an error (not a warning)
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{} at line {}, col {}: {} [{}]",
            severity,
            self.span.start_line + 1,
            self.span.start_col + 1,
            self.message,
            self.rule_id
        )
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// Validation Context
// ============================================================================

/// Everything a rule may consult besides the AST itself
pub struct ValidationContext<'a> {
    /// The original source code
    pub source: &'a str,
    /// Declared input names, pre-bound in the main body
    pub inputs: &'a [String],
    /// Call-site name resolution (functions, externals, builtins)
    pub names: CallNames<'a>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(
        script: &'a ScriptDef,
        source: &'a str,
        inputs: &'a [String],
        externals: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            source,
            inputs,
            names: CallNames::new(script, externals),
        }
    }
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all validation rules must implement.
///
/// Each rule is responsible for checking one specific aspect of the code.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "undefined-variable")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the validation and return any errors found.
    fn validate(&self, script: &ScriptDef, ctx: &ValidationContext) -> Vec<ValidationError>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

/// The main validator that orchestrates all validation rules.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                // Error rules - these indicate bugs
                Box::new(rules::DuplicateDeclarationRule),
                Box::new(rules::UndefinedVariableRule),
                Box::new(rules::ConstAssignmentRule),
                Box::new(rules::CallTargetRule),
                Box::new(rules::LoopControlRule),
                // Warning rules - these are suggestions
                Box::new(rules::UnreachableCodeRule),
                Box::new(rules::UnusedVariableRule),
            ],
        }
    }

    /// Run all validation rules and collect errors.
    pub fn validate(&self, script: &ScriptDef, ctx: &ValidationContext) -> Vec<ValidationError> {
        self.rules
            .iter()
            .flat_map(|rule| rule.validate(script, ctx))
            .collect()
    }

    /// Get a list of all registered rules (useful for documentation)
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Validate a script and return all errors and warnings found.
pub fn validate_script(script: &ScriptDef, ctx: &ValidationContext) -> Vec<ValidationError> {
    Validator::new().validate(script, ctx)
}

/// Check if a script has any validation errors (not just warnings).
pub fn has_errors(script: &ScriptDef, ctx: &ValidationContext) -> bool {
    validate_script(script, ctx).iter().any(|e| e.is_error())
}
