//! Rule: Duplicate Declaration
//!
//! Reports an error when a name is declared twice where it must be unique:
//! input names, function names, parameter names, and `let`/`const` bindings
//! within one block. A script function may not share its name with a
//! declared external function.

use std::collections::BTreeSet;

use crate::executor::types::ast::{ScriptDef, Stmt};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct DuplicateDeclarationRule;

impl ValidationRule for DuplicateDeclarationRule {
    fn id(&self) -> &'static str {
        "duplicate-declaration"
    }

    fn description(&self) -> &'static str {
        "Names must be declared at most once per scope"
    }

    fn validate(&self, script: &ScriptDef, ctx: &ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let mut inputs = BTreeSet::new();
        for input in ctx.inputs {
            if !inputs.insert(input.as_str()) {
                errors.push(ValidationError::error(
                    script.span,
                    format!("Input '{}' is declared more than once", input),
                    self.id(),
                ));
            }
        }

        let mut functions = BTreeSet::new();
        for function in &script.functions {
            if !functions.insert(function.name.as_str()) {
                errors.push(ValidationError::error(
                    function.span,
                    format!("Function '{}' is declared more than once", function.name),
                    self.id(),
                ));
            }
            if ctx.names.is_external(&function.name) {
                errors.push(ValidationError::error(
                    function.span,
                    format!(
                        "Function '{}' collides with a declared external function",
                        function.name
                    ),
                    self.id(),
                ));
            }

            let mut params = BTreeSet::new();
            for param in &function.params {
                if !params.insert(param.as_str()) {
                    errors.push(ValidationError::error(
                        function.span,
                        format!(
                            "Duplicate parameter '{}' in function '{}'",
                            param, function.name
                        ),
                        self.id(),
                    ));
                }
            }

            check_stmt(&function.body, &mut BTreeSet::new(), &mut errors, self.id());
        }

        check_stmt(&script.body, &mut BTreeSet::new(), &mut errors, self.id());

        errors
    }
}

/// `declared` holds the names bound directly in the enclosing block
fn check_stmt(
    stmt: &Stmt,
    declared: &mut BTreeSet<String>,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    match stmt {
        Stmt::Declare { name, span, .. } => {
            if !declared.insert(name.clone()) {
                errors.push(ValidationError::error(
                    *span,
                    format!("Variable '{}' is already declared in this scope", name),
                    rule_id,
                ));
            }
        }
        Stmt::Block { body, .. } => {
            let mut inner = BTreeSet::new();
            for stmt in body {
                check_stmt(stmt, &mut inner, errors, rule_id);
            }
        }
        Stmt::If { then_s, else_s, .. } => {
            check_stmt(then_s, &mut BTreeSet::new(), errors, rule_id);
            if let Some(else_stmt) = else_s {
                check_stmt(else_stmt, &mut BTreeSet::new(), errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForLoop { body, .. } => {
            check_stmt(body, &mut BTreeSet::new(), errors, rule_id);
        }
        Stmt::Try {
            body, catch_body, ..
        } => {
            check_stmt(body, &mut BTreeSet::new(), errors, rule_id);
            check_stmt(catch_body, &mut BTreeSet::new(), errors, rule_id);
        }
        Stmt::Assign { .. }
        | Stmt::Return { .. }
        | Stmt::Throw { .. }
        | Stmt::Expr { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. } => {}
    }
}
