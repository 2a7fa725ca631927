//! Rule: Unreachable Code
//!
//! Warns about statements that follow a `return`, `throw`, `break` or
//! `continue` in the same block.

use crate::executor::types::ast::{ScriptDef, Stmt};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct UnreachableCodeRule;

impl ValidationRule for UnreachableCodeRule {
    fn id(&self) -> &'static str {
        "unreachable-code"
    }

    fn description(&self) -> &'static str {
        "Code after return, throw, break or continue never runs"
    }

    fn validate(&self, script: &ScriptDef, _ctx: &ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_stmt(&script.body, &mut errors, self.id());
        for function in &script.functions {
            check_stmt(&function.body, &mut errors, self.id());
        }
        errors
    }
}

fn is_terminator(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Return { .. } | Stmt::Throw { .. } | Stmt::Break { .. } | Stmt::Continue { .. }
    )
}

fn check_stmt(stmt: &Stmt, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        Stmt::Block { body, .. } => {
            if let Some(pos) = body.iter().position(is_terminator) {
                if let Some(next) = body.get(pos + 1) {
                    errors.push(ValidationError::warning(next.span(), "Unreachable code", rule_id));
                }
            }
            for stmt in body {
                check_stmt(stmt, errors, rule_id);
            }
        }
        Stmt::If { then_s, else_s, .. } => {
            check_stmt(then_s, errors, rule_id);
            if let Some(else_stmt) = else_s {
                check_stmt(else_stmt, errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForLoop { body, .. } => check_stmt(body, errors, rule_id),
        Stmt::Try {
            body, catch_body, ..
        } => {
            check_stmt(body, errors, rule_id);
            check_stmt(catch_body, errors, rule_id);
        }
        _ => {}
    }
}
