//! Rule: Loop Control
//!
//! Reports an error when `break` or `continue` appears outside of a loop.
//! Function bodies start outside any loop.

use crate::executor::types::ast::{ScriptDef, Stmt};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct LoopControlRule;

impl ValidationRule for LoopControlRule {
    fn id(&self) -> &'static str {
        "loop-control"
    }

    fn description(&self) -> &'static str {
        "break and continue must appear inside a loop"
    }

    fn validate(&self, script: &ScriptDef, _ctx: &ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_stmt(&script.body, 0, &mut errors, self.id());
        for function in &script.functions {
            check_stmt(&function.body, 0, &mut errors, self.id());
        }
        errors
    }
}

fn check_stmt(stmt: &Stmt, depth: usize, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        Stmt::Break { span } if depth == 0 => {
            errors.push(ValidationError::error(*span, "'break' outside of a loop", rule_id));
        }
        Stmt::Continue { span } if depth == 0 => {
            errors.push(ValidationError::error(*span, "'continue' outside of a loop", rule_id));
        }
        Stmt::Block { body, .. } => {
            for stmt in body {
                check_stmt(stmt, depth, errors, rule_id);
            }
        }
        Stmt::If { then_s, else_s, .. } => {
            check_stmt(then_s, depth, errors, rule_id);
            if let Some(else_stmt) = else_s {
                check_stmt(else_stmt, depth, errors, rule_id);
            }
        }
        Stmt::While { body, .. } | Stmt::ForLoop { body, .. } => {
            check_stmt(body, depth + 1, errors, rule_id);
        }
        Stmt::Try {
            body, catch_body, ..
        } => {
            check_stmt(body, depth, errors, rule_id);
            check_stmt(catch_body, depth, errors, rule_id);
        }
        _ => {}
    }
}
