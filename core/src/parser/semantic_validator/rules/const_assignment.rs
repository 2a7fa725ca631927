//! Rule: Const Assignment
//!
//! Reports an error when a `const` binding is reassigned, including through
//! a member path (`const o = {}; o.a = 1` mutates the binding's value).

use crate::executor::types::ast::{ScriptDef, Stmt, VarKind};

use super::super::{ValidationContext, ValidationError, ValidationRule};
use super::scope::{bodies, Scope};

pub struct ConstAssignmentRule;

impl ValidationRule for ConstAssignmentRule {
    fn id(&self) -> &'static str {
        "const-assignment"
    }

    fn description(&self) -> &'static str {
        "Variables declared with const cannot be reassigned"
    }

    fn validate(&self, script: &ScriptDef, ctx: &ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (params, body) in bodies(script, ctx) {
            let mut scope = Scope::with_params(params);
            check_stmt(body, &mut scope, &mut errors, self.id());
        }

        errors
    }
}

fn check_stmt(
    stmt: &Stmt,
    scope: &mut Scope,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    match stmt {
        Stmt::Declare { var_kind, name, .. } => scope.define(name, *var_kind),

        Stmt::Assign { var, span, .. } => {
            if scope.lookup(var) == Some(VarKind::Const) {
                errors.push(ValidationError::error(
                    *span,
                    format!("Cannot assign to const variable '{}'", var),
                    rule_id,
                ));
            }
        }

        Stmt::Block { body, .. } => {
            scope.push();
            for stmt in body {
                check_stmt(stmt, scope, errors, rule_id);
            }
            scope.pop();
        }

        Stmt::If { then_s, else_s, .. } => {
            check_nested(then_s, scope, errors, rule_id);
            if let Some(else_stmt) = else_s {
                check_nested(else_stmt, scope, errors, rule_id);
            }
        }

        Stmt::While { body, .. } => check_nested(body, scope, errors, rule_id),

        Stmt::ForLoop { binding, body, .. } => {
            scope.push();
            scope.define(binding, VarKind::Let);
            check_stmt(body, scope, errors, rule_id);
            scope.pop();
        }

        Stmt::Try {
            body,
            catch_var,
            catch_body,
            ..
        } => {
            check_nested(body, scope, errors, rule_id);
            scope.push();
            scope.define(catch_var, VarKind::Let);
            check_stmt(catch_body, scope, errors, rule_id);
            scope.pop();
        }

        Stmt::Return { .. }
        | Stmt::Throw { .. }
        | Stmt::Expr { .. }
        | Stmt::Break { .. }
        | Stmt::Continue { .. } => {}
    }
}

fn check_nested(
    stmt: &Stmt,
    scope: &mut Scope,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    scope.push();
    check_stmt(stmt, scope, errors, rule_id);
    scope.pop();
}
