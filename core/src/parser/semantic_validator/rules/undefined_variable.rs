//! Rule: Undefined Variable
//!
//! Reports an error when a variable is used before it's declared.
//! Functions only see their own parameters and locals.
//!
//! # Examples
//!
//! ```text
//! // Error: 'x' is used before declaration
//! let y = x + 1;
//! let x = 5;
//! ```

use crate::executor::types::ast::{Expr, MemberAccess, ScriptDef, Stmt, VarKind};
use crate::parser::resolve::is_namespace_call;

use super::super::{ValidationContext, ValidationError, ValidationRule};
use super::scope::{bodies, Scope};

/// Rule that checks for undefined variable usage.
pub struct UndefinedVariableRule;

impl ValidationRule for UndefinedVariableRule {
    fn id(&self) -> &'static str {
        "undefined-variable"
    }

    fn description(&self) -> &'static str {
        "Variables must be declared before use"
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

// ============================================================================
// AST Traversal
// ============================================================================

/// Check a statement for undefined variable usage
fn check_stmt(
    stmt: &Stmt,
    scope: &mut Scope,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    match stmt {
        Stmt::Declare {
            var_kind,
            name,
            init,
            ..
        } => {
            // Check the initializer FIRST (before adding variable to scope)
            // This catches: let x = x + 1;
            if let Some(init_expr) = init {
                check_expr(init_expr, scope, errors, rule_id);
            }
            scope.define(name, *var_kind);
        }

        Stmt::Assign {
            var,
            path,
            value,
            span,
        } => {
            if scope.lookup(var).is_none() {
                errors.push(ValidationError::error(
                    *span,
                    format!("Assignment to undeclared variable '{}'", var),
                    rule_id,
                ));
            }
            for segment in path {
                if let MemberAccess::Index { expr, .. } = segment {
                    check_expr(expr, scope, errors, rule_id);
                }
            }
            check_expr(value, scope, errors, rule_id);
        }

        Stmt::If {
            test,
            then_s,
            else_s,
            ..
        } => {
            check_expr(test, scope, errors, rule_id);
            check_nested(then_s, scope, errors, rule_id);
            if let Some(else_stmt) = else_s {
                check_nested(else_stmt, scope, errors, rule_id);
            }
        }

        Stmt::While { test, body, .. } => {
            check_expr(test, scope, errors, rule_id);
            check_nested(body, scope, errors, rule_id);
        }

        Stmt::ForLoop {
            binding,
            iterable,
            body,
            ..
        } => {
            // Check iterable in current scope
            check_expr(iterable, scope, errors, rule_id);

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

        Stmt::Block { body, .. } => {
            scope.push();
            for stmt in body {
                check_stmt(stmt, scope, errors, rule_id);
            }
            scope.pop();
        }

        Stmt::Return { value, .. } => {
            if let Some(expr) = value {
                check_expr(expr, scope, errors, rule_id);
            }
        }

        Stmt::Throw { value, .. } => check_expr(value, scope, errors, rule_id),

        Stmt::Expr { expr, .. } => check_expr(expr, scope, errors, rule_id),

        // These don't contain variable references
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

/// Check a statement in its own child scope
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

/// Check an expression for undefined variable usage
fn check_expr(expr: &Expr, scope: &Scope, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match expr {
        Expr::Ident { name, span } => {
            if scope.lookup(name).is_none() {
                errors.push(ValidationError::error(
                    *span,
                    format!("Undefined variable '{}'", name),
                    rule_id,
                ));
            }
        }

        Expr::Member { object, .. } => {
            // Only check the object, not the property
            check_expr(object, scope, errors, rule_id);
        }

        Expr::Index { object, index, .. } => {
            check_expr(object, scope, errors, rule_id);
            check_expr(index, scope, errors, rule_id);
        }

        Expr::Call {
            callee,
            args,
            kwargs,
            ..
        } => {
            match callee.as_ref() {
                // Function names are not variables
                Expr::Ident { .. } => {}
                Expr::Member {
                    object, property, ..
                } => {
                    if !is_namespace_call(object, property) {
                        check_expr(object, scope, errors, rule_id);
                    }
                }
                other => check_expr(other, scope, errors, rule_id),
            }
            for arg in args {
                check_expr(arg, scope, errors, rule_id);
            }
            for (_, value) in kwargs {
                check_expr(value, scope, errors, rule_id);
            }
        }

        Expr::Async { call: inner, .. }
        | Expr::Await { inner, .. }
        | Expr::Unary { operand: inner, .. } => {
            check_expr(inner, scope, errors, rule_id);
        }

        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            check_expr(left, scope, errors, rule_id);
            check_expr(right, scope, errors, rule_id);
        }

        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            check_expr(condition, scope, errors, rule_id);
            check_expr(consequent, scope, errors, rule_id);
            check_expr(alternate, scope, errors, rule_id);
        }

        Expr::LitList { elements, .. } => {
            for element in elements {
                check_expr(element, scope, errors, rule_id);
            }
        }

        Expr::LitObj { properties, .. } => {
            for (_, value) in properties {
                check_expr(value, scope, errors, rule_id);
            }
        }

        // Literals don't contain variable references
        Expr::LitBool { .. }
        | Expr::LitInt { .. }
        | Expr::LitFloat { .. }
        | Expr::LitStr { .. }
        | Expr::LitNull { .. } => {}
    }
}
