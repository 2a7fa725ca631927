//! Rule: Unused Variable
//!
//! Reports a warning when a variable is declared but never read.
//!
//! # Notes
//!
//! - Variables starting with `_` are exempt (convention for intentionally unused)
//! - This is a warning, not an error, since unused variables are valid code

use std::collections::{BTreeMap, BTreeSet};

use crate::executor::types::ast::{Expr, MemberAccess, ScriptDef, Span, Stmt};

use super::super::{ValidationContext, ValidationError, ValidationRule};

/// Rule that checks for unused variable declarations.
pub struct UnusedVariableRule;

impl ValidationRule for UnusedVariableRule {
    fn id(&self) -> &'static str {
        "unused-variable"
    }

    fn description(&self) -> &'static str {
        "Variables should be used after declaration"
    }

    fn validate(&self, script: &ScriptDef, _ctx: &ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let bodies = std::iter::once(&script.body).chain(script.functions.iter().map(|f| &f.body));
        for body in bodies {
            // Phase 1: Collect all declarations
            let mut declarations = BTreeMap::new();
            // Phase 2: Collect all usages
            let mut usages = BTreeSet::new();
            collect(body, &mut declarations, &mut usages);

            // Phase 3: Report unused declarations
            for (name, span) in declarations {
                if name.starts_with('_') || usages.contains(&name) {
                    continue;
                }
                errors.push(ValidationError::warning(
                    span,
                    format!("Variable '{}' is declared but never used", name),
                    self.id(),
                ));
            }
        }

        errors
    }
}

fn collect(stmt: &Stmt, declarations: &mut BTreeMap<String, Span>, usages: &mut BTreeSet<String>) {
    match stmt {
        Stmt::Declare {
            name, init, span, ..
        } => {
            declarations.entry(name.clone()).or_insert(*span);
            if let Some(init) = init {
                collect_expr(init, usages);
            }
        }
        Stmt::Assign {
            var, path, value, ..
        } => {
            // Writing through a path reads the container first
            if !path.is_empty() {
                usages.insert(var.clone());
            }
            for segment in path {
                if let MemberAccess::Index { expr, .. } = segment {
                    collect_expr(expr, usages);
                }
            }
            collect_expr(value, usages);
        }
        Stmt::Block { body, .. } => {
            for stmt in body {
                collect(stmt, declarations, usages);
            }
        }
        Stmt::If {
            test,
            then_s,
            else_s,
            ..
        } => {
            collect_expr(test, usages);
            collect(then_s, declarations, usages);
            if let Some(else_stmt) = else_s {
                collect(else_stmt, declarations, usages);
            }
        }
        Stmt::While { test, body, .. } => {
            collect_expr(test, usages);
            collect(body, declarations, usages);
        }
        Stmt::ForLoop { iterable, body, .. } => {
            collect_expr(iterable, usages);
            collect(body, declarations, usages);
        }
        Stmt::Try {
            body, catch_body, ..
        } => {
            collect(body, declarations, usages);
            collect(catch_body, declarations, usages);
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                collect_expr(value, usages);
            }
        }
        Stmt::Throw { value: expr, .. } | Stmt::Expr { expr, .. } => collect_expr(expr, usages),
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

fn collect_expr(expr: &Expr, usages: &mut BTreeSet<String>) {
    match expr {
        Expr::Ident { name, .. } => {
            usages.insert(name.clone());
        }
        Expr::Member { object, .. } => collect_expr(object, usages),
        Expr::Index { object, index, .. } => {
            collect_expr(object, usages);
            collect_expr(index, usages);
        }
        Expr::Call {
            callee,
            args,
            kwargs,
            ..
        } => {
            collect_expr(callee, usages);
            args.iter().for_each(|a| collect_expr(a, usages));
            kwargs.iter().for_each(|(_, v)| collect_expr(v, usages));
        }
        Expr::Async { call: inner, .. }
        | Expr::Await { inner, .. }
        | Expr::Unary { operand: inner, .. } => collect_expr(inner, usages),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            collect_expr(left, usages);
            collect_expr(right, usages);
        }
        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            collect_expr(condition, usages);
            collect_expr(consequent, usages);
            collect_expr(alternate, usages);
        }
        Expr::LitList { elements, .. } => elements.iter().for_each(|e| collect_expr(e, usages)),
        Expr::LitObj { properties, .. } => {
            properties.iter().for_each(|(_, v)| collect_expr(v, usages))
        }
        Expr::LitBool { .. }
        | Expr::LitInt { .. }
        | Expr::LitFloat { .. }
        | Expr::LitStr { .. }
        | Expr::LitNull { .. } => {}
    }
}
