//! Rule: Call Target
//!
//! Reports an error when a call cannot be resolved at compile time:
//! unknown function, method or OS function names, wrong argument counts for
//! script functions, keyword arguments passed to builtins or script functions,
//! and `async` applied to anything but an external call.

use crate::executor::types::ast::{Expr, MemberAccess, ScriptDef, Stmt};
use crate::parser::resolve::{CallNames, CallTarget};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct CallTargetRule;

impl ValidationRule for CallTargetRule {
    fn id(&self) -> &'static str {
        "call-target"
    }

    fn description(&self) -> &'static str {
        "Calls must name a script function, declared external function or builtin"
    }

    fn validate(&self, script: &ScriptDef, ctx: &ValidationContext) -> Vec<ValidationError> {
        let mut checker = Checker {
            names: &ctx.names,
            errors: Vec::new(),
            rule_id: self.id(),
        };
        checker.stmt(&script.body);
        for function in &script.functions {
            checker.stmt(&function.body);
        }
        checker.errors
    }
}

struct Checker<'n, 'a> {
    names: &'n CallNames<'a>,
    errors: Vec<ValidationError>,
    rule_id: &'static str,
}

impl Checker<'_, '_> {
    fn error(&mut self, expr: &Expr, message: String) {
        self.errors
            .push(ValidationError::error(expr.span(), message, self.rule_id));
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { body, .. } => body.iter().for_each(|s| self.stmt(s)),
            Stmt::Declare { init, .. } => {
                if let Some(init) = init {
                    self.expr(init);
                }
            }
            Stmt::Assign { path, value, .. } => {
                for segment in path {
                    if let MemberAccess::Index { expr, .. } = segment {
                        self.expr(expr);
                    }
                }
                self.expr(value);
            }
            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                self.expr(test);
                self.stmt(then_s);
                if let Some(else_stmt) = else_s {
                    self.stmt(else_stmt);
                }
            }
            Stmt::While { test, body, .. } => {
                self.expr(test);
                self.stmt(body);
            }
            Stmt::ForLoop { iterable, body, .. } => {
                self.expr(iterable);
                self.stmt(body);
            }
            Stmt::Try {
                body, catch_body, ..
            } => {
                self.stmt(body);
                self.stmt(catch_body);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Stmt::Throw { value, .. } => self.expr(value),
            Stmt::Expr { expr, .. } => self.expr(expr),
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call {
                callee,
                args,
                kwargs,
                ..
            } => {
                self.call(expr, callee, args.len(), !kwargs.is_empty());
                args.iter().for_each(|a| self.expr(a));
                kwargs.iter().for_each(|(_, v)| self.expr(v));
            }
            Expr::Async { call, .. } => {
                let is_external_call = match call.as_ref() {
                    Expr::Call { callee, .. } => {
                        matches!(self.names.resolve(callee), CallTarget::External { .. })
                    }
                    _ => false,
                };
                if !is_external_call {
                    self.error(
                        expr,
                        "'async' can only be applied to a call of an external function".to_string(),
                    );
                }
                self.expr(call);
            }
            Expr::Member { object, .. } => self.expr(object),
            Expr::Index { object, index, .. } => {
                self.expr(object);
                self.expr(index);
            }
            Expr::Await { inner, .. } | Expr::Unary { operand: inner, .. } => self.expr(inner),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => {
                self.expr(condition);
                self.expr(consequent);
                self.expr(alternate);
            }
            Expr::LitList { elements, .. } => elements.iter().for_each(|e| self.expr(e)),
            Expr::LitObj { properties, .. } => properties.iter().for_each(|(_, v)| self.expr(v)),
            Expr::LitBool { .. }
            | Expr::LitInt { .. }
            | Expr::LitFloat { .. }
            | Expr::LitStr { .. }
            | Expr::LitNull { .. }
            | Expr::Ident { .. } => {}
        }
    }

    fn call(&mut self, call: &Expr, callee: &Expr, argc: usize, has_kwargs: bool) {
        let target = self.names.resolve(callee);

        match target {
            CallTarget::External { receiver, .. } => {
                if let Some(receiver) = receiver {
                    self.expr(receiver);
                }
                return;
            }
            CallTarget::Os(_) => return,
            _ => {}
        }

        if has_kwargs {
            self.error(
                call,
                "Keyword arguments can only be passed to external and OS functions".to_string(),
            );
        }

        match target {
            CallTarget::Function { name, arity } if arity != argc => self.error(
                call,
                format!(
                    "Function '{}' expects {} argument(s), got {}",
                    name, arity, argc
                ),
            ),
            CallTarget::UnknownFunction(name) => {
                self.error(callee, format!("Unknown function '{}'", name))
            }
            CallTarget::UnknownOsFunction(name) => {
                self.error(callee, format!("Unknown OS function 'os.{}'", name))
            }
            CallTarget::UnknownMethod(name) => self.error(
                callee,
                format!("'{}' is not a declared external function", name),
            ),
            CallTarget::NotCallable => {
                self.error(callee, "Expression is not callable".to_string())
            }
            _ => {}
        }
    }
}
