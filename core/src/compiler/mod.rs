//! Lowering from the AST to flat instruction lists
//!
//! Runs after semantic validation, so most failures here indicate a script
//! the validator let through; they are still reported as `ValidationError`s
//! rather than panics.
//!
//! Slot layout per function: parameters (or declared inputs, for main) take
//! slots `0..n`; every later binding gets a fresh slot, so a slot is never
//! shared by two bindings and block scoping needs no runtime support.

pub mod instr;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::executor::types::ast::{
    Expr, ForLoopKind, LogicalOp, MemberAccess, ScriptDef, Span, Stmt,
};
use crate::executor::types::Val;
use crate::parser::resolve::{CallNames, CallTarget};
use crate::parser::semantic_validator::ValidationError;

pub use instr::Instr;

/// Name reported for the top-level body
pub const MAIN_FUNCTION: &str = "main";

const RULE_ID: &str = "compile";

/* ===================== Compiled Program ===================== */

/// A compiled script, shared read-only by every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub script_name: String,
    /// Declared inputs, bound to main's first slots in this order
    pub inputs: Vec<String>,
    /// Declared external functions, sorted
    pub externals: Vec<String>,
    /// Main body at index 0, then script functions in declaration order
    pub functions: Vec<Function>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub arity: u32,
    pub num_locals: u32,
    pub code: Vec<Instr>,
}

impl CompiledProgram {
    pub fn main(&self) -> Option<&Function> {
        self.functions.first()
    }

    pub fn function_name(&self, func: u32) -> &str {
        self.functions
            .get(func as usize)
            .map(|f| f.name.as_str())
            .unwrap_or(MAIN_FUNCTION)
    }
}

/* ===================== Public API ===================== */

/// Compile a validated script
pub fn compile(
    script: &ScriptDef,
    script_name: &str,
    inputs: &[String],
    externals: &BTreeSet<String>,
) -> Result<CompiledProgram, ValidationError> {
    let names = CallNames::new(script, externals);
    let function_ids: BTreeMap<&str, u32> = script
        .functions
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i as u32 + 1))
        .collect();

    let mut functions = Vec::with_capacity(script.functions.len() + 1);
    functions.push(FunctionCompiler::new(&names, &function_ids, inputs).finish(
        MAIN_FUNCTION,
        inputs.len(),
        &script.body,
    )?);
    for decl in &script.functions {
        functions.push(
            FunctionCompiler::new(&names, &function_ids, &decl.params).finish(
                &decl.name,
                decl.params.len(),
                &decl.body,
            )?,
        );
    }

    Ok(CompiledProgram {
        script_name: script_name.to_string(),
        inputs: inputs.to_vec(),
        externals: externals.iter().cloned().collect(),
        functions,
    })
}

/* ===================== Function Compiler ===================== */

struct LoopContext {
    continue_target: u32,
    break_jumps: Vec<usize>,
    /// `try` nesting depth at loop entry
    try_depth: usize,
}

struct FunctionCompiler<'c, 'a> {
    names: &'c CallNames<'a>,
    function_ids: &'c BTreeMap<&'a str, u32>,
    code: Vec<Instr>,
    scopes: Vec<BTreeMap<String, u32>>,
    num_locals: u32,
    loops: Vec<LoopContext>,
    try_depth: usize,
}

type CompileResult<T = ()> = Result<T, ValidationError>;

fn compile_error(span: Span, message: impl Into<String>) -> ValidationError {
    ValidationError::error(span, message, RULE_ID)
}

impl<'c, 'a> FunctionCompiler<'c, 'a> {
    fn new(
        names: &'c CallNames<'a>,
        function_ids: &'c BTreeMap<&'a str, u32>,
        params: &[String],
    ) -> Self {
        let mut compiler = Self {
            names,
            function_ids,
            code: Vec::new(),
            scopes: vec![BTreeMap::new()],
            num_locals: 0,
            loops: Vec::new(),
            try_depth: 0,
        };
        for param in params {
            compiler.declare(param);
        }
        compiler
    }

    fn finish(mut self, name: &str, arity: usize, body: &Stmt) -> CompileResult<Function> {
        self.stmt(body)?;
        self.emit(Instr::Const(Val::Null));
        self.emit(Instr::Return);
        Ok(Function {
            name: name.to_string(),
            arity: arity as u32,
            num_locals: self.num_locals,
            code: self.code,
        })
    }

    /* ----- emission helpers ----- */

    fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    /// Point the jump at `at` to the current position
    fn patch(&mut self, at: usize) {
        let target = self.here();
        match self.code.get_mut(at) {
            Some(Instr::Jump(t))
            | Some(Instr::JumpIfFalse(t))
            | Some(Instr::JumpIfFalseOrPop(t))
            | Some(Instr::JumpIfTrueOrPop(t))
            | Some(Instr::JumpIfNotNullOrPop(t))
            | Some(Instr::SetupTry { catch_ip: t })
            | Some(Instr::ForNext { exit: t, .. }) => *t = target,
            _ => {}
        }
    }

    /* ----- scopes ----- */

    fn declare(&mut self, name: &str) -> u32 {
        let slot = self.num_locals;
        self.num_locals += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), slot);
        }
        slot
    }

    /// A slot no script name can refer to
    fn hidden_slot(&mut self) -> u32 {
        let slot = self.num_locals;
        self.num_locals += 1;
        slot
    }

    fn lookup(&self, name: &str, span: Span) -> CompileResult<u32> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .ok_or_else(|| compile_error(span, format!("Undefined variable '{}'", name)))
    }

    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
        self.scopes.push(BTreeMap::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    /* ----- statements ----- */

    fn stmt(&mut self, stmt: &Stmt) -> CompileResult {
        match stmt {
            Stmt::Block { body, .. } => self.scoped(|c| body.iter().try_for_each(|s| c.stmt(s))),

            Stmt::Declare { name, init, .. } => {
                match init {
                    Some(init) => self.expr(init)?,
                    None => {
                        self.emit(Instr::Const(Val::Null));
                    }
                }
                let slot = self.declare(name);
                self.emit(Instr::StoreLocal(slot));
                Ok(())
            }

            Stmt::Assign {
                var,
                path,
                value,
                span,
            } => {
                let slot = self.lookup(var, *span)?;
                if path.is_empty() {
                    self.expr(value)?;
                    self.emit(Instr::StoreLocal(slot));
                    return Ok(());
                }
                for segment in path {
                    match segment {
                        MemberAccess::Prop { property, .. } => {
                            self.emit(Instr::Const(Val::Str(property.clone())));
                        }
                        MemberAccess::Index { expr, .. } => self.expr(expr)?,
                    }
                }
                self.expr(value)?;
                self.emit(Instr::StorePath {
                    slot,
                    depth: path.len() as u32,
                });
                Ok(())
            }

            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                self.expr(test)?;
                let to_else = self.emit(Instr::JumpIfFalse(0));
                self.stmt(then_s)?;
                match else_s {
                    Some(else_s) => {
                        let to_end = self.emit(Instr::Jump(0));
                        self.patch(to_else);
                        self.stmt(else_s)?;
                        self.patch(to_end);
                    }
                    None => self.patch(to_else),
                }
                Ok(())
            }

            Stmt::While { test, body, .. } => {
                let start = self.here();
                self.expr(test)?;
                let to_exit = self.emit(Instr::JumpIfFalse(0));
                self.loop_body(start, body)?;
                self.emit(Instr::Jump(start));
                self.patch(to_exit);
                self.close_loop();
                Ok(())
            }

            Stmt::ForLoop {
                kind,
                binding,
                iterable,
                body,
                ..
            } => self.for_loop(*kind, binding, iterable, body),

            Stmt::Return { value, .. } => {
                match value {
                    Some(value) => self.expr(value)?,
                    None => {
                        self.emit(Instr::Const(Val::Null));
                    }
                }
                self.emit(Instr::Return);
                Ok(())
            }

            Stmt::Throw { value, .. } => {
                self.expr(value)?;
                self.emit(Instr::Throw);
                Ok(())
            }

            Stmt::Try {
                body,
                catch_var,
                catch_body,
                ..
            } => {
                let setup = self.emit(Instr::SetupTry { catch_ip: 0 });
                self.try_depth += 1;
                let body_result = self.stmt(body);
                self.try_depth -= 1;
                body_result?;
                self.emit(Instr::PopTry);
                let to_end = self.emit(Instr::Jump(0));

                self.patch(setup);
                self.scoped(|c| {
                    let slot = c.declare(catch_var);
                    c.emit(Instr::StoreLocal(slot));
                    c.stmt(catch_body)
                })?;
                self.patch(to_end);
                Ok(())
            }

            Stmt::Expr { expr, .. } => {
                self.expr(expr)?;
                self.emit(Instr::Pop);
                Ok(())
            }

            Stmt::Break { span } => {
                let (try_depth, _) = self.innermost_loop(*span, "break")?;
                self.unwind_tries_to(try_depth);
                let jump = self.emit(Instr::Jump(0));
                if let Some(ctx) = self.loops.last_mut() {
                    ctx.break_jumps.push(jump);
                }
                Ok(())
            }

            Stmt::Continue { span } => {
                let (try_depth, target) = self.innermost_loop(*span, "continue")?;
                self.unwind_tries_to(try_depth);
                self.emit(Instr::Jump(target));
                Ok(())
            }
        }
    }

    fn for_loop(
        &mut self,
        kind: ForLoopKind,
        binding: &str,
        iterable: &Expr,
        body: &Stmt,
    ) -> CompileResult {
        self.expr(iterable)?;
        self.emit(Instr::IterList(kind));
        let list_slot = self.hidden_slot();
        let idx_slot = self.hidden_slot();
        self.emit(Instr::StoreLocal(list_slot));
        self.emit(Instr::Const(Val::Int(0)));
        self.emit(Instr::StoreLocal(idx_slot));

        self.scoped(|c| {
            let var_slot = c.declare(binding);
            let next = c.here();
            let to_exit = c.emit(Instr::ForNext {
                list_slot,
                idx_slot,
                var_slot,
                exit: 0,
            });
            c.loop_body(next, body)?;
            c.emit(Instr::Jump(next));
            c.patch(to_exit);
            c.close_loop();
            Ok(())
        })
    }

    fn loop_body(&mut self, continue_target: u32, body: &Stmt) -> CompileResult {
        self.loops.push(LoopContext {
            continue_target,
            break_jumps: Vec::new(),
            try_depth: self.try_depth,
        });
        self.stmt(body)
    }

    /// Patch pending `break`s to the current position
    fn close_loop(&mut self) {
        if let Some(ctx) = self.loops.pop() {
            for jump in ctx.break_jumps {
                self.patch(jump);
            }
        }
    }

    fn innermost_loop(&self, span: Span, keyword: &str) -> CompileResult<(usize, u32)> {
        self.loops
            .last()
            .map(|ctx| (ctx.try_depth, ctx.continue_target))
            .ok_or_else(|| compile_error(span, format!("'{}' outside of a loop", keyword)))
    }

    /// Leaving a loop from inside `try` blocks drops their handlers
    fn unwind_tries_to(&mut self, depth: usize) {
        for _ in depth..self.try_depth {
            self.emit(Instr::PopTry);
        }
    }

    /* ----- expressions ----- */

    fn expr(&mut self, expr: &Expr) -> CompileResult {
        match expr {
            Expr::LitBool { v, .. } => {
                self.emit(Instr::Const(Val::Bool(*v)));
            }
            Expr::LitInt { v, .. } => {
                self.emit(Instr::Const(Val::Int(*v)));
            }
            Expr::LitFloat { v, .. } => {
                self.emit(Instr::Const(Val::Float(*v)));
            }
            Expr::LitStr { v, .. } => {
                self.emit(Instr::Const(Val::Str(v.clone())));
            }
            Expr::LitNull { .. } => {
                self.emit(Instr::Const(Val::Null));
            }
            Expr::LitList { elements, .. } => {
                for element in elements {
                    self.expr(element)?;
                }
                self.emit(Instr::MakeList(elements.len() as u32));
            }
            Expr::LitObj { properties, .. } => {
                for (_, value) in properties {
                    self.expr(value)?;
                }
                let keys = properties.iter().map(|(k, _)| k.clone()).collect();
                self.emit(Instr::MakeObject(keys));
            }
            Expr::Ident { name, span } => {
                let slot = self.lookup(name, *span)?;
                self.emit(Instr::LoadLocal(slot));
            }
            Expr::Member {
                object, property, ..
            } => {
                self.expr(object)?;
                self.emit(Instr::GetMember(property.clone()));
            }
            Expr::Index { object, index, .. } => {
                self.expr(object)?;
                self.expr(index)?;
                self.emit(Instr::GetIndex);
            }
            Expr::Call {
                callee,
                args,
                kwargs,
                span,
            } => self.call(callee, args, kwargs, false, *span)?,
            Expr::Async { call, span } => match call.as_ref() {
                Expr::Call {
                    callee,
                    args,
                    kwargs,
                    ..
                } => self.call(callee, args, kwargs, true, *span)?,
                _ => return Err(compile_error(*span, "'async' requires a call")),
            },
            Expr::Await { inner, .. } => {
                self.expr(inner)?;
                self.emit(Instr::Await);
            }
            Expr::Unary { op, operand, .. } => {
                self.expr(operand)?;
                self.emit(Instr::Unary(*op));
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                self.expr(left)?;
                self.expr(right)?;
                self.emit(Instr::Binary(*op));
            }
            Expr::Logical {
                op, left, right, ..
            } => {
                self.expr(left)?;
                let jump = self.emit(match op {
                    LogicalOp::And => Instr::JumpIfFalseOrPop(0),
                    LogicalOp::Or => Instr::JumpIfTrueOrPop(0),
                    LogicalOp::Nullish => Instr::JumpIfNotNullOrPop(0),
                });
                self.expr(right)?;
                self.patch(jump);
            }
            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => {
                self.expr(condition)?;
                let to_else = self.emit(Instr::JumpIfFalse(0));
                self.expr(consequent)?;
                let to_end = self.emit(Instr::Jump(0));
                self.patch(to_else);
                self.expr(alternate)?;
                self.patch(to_end);
            }
        }
        Ok(())
    }

    fn call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        kwargs: &[(String, Expr)],
        deferred: bool,
        span: Span,
    ) -> CompileResult {
        let target = self.names.resolve(callee);

        if deferred && !matches!(target, CallTarget::External { .. }) {
            return Err(compile_error(
                span,
                "'async' can only be applied to a call of an external function",
            ));
        }
        if !kwargs.is_empty()
            && !matches!(target, CallTarget::External { .. } | CallTarget::Os(_))
        {
            return Err(compile_error(
                span,
                "Keyword arguments can only be passed to external and OS functions",
            ));
        }

        match target {
            CallTarget::Function { name, arity } => {
                if arity != args.len() {
                    return Err(compile_error(
                        span,
                        format!(
                            "Function '{}' expects {} argument(s), got {}",
                            name,
                            arity,
                            args.len()
                        ),
                    ));
                }
                let func = self
                    .function_ids
                    .get(name)
                    .copied()
                    .ok_or_else(|| compile_error(span, format!("Unknown function '{}'", name)))?;
                self.args(args)?;
                self.emit(Instr::CallFunction {
                    func,
                    argc: args.len() as u32,
                });
            }
            CallTarget::Builtin(builtin) => {
                self.args(args)?;
                self.emit(Instr::CallBuiltin {
                    builtin,
                    argc: args.len() as u32,
                });
            }
            CallTarget::External { name, receiver } => {
                if let Some(receiver) = receiver {
                    self.expr(receiver)?;
                }
                self.args(args)?;
                for (_, value) in kwargs {
                    self.expr(value)?;
                }
                self.emit(Instr::CallExternal {
                    name: name.to_string(),
                    argc: (args.len() + usize::from(receiver.is_some())) as u32,
                    kwnames: kwargs.iter().map(|(k, _)| k.clone()).collect(),
                    method_call: receiver.is_some(),
                    deferred,
                });
            }
            CallTarget::Os(function) => {
                self.args(args)?;
                for (_, value) in kwargs {
                    self.expr(value)?;
                }
                self.emit(Instr::CallOs {
                    function,
                    argc: args.len() as u32,
                    kwnames: kwargs.iter().map(|(k, _)| k.clone()).collect(),
                });
            }
            CallTarget::UnknownFunction(name) => {
                return Err(compile_error(span, format!("Unknown function '{}'", name)))
            }
            CallTarget::UnknownOsFunction(name) => {
                return Err(compile_error(
                    span,
                    format!("Unknown OS function 'os.{}'", name),
                ))
            }
            CallTarget::UnknownMethod(name) => {
                return Err(compile_error(
                    span,
                    format!("'{}' is not a declared external function", name),
                ))
            }
            CallTarget::NotCallable => {
                return Err(compile_error(span, "Expression is not callable"))
            }
        }
        Ok(())
    }

    fn args(&mut self, args: &[Expr]) -> CompileResult {
        args.iter().try_for_each(|arg| self.expr(arg))
    }
}
