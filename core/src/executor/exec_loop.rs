//! Core execution loop
//!
//! This module contains the step() function - the heart of the interpreter.
//! Each step executes one instruction of the innermost frame.
//!
//! ## Function Organization
//! 1. run_until_done() - Top-level driver (calls step repeatedly)
//! 2. step() - Fetch, count and dispatch one instruction
//! 3. execute() - Instruction semantics
//! 4. built_value() - Output checked against the value limits
//! 5. unwind() - Deliver a thrown value to the nearest handler

use std::collections::BTreeMap;
use std::sync::Arc;

use super::calls;
use super::errors::{ErrorInfo, ScriptFault};
use super::operators;
use super::stdlib;
use super::types::{Control, Frame, TryHandler, Val};
use super::vm::{Step, VM};
use crate::compiler::Instr;

/* ===================== Public API ===================== */

/// Run the VM until it completes, faults or suspends
///
/// After it returns, inspect `vm.control` for the final state.
pub fn run_until_done(vm: &mut VM) {
    loop {
        match step(vm) {
            Step::Continue => continue,
            Step::Done => break,
        }
    }
}

/// Execute one step of the VM
pub fn step(vm: &mut VM) -> Step {
    match vm.control {
        Control::None => {}
        Control::Throw { .. } => return unwind(vm),
        Control::Return(_) | Control::Suspend(_) | Control::Fault(_) => return Step::Done,
    }

    let program = Arc::clone(&vm.program);
    let Some(frame) = vm.frames.last_mut() else {
        fault(vm, ErrorInfo::internal("No frame to execute"));
        return Step::Done;
    };
    let Some(instr) = program
        .functions
        .get(frame.func as usize)
        .and_then(|function| function.code.get(frame.ip))
    else {
        fault(vm, ErrorInfo::internal("Instruction pointer out of range"));
        return Step::Done;
    };
    frame.ip += 1;

    vm.steps += 1;
    if vm.steps > vm.limits.max_steps {
        limit_exceeded(
            vm,
            format!("Step limit of {} exceeded", vm.limits.max_steps),
        );
        return Step::Done;
    }

    if let Err(err) = execute(vm, instr) {
        throw(vm, Val::Error(err));
        return Step::Continue;
    }

    let verdict = built_value(vm, instr).map(|value| vm.limits.check_value(value));
    if let Some(Err(message)) = verdict {
        limit_exceeded(vm, message);
        return Step::Done;
    }
    Step::Continue
}

/// The value an instruction just built, if it builds one
///
/// Values only grow through these instructions, so checking their output
/// keeps every live value within the depth and size limits.
fn built_value<'v>(vm: &'v VM, instr: &Instr) -> Option<&'v Val> {
    let frame = vm.frames.last()?;
    match instr {
        Instr::StorePath { slot, .. } => frame.locals.get(*slot as usize),
        Instr::Binary(_)
        | Instr::MakeList(_)
        | Instr::MakeObject(_)
        | Instr::CallBuiltin { .. }
        | Instr::IterList(_) => frame.stack.last(),
        _ => None,
    }
}

/* ===================== Control Helpers ===================== */

/// Raise a script-level value at the current position
pub(crate) fn throw(vm: &mut VM, value: Val) {
    let function = vm.current_function();
    vm.control = Control::Throw { value, function };
}

/// End the run with an uncatchable resource-limit fault
pub(crate) fn limit_exceeded(vm: &mut VM, message: String) {
    let function = vm.current_function();
    tracing::warn!(%function, %message, "resource limit exceeded");
    vm.control = Control::Fault(ScriptFault::resource_limit(message, function));
}

/// End the run because the state itself is inconsistent
fn fault(vm: &mut VM, err: ErrorInfo) {
    let function = vm.current_function();
    vm.control = Control::Fault(ScriptFault::from_thrown(&Val::Error(err), function));
}

/// Unwind the stack when a value was thrown
///
/// Pops frames until one has an active `try` handler. With none left the
/// throw becomes the run's fault.
fn unwind(vm: &mut VM) -> Step {
    let Control::Throw { value, function } = std::mem::replace(&mut vm.control, Control::None)
    else {
        return Step::Continue;
    };

    while let Some(frame) = vm.frames.last_mut() {
        if let Some(handler) = frame.handlers.pop() {
            frame.stack.truncate(handler.stack_len as usize);
            frame.stack.push(value);
            frame.ip = handler.catch_ip as usize;
            return Step::Continue;
        }
        vm.frames.pop();
    }

    vm.control = Control::Fault(ScriptFault::from_thrown(&value, function));
    Step::Done
}

/* ===================== Frame Helpers ===================== */

pub(crate) fn top(vm: &mut VM) -> Result<&mut Frame, ErrorInfo> {
    vm.frames
        .last_mut()
        .ok_or_else(|| ErrorInfo::internal("No active frame"))
}

pub(crate) fn pop(frame: &mut Frame) -> Result<Val, ErrorInfo> {
    frame
        .stack
        .pop()
        .ok_or_else(|| ErrorInfo::internal("Operand stack underflow"))
}

/// Pop `n` values, returned in push order
pub(crate) fn pop_n(frame: &mut Frame, n: usize) -> Result<Vec<Val>, ErrorInfo> {
    let at = frame
        .stack
        .len()
        .checked_sub(n)
        .ok_or_else(|| ErrorInfo::internal("Operand stack underflow"))?;
    Ok(frame.stack.split_off(at))
}

fn local(frame: &mut Frame, slot: u32) -> Result<&mut Val, ErrorInfo> {
    frame
        .locals
        .get_mut(slot as usize)
        .ok_or_else(|| ErrorInfo::internal(format!("Local slot {} out of range", slot)))
}

/* ===================== Instructions ===================== */

fn execute(vm: &mut VM, instr: &Instr) -> Result<(), ErrorInfo> {
    match instr {
        Instr::Const(v) => top(vm)?.stack.push(v.clone()),

        Instr::LoadLocal(slot) => {
            let frame = top(vm)?;
            let v = local(frame, *slot)?.clone();
            frame.stack.push(v);
        }

        Instr::StoreLocal(slot) => {
            let frame = top(vm)?;
            let v = pop(frame)?;
            *local(frame, *slot)? = v;
        }

        Instr::StorePath { slot, depth } => {
            let frame = top(vm)?;
            let value = pop(frame)?;
            let path = pop_n(frame, *depth as usize)?;
            operators::set_path(local(frame, *slot)?, &path, value)?;
        }

        Instr::Pop => {
            pop(top(vm)?)?;
        }

        Instr::Binary(op) => {
            let frame = top(vm)?;
            let right = pop(frame)?;
            let left = pop(frame)?;
            frame.stack.push(operators::binary(*op, &left, &right)?);
        }

        Instr::Unary(op) => {
            let frame = top(vm)?;
            let operand = pop(frame)?;
            frame.stack.push(operators::unary(*op, &operand)?);
        }

        Instr::MakeList(n) => {
            let frame = top(vm)?;
            let items = pop_n(frame, *n as usize)?;
            frame.stack.push(Val::List(items));
        }

        Instr::MakeObject(keys) => {
            let frame = top(vm)?;
            let values = pop_n(frame, keys.len())?;
            let map: BTreeMap<String, Val> = keys.iter().cloned().zip(values).collect();
            frame.stack.push(Val::Obj(map));
        }

        Instr::GetMember(property) => {
            let frame = top(vm)?;
            let object = pop(frame)?;
            frame.stack.push(operators::get_member(&object, property)?);
        }

        Instr::GetIndex => {
            let frame = top(vm)?;
            let index = pop(frame)?;
            let object = pop(frame)?;
            frame.stack.push(operators::get_index(&object, &index)?);
        }

        Instr::Jump(target) => top(vm)?.ip = *target as usize,

        Instr::JumpIfFalse(target) => {
            let frame = top(vm)?;
            if !pop(frame)?.is_truthy() {
                frame.ip = *target as usize;
            }
        }

        Instr::JumpIfFalseOrPop(target) => {
            jump_or_pop(top(vm)?, *target, |v| !v.is_truthy())?
        }
        Instr::JumpIfTrueOrPop(target) => jump_or_pop(top(vm)?, *target, Val::is_truthy)?,
        Instr::JumpIfNotNullOrPop(target) => {
            jump_or_pop(top(vm)?, *target, |v| !v.is_null())?
        }

        Instr::CallFunction { func, argc } => call_function(vm, *func, *argc as usize)?,

        Instr::CallBuiltin { builtin, argc } => {
            let frame = top(vm)?;
            let args = pop_n(frame, *argc as usize)?;
            frame.stack.push(stdlib::call_builtin(*builtin, &args)?);
        }

        Instr::CallExternal {
            name,
            argc,
            kwnames,
            method_call,
            deferred,
        } => calls::issue_external(vm, name, *argc as usize, kwnames, *method_call, *deferred)?,

        Instr::CallOs {
            function,
            argc,
            kwnames,
        } => calls::issue_os(vm, *function, *argc as usize, kwnames)?,

        Instr::Await => calls::await_value(vm)?,

        Instr::Return => {
            let value = pop(top(vm)?)?;
            vm.frames.pop();
            match vm.frames.last_mut() {
                Some(caller) => caller.stack.push(value),
                None => vm.control = Control::Return(value),
            }
        }

        Instr::Throw => {
            let value = pop(top(vm)?)?;
            throw(vm, value);
        }

        Instr::SetupTry { catch_ip } => {
            let frame = top(vm)?;
            let stack_len = frame.stack.len() as u32;
            frame.handlers.push(TryHandler {
                catch_ip: *catch_ip,
                stack_len,
            });
        }

        Instr::PopTry => {
            top(vm)?.handlers.pop();
        }

        Instr::IterList(kind) => {
            let frame = top(vm)?;
            let iterable = pop(frame)?;
            frame
                .stack
                .push(Val::List(operators::iter_items(*kind, &iterable)?));
        }

        Instr::ForNext {
            list_slot,
            idx_slot,
            var_slot,
            exit,
        } => {
            let frame = top(vm)?;
            let Val::Int(idx) = *local(frame, *idx_slot)? else {
                return Err(ErrorInfo::internal("Loop index is not an int"));
            };
            let next = match local(frame, *list_slot)? {
                Val::List(items) => usize::try_from(idx).ok().and_then(|i| items.get(i)).cloned(),
                _ => return Err(ErrorInfo::internal("Loop list is not a list")),
            };
            match next {
                Some(item) => {
                    *local(frame, *var_slot)? = item;
                    *local(frame, *idx_slot)? = Val::Int(idx + 1);
                }
                None => frame.ip = *exit as usize,
            }
        }
    }
    Ok(())
}

fn jump_or_pop(frame: &mut Frame, target: u32, jump: impl Fn(&Val) -> bool) -> Result<(), ErrorInfo> {
    let taken = match frame.stack.last() {
        Some(v) => jump(v),
        None => return Err(ErrorInfo::internal("Operand stack underflow")),
    };
    if taken {
        frame.ip = target as usize;
    } else {
        frame.stack.pop();
    }
    Ok(())
}

fn call_function(vm: &mut VM, func: u32, argc: usize) -> Result<(), ErrorInfo> {
    if vm.frames.len() >= vm.limits.max_call_depth {
        limit_exceeded(
            vm,
            format!("Call depth limit of {} exceeded", vm.limits.max_call_depth),
        );
        return Ok(());
    }

    let num_locals = vm
        .program
        .functions
        .get(func as usize)
        .map(|f| f.num_locals as usize)
        .ok_or_else(|| ErrorInfo::internal(format!("Unknown function index {}", func)))?;

    let mut locals = pop_n(top(vm)?, argc)?;
    locals.resize(num_locals.max(argc), Val::Null);
    vm.frames.push(Frame {
        func,
        ip: 0,
        stack: Vec::new(),
        locals,
        handlers: Vec::new(),
    });
    Ok(())
}
