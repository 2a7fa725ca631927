//! Test helpers for executor tests
//!
//! Common utilities for compiling scripts and building VMs

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::compiler::{self, CompiledProgram};
use crate::executor::{run_until_done, Control, ResourceLimits, ScriptFault, Val, VM};
use crate::parser::semantic_validator::{validate_script, ValidationContext};

/// Parse, validate and compile a script, round-tripping the compiled form
///
/// This helper:
/// - Parses the script and fails the test on any validation error
/// - Compiles it with `inputs` bound in order and `externals` declared
/// - Serializes and deserializes the result (to test round-trip compatibility)
pub fn compile_source(source: &str, inputs: &[&str], externals: &[&str]) -> CompiledProgram {
    let script = crate::parser::parse_script(source).expect("Parse script failed");
    let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
    let externals: BTreeSet<String> = externals.iter().map(|s| s.to_string()).collect();

    let ctx = ValidationContext::new(&script, source, &inputs, &externals);
    let errors: Vec<_> = validate_script(&script, &ctx)
        .into_iter()
        .filter(|e| e.is_error())
        .collect();
    assert!(errors.is_empty(), "Script validation failed: {:?}", errors);

    let compiled =
        compiler::compile(&script, "test.st", &inputs, &externals).expect("Compile failed");
    let bytes = postcard::to_allocvec(&compiled).expect("Program serialization failed");
    postcard::from_bytes(&bytes).expect("Program deserialization failed")
}

/// Build a VM for `source` with named inputs and declared externals
///
/// # Returns
/// A VM ready to execute with `run_until_done()` or `step()`
pub fn build_vm(source: &str, inputs: &[(&str, Val)], externals: &[&str]) -> VM {
    build_vm_with_limits(source, inputs, externals, ResourceLimits::default())
}

pub fn build_vm_with_limits(
    source: &str,
    inputs: &[(&str, Val)],
    externals: &[&str],
    limits: ResourceLimits,
) -> VM {
    let names: Vec<&str> = inputs.iter().map(|(name, _)| *name).collect();
    let values: Vec<Val> = inputs.iter().map(|(_, value)| value.clone()).collect();
    let program = compile_source(source, &names, externals);
    VM::new(Arc::new(program), values, limits)
}

/// Run a script without externals and return its value
pub fn run(source: &str) -> Val {
    run_with(source, &[])
}

pub fn run_with(source: &str, inputs: &[(&str, Val)]) -> Val {
    let mut vm = build_vm(source, inputs, &[]);
    run_until_done(&mut vm);
    let Control::Return(value) = vm.control else {
        unreachable!("Expected Control::Return, got {:?}", vm.control);
    };
    value
}

/// Run a script that is expected to fail
pub fn run_fault(source: &str) -> ScriptFault {
    let mut vm = build_vm(source, &[], &[]);
    run_until_done(&mut vm);
    let Control::Fault(fault) = vm.control else {
        unreachable!("Expected Control::Fault, got {:?}", vm.control);
    };
    fault
}
