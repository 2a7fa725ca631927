//! Program: a parsed, validated and compiled script
//!
//! A `Program` is immutable. Every run started from it, and every snapshot
//! taken along the way, shares the compiled body through one `Arc`.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compiler::{self, CompiledProgram};
use crate::error::{CompileError, DecodeError, EngineError, InputError};
use crate::executor::types::Val;
use crate::executor::{ResourceLimits, VM};
use crate::format::{self, ArtifactKind};
use crate::parser::semantic_validator::{validate_script, ValidationContext, ValidationError};
use crate::parser::{self, ParseError};
use crate::progress::{drive, Progress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    compiled: Arc<CompiledProgram>,
}

/// A program plus the warnings validation produced for it
#[derive(Debug)]
pub struct Checked {
    pub program: Program,
    pub warnings: Vec<ValidationError>,
}

impl Program {
    /// Parse, validate and compile `code`
    ///
    /// # Arguments
    /// * `code` - Script source
    /// * `script_name` - Used in diagnostics only
    /// * `input_names` - Values supplied to `start`, bound in this order
    /// * `external_functions` - Names the script may call through the host
    pub fn new(
        code: &str,
        script_name: &str,
        input_names: &[&str],
        external_functions: &[&str],
    ) -> Result<Self, CompileError> {
        Self::check(code, script_name, input_names, external_functions).map(|c| c.program)
    }

    /// Like `new`, but also returns validation warnings
    pub fn check(
        code: &str,
        script_name: &str,
        input_names: &[&str],
        external_functions: &[&str],
    ) -> Result<Checked, CompileError> {
        let script = parser::parse_script(code).map_err(|e| syntax_error(script_name, &e))?;

        let inputs: Vec<String> = input_names.iter().map(|s| s.to_string()).collect();
        let externals: BTreeSet<String> =
            external_functions.iter().map(|s| s.to_string()).collect();

        let ctx = ValidationContext::new(&script, code, &inputs, &externals);
        let (errors, warnings): (Vec<_>, Vec<_>) = validate_script(&script, &ctx)
            .into_iter()
            .partition(ValidationError::is_error);
        if !errors.is_empty() {
            return Err(CompileError::Invalid {
                script_name: script_name.to_string(),
                errors,
            });
        }

        let compiled = compiler::compile(&script, script_name, &inputs, &externals).map_err(
            |err| CompileError::Invalid {
                script_name: script_name.to_string(),
                errors: vec![err],
            },
        )?;
        tracing::debug!(
            script = script_name,
            functions = compiled.functions.len(),
            "compiled program"
        );

        Ok(Checked {
            program: Program {
                compiled: Arc::new(compiled),
            },
            warnings,
        })
    }

    pub fn script_name(&self) -> &str {
        &self.compiled.script_name
    }

    pub fn input_names(&self) -> &[String] {
        &self.compiled.inputs
    }

    pub fn external_functions(&self) -> &[String] {
        &self.compiled.externals
    }

    /// Start a run with default resource limits
    pub fn start(&self, inputs: Vec<Val>) -> Result<Progress, InputError> {
        self.start_with_limits(inputs, ResourceLimits::default())
    }

    pub fn start_with_limits(
        &self,
        inputs: Vec<Val>,
        limits: ResourceLimits,
    ) -> Result<Progress, InputError> {
        let expected = self.compiled.inputs.len();
        if inputs.len() != expected {
            return Err(InputError::CountMismatch {
                expected,
                received: inputs.len(),
            });
        }
        for (index, input) in inputs.iter().enumerate() {
            limits
                .check_value(input)
                .map_err(|message| InputError::LimitExceeded { index, message })?;
        }
        tracing::debug!(script = %self.script_name(), "starting run");
        Ok(drive(VM::new(Arc::clone(&self.compiled), inputs, limits)))
    }

    /// Run a script that makes no external calls
    pub fn run_to_completion(&self, inputs: Vec<Val>) -> Result<Val, EngineError> {
        match self.start(inputs)? {
            Progress::Completed(value) => Ok(value),
            Progress::Failed(fault) => Err(EngineError::Fault(fault)),
            Progress::CallRequested { call, .. } => Err(EngineError::Suspended {
                function_name: call.function_name,
            }),
            Progress::BatchRequested { snapshot, .. } => Err(EngineError::Suspended {
                function_name: snapshot
                    .pending_calls()
                    .first()
                    .map(|c| c.function_name.clone())
                    .unwrap_or_default(),
            }),
        }
    }

    /// Serialize the compiled program, inputs and externals included
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        format::encode(ArtifactKind::Program, self)
    }

    pub fn load(bytes: &[u8]) -> Result<Self, DecodeError> {
        format::decode(ArtifactKind::Program, bytes)
    }
}

fn syntax_error(script_name: &str, err: &ParseError) -> CompileError {
    let (line, column) = err
        .span()
        .map(|s| (s.start_line + 1, s.start_col + 1))
        .unwrap_or((1, 1));
    CompileError::Syntax {
        script_name: script_name.to_string(),
        message: err.message().to_string(),
        line,
        column,
    }
}
