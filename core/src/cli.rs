use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::adapter::{Engine, ProgressKind, ProgressResult};
use crate::config::Config;
use crate::program::Program;

#[derive(Parser)]
#[command(name = "stasis")]
#[command(about = "Stasis - run scripts that suspend at external calls", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a script and print diagnostics
    Check {
        /// Script source file
        script: PathBuf,

        #[command(flatten)]
        declarations: Declarations,
    },

    /// Compile a script into a program file
    Compile {
        /// Script source file
        script: PathBuf,

        #[command(flatten)]
        declarations: Declarations,

        /// Output path for the compiled program
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },

    /// Start a run of a compiled program
    Start {
        /// Program file written by `compile`
        program: PathBuf,

        /// Input values as a JSON array
        #[arg(long, default_value = "[]")]
        inputs: String,

        /// Where to write the snapshot if the run suspends
        #[arg(long, default_value = "snapshot.stsn")]
        snapshot_out: PathBuf,
    },

    /// Resume a snapshot waiting on a single call
    Resume {
        /// Snapshot file
        snapshot: PathBuf,

        /// Id of the call being answered
        #[arg(long)]
        call_id: u32,

        /// Call result as JSON
        #[arg(long, conflicts_with = "error")]
        result: Option<String>,

        /// Failure message for the call; with neither flag the call is deferred
        #[arg(long)]
        error: Option<String>,

        /// Where to write the next snapshot if the run suspends again; must
        /// differ from the snapshot being resumed
        #[arg(long)]
        snapshot_out: PathBuf,
    },

    /// Resume a future snapshot with results for every pending call
    ResumeBatch {
        /// Future snapshot file
        snapshot: PathBuf,

        /// JSON array of {"call_id": n, "result": v} or {"call_id": n, "error": "msg"}
        #[arg(long)]
        results: String,

        /// Where to write the next snapshot if the run suspends again; must
        /// differ from the snapshot being resumed
        #[arg(long)]
        snapshot_out: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct Declarations {
    /// Declared input name (repeatable, in order)
    #[arg(long = "input")]
    pub inputs: Vec<String>,

    /// Declared external function name (repeatable)
    #[arg(long = "external")]
    pub externals: Vec<String>,
}

impl Declarations {
    fn inputs(&self) -> Vec<&str> {
        self.inputs.iter().map(String::as_str).collect()
    }

    fn externals(&self) -> Vec<&str> {
        self.externals.iter().map(String::as_str).collect()
    }
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments (for embedders that need to filter args)
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

/// Internal function that handles CLI commands
fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration up front so errors surface before any command output
    let config = Config::builder().config_path(cli.config.clone()).build()?;
    let mut engine = Engine::with_limits(config.limits);

    match cli.command {
        Commands::Check {
            script,
            declarations,
        } => {
            let source = read_source(&script)?;
            let name = script_name(&script);
            match Program::check(
                &source,
                &name,
                &declarations.inputs(),
                &declarations.externals(),
            ) {
                Ok(checked) => {
                    for warning in &checked.warnings {
                        println!("{}: {}", name, warning);
                    }
                    println!("{}: ok ({} warning(s))", name, checked.warnings.len());
                }
                Err(err) => bail!(err),
            }
        }

        Commands::Compile {
            script,
            declarations,
            output,
        } => {
            let source = read_source(&script)?;
            let name = script_name(&script);
            let run = engine.run_new(
                &source,
                &name,
                &declarations.inputs(),
                &declarations.externals(),
            )?;
            let bytes = engine.run_dump(run)?;
            fs::write(&output, bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Compiled {} -> {}", script.display(), output.display());
        }

        Commands::Start {
            program,
            inputs,
            snapshot_out,
        } => {
            ensure_distinct(&program, &snapshot_out)?;
            let run = engine.run_load(&read_bytes(&program)?)?;
            let result = engine.run_start(run, &inputs)?;
            emit(&engine, &result, &snapshot_out)?;
        }

        Commands::Resume {
            snapshot,
            call_id,
            result,
            error,
            snapshot_out,
        } => {
            ensure_distinct(&snapshot, &snapshot_out)?;
            let handle = engine.snapshot_load(&read_bytes(&snapshot)?)?;
            let progress =
                engine.snapshot_resume(handle, call_id, result.as_deref(), error.as_deref())?;
            emit(&engine, &progress, &snapshot_out)?;
        }

        Commands::ResumeBatch {
            snapshot,
            results,
            snapshot_out,
        } => {
            ensure_distinct(&snapshot, &snapshot_out)?;
            let handle = engine.future_snapshot_load(&read_bytes(&snapshot)?)?;
            let progress = engine.future_snapshot_resume(handle, &results)?;
            emit(&engine, &progress, &snapshot_out)?;
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Refuse an output path that names the file being read
fn ensure_distinct(input: &Path, output: &Path) -> Result<()> {
    if let (Ok(input), Ok(output)) = (fs::canonicalize(input), fs::canonicalize(output)) {
        if input == output {
            bail!(
                "--snapshot-out {} is the file being read; choose another path",
                output.display()
            );
        }
    }
    Ok(())
}

fn script_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print progress as JSON, writing any new snapshot to `snapshot_out`
fn emit(engine: &Engine, result: &ProgressResult, snapshot_out: &Path) -> Result<()> {
    let mut output = serde_json::to_value(result)?;

    let bytes = match (result.kind, result.snapshot, result.future_snapshot) {
        (ProgressKind::FunctionCall | ProgressKind::OsCall, Some(handle), _) => {
            Some(engine.snapshot_dump(handle)?)
        }
        (ProgressKind::ResolveFutures, _, Some(handle)) => {
            Some(engine.future_snapshot_dump(handle)?)
        }
        _ => None,
    };
    if let Some(bytes) = bytes {
        fs::write(snapshot_out, bytes)
            .with_context(|| format!("Failed to write {}", snapshot_out.display()))?;
        if let Some(fields) = output.as_object_mut() {
            fields.insert(
                "snapshot_path".to_string(),
                serde_json::Value::String(snapshot_out.display().to_string()),
            );
        }
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
