/// Stasis CLI
///
/// Compiles scripts, starts runs and resumes stored snapshots from the shell.
/// Progress is printed as JSON; snapshots are written to files.
use stasis_core::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
