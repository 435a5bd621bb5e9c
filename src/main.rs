//! Main entry point for the zipdirs CLI application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use zipdirs::{charset, run_batch, Cli, TerminalPrompt};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    // A single line on stderr and status 1 for any aborted job.
    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr so they never mix with progress on stdout.
fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.to_config();
    let transcoder = charset::select(&config.charset)?;

    run_batch(&cli.directories, &config, transcoder.as_ref(), &mut TerminalPrompt)?;

    Ok(())
}
