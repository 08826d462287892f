use anyhow::{Context, Result};
use clap::Parser;
use dbgp_debugger::cli::{Cli, Commands};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| verbosity.to_log_level().into());

    // Logs go to a file when requested so they do not interleave with the prompt
    let (stderr_layer, file_layer) = match &cli.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    match cli.command {
        Commands::Interactive(args) => {
            dbgp_debugger::cli::commands::interactive(args, verbosity)?;
        }
        Commands::ShowConfig(args) => {
            dbgp_debugger::cli::commands::show_config(args, verbosity)?;
        }
    }

    Ok(())
}
