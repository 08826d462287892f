//! Command-line interface for `dbgp-debug`.

pub mod commands;
pub mod terminal;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dbgp-debug", version, about = "DBGp (Xdebug) remote debugger client")]
pub struct Cli {
    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "DBGP_DEBUG_LOG")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read debugger commands from a prompt and drive a session
    Interactive(InteractiveArgs),

    /// Print the resolved configuration
    ShowConfig(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// YAML configuration file
    #[arg(short, long, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Address to listen on for the debug engine (overrides the config file)
    #[arg(long)]
    pub listen: Option<String>,

    /// Seconds to wait for the engine to connect (overrides the config file)
    #[arg(long)]
    pub accept_timeout: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct InteractiveArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Do not load or save prompt history
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    pub fn to_log_level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "info",
            Verbosity::Debug => "debug",
        }
    }
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        match (self.quiet, self.verbose) {
            (true, _) => Verbosity::Quiet,
            (false, 0) => Verbosity::Normal,
            (false, 1) => Verbosity::Verbose,
            (false, _) => Verbosity::Debug,
        }
    }
}
