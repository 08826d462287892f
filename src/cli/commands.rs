use crate::cli::terminal::TerminalEditor;
use crate::cli::{ConfigArgs, InteractiveArgs, Verbosity};
use crate::config::Config;
use crate::debugger::Debugger;
use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::{info, warn};

const PROMPT: &str = "(dbgp) ";

const HELP: &str = "\
start        listen for the engine, set breakpoints, break on the first line
stop         close the session
s / n / so   step into / over / out (s, n and c start a session if needed)
c            continue to the next breakpoint
b            set a breakpoint at the current line
bl           list breakpoints
e <expr>     evaluate var_export(<expr>, TRUE)
<verb> ...   send any other DBGp command, e.g. `property_get -n $x`
help         this text
quit         close the session and exit";

/// Load the config file and apply command-line overrides.
pub fn resolve_config(args: &ConfigArgs) -> crate::Result<Config> {
    let mut config = Config::load(&args.config)?;
    if let Some(listen) = &args.listen {
        config.listen = listen.clone();
    }
    if let Some(secs) = args.accept_timeout {
        config.accept_timeout_secs = secs;
    }
    Ok(config)
}

pub fn show_config(args: ConfigArgs, _verbosity: Verbosity) -> Result<()> {
    let config = resolve_config(&args)?;
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dbgp-debug").join("history.txt"))
}

pub fn interactive(args: InteractiveArgs, verbosity: Verbosity) -> Result<()> {
    let config = resolve_config(&args.config)?;
    info!(listen = %config.listen, breakpoints = config.breakpoints.len(), "interactive session");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let root = std::env::current_dir().context("Failed to read current directory")?;
    let mut debugger = Debugger::new(config, TerminalEditor::new(root));

    let mut prompt = DefaultEditor::new().context("Failed to initialise line editor")?;
    let history = if args.no_history { None } else { history_path() };
    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).ok();
        }
        if prompt.load_history(path).is_err() && verbosity != Verbosity::Quiet {
            println!("No previous history.");
        }
    }

    if verbosity != Verbosity::Quiet {
        println!("{}", "Type `help` for commands, `start` to begin.".dimmed());
    }

    loop {
        let line = match prompt.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read command"),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = prompt.add_history_entry(line);

        match line {
            "quit" | "exit" | "q" => break,
            "help" | "h" | "?" => {
                println!("{}", HELP);
                continue;
            }
            _ => {}
        }

        runtime.block_on(async {
            let cancel = debugger.cancel_token();
            let run = debugger.execute(line);
            tokio::pin!(run);
            tokio::select! {
                _ = &mut run => {}
                _ = tokio::signal::ctrl_c() => {
                    cancel.cancel();
                    let _ = run.await;
                }
            }
        });
    }

    if debugger.is_started() {
        let _ = runtime.block_on(debugger.execute("stop"));
    }

    if let Some(path) = &history {
        if let Err(e) = prompt.save_history(path) {
            warn!(error = %e, "could not save history");
        }
    }

    Ok(())
}
