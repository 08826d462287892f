//! Editor command vocabulary and the stepping state machine.
//!
//! ```text
//! NotStarted --start/s/n/c--> Started --step--> Broken --c--> Running
//!                                                  ^             |
//!                                                  +---break-----+--stopping--> Stopped
//! ```
//!
//! Every step chains `stack_get` and `source` so the editor lands on the new line and
//! the text of that line is cached for the opportunistic eval on the next step.

use crate::config::Config;
use crate::debugger::editor::Editor;
use crate::debugger::render::{render_breakpoints, render_properties, render_stack, summarize_breakpoints};
use crate::debugger::session::Session;
use crate::protocol::{Command, Response};
use crate::runtime::launcher::LaunchReports;
use crate::{DebuggerError, Result};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerState {
    NotStarted,
    Started,
    Broken,
    Running,
    Stopped,
}

impl fmt::Display for DebuggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DebuggerState::NotStarted => "not started",
            DebuggerState::Started => "started",
            DebuggerState::Broken => "break",
            DebuggerState::Running => "running",
            DebuggerState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Commands accepted from the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    Start,
    Stop,
    StepInto,
    StepOver,
    StepOut,
    Continue,
    BreakHere,
    ListBreakpoints,
    Eval(String),
    /// Any other verb, sent as-is with optional `-<flag> <value>` pairs.
    Raw(Command),
}

impl EditorCommand {
    pub fn parse(args: &[&str]) -> Result<Self> {
        let Some((&verb, rest)) = args.split_first() else {
            return Err(DebuggerError::InvalidCommand("empty command".to_string()));
        };

        let cmd = match verb {
            "start" => EditorCommand::Start,
            "stop" => EditorCommand::Stop,
            "s" => EditorCommand::StepInto,
            "n" => EditorCommand::StepOver,
            "so" => EditorCommand::StepOut,
            "c" => EditorCommand::Continue,
            "b" => EditorCommand::BreakHere,
            "bl" => EditorCommand::ListBreakpoints,
            "e" => {
                if rest.is_empty() {
                    return Err(DebuggerError::InvalidCommand(
                        "e needs an expression".to_string(),
                    ));
                }
                return Ok(EditorCommand::Eval(rest.join(" ")));
            }
            other => return Ok(EditorCommand::Raw(raw_command(other, rest)?)),
        };

        if !rest.is_empty() {
            return Err(DebuggerError::InvalidCommand(format!(
                "{} takes no arguments",
                verb
            )));
        }
        Ok(cmd)
    }

    /// `s`, `n` and `c` start a session on their own.
    fn auto_starts(&self) -> bool {
        matches!(
            self,
            EditorCommand::StepInto | EditorCommand::StepOver | EditorCommand::Continue
        )
    }
}

fn raw_command(verb: &str, rest: &[&str]) -> Result<Command> {
    let mut command = Command::new(verb);
    for pair in rest.chunks(2) {
        let flag = match pair {
            [flag, _] => flag
                .strip_prefix('-')
                .and_then(|f| {
                    let mut chars = f.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => None,
                    }
                }),
            _ => None,
        };
        match (flag, pair) {
            (Some(flag), [_, value]) => command = command.arg(flag, *value),
            _ => {
                return Err(DebuggerError::InvalidCommand(format!(
                    "{}: arguments must be `-<flag> <value>` pairs",
                    verb
                )))
            }
        }
    }
    Ok(command)
}

/// Left-hand side of a simple `$var = ...;` line, the target of the opportunistic eval.
pub fn assignment_target(line: &str) -> Option<&str> {
    let line = line.trim();
    if !(line.starts_with('$') && line.contains(" = ") && line.ends_with(';')) {
        return None;
    }
    line.split(" = ").next().map(str::trim)
}

/// Owns at most one [`Session`] and reflects its state into an [`Editor`].
pub struct Debugger<E: Editor> {
    config: Config,
    editor: E,
    session: Option<Session>,
    state: DebuggerState,
    cancel: CancellationToken,
    reports_tx: LaunchReports,
    reports_rx: mpsc::UnboundedReceiver<DebuggerError>,
}

impl<E: Editor> Debugger<E> {
    pub fn new(config: Config, editor: E) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        Self {
            config,
            editor,
            session: None,
            state: DebuggerState::NotStarted,
            cancel: CancellationToken::new(),
            reports_tx,
            reports_rx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> DebuggerState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Token that aborts whatever the current session is blocked on. Cancelling it
    /// leaves the session broken; `stop` then `start` recovers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one editor command line and report any failure through [`Editor::error`].
    pub async fn execute(&mut self, line: &str) -> Result<()> {
        let args: Vec<&str> = line.split_whitespace().collect();
        let result = self.process_command(&args).await;
        self.report_launch_failures();
        if let Err(e) = &result {
            error!(command = line, error = %e, "command failed");
            self.editor.error(e);
        }
        result
    }

    pub async fn process_command(&mut self, args: &[&str]) -> Result<()> {
        let mut command = EditorCommand::parse(args)?;

        if self.session.is_none() && command.auto_starts() {
            command = EditorCommand::Start;
        }
        if self.session.is_none() && command != EditorCommand::Start {
            return Err(DebuggerError::NotStarted);
        }

        match command {
            EditorCommand::Start => self.start().await,
            EditorCommand::Stop => self.stop().await,
            EditorCommand::StepInto => self.step(Command::step_into()).await,
            EditorCommand::StepOver => self.step(Command::step_over()).await,
            EditorCommand::StepOut => self.step(Command::step_out()).await,
            EditorCommand::Continue => self.run().await,
            EditorCommand::BreakHere => self.break_here().await,
            EditorCommand::ListBreakpoints => self.list_breakpoints().await,
            EditorCommand::Eval(expr) => self.eval(&expr).await,
            EditorCommand::Raw(raw) => self.raw(raw).await,
        }
    }

    async fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(DebuggerError::AlreadyStarted);
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        let pending =
            Session::listen(&self.config, self.cancel.clone(), self.reports_tx.clone()).await?;
        self.editor
            .message(&format!("waiting on {}", pending.local_addr()));
        let session = pending.accept().await?;

        self.session = Some(session);
        self.state = DebuggerState::Started;
        self.editor
            .message("started. c-run so-step_out s-step_in n-step_over stop-exit");

        self.step(Command::step_into()).await
    }

    async fn stop(&mut self) -> Result<()> {
        let mut session = self.session.take().ok_or(DebuggerError::NotStarted)?;
        self.state = DebuggerState::Stopped;
        session.close().await?;
        self.editor.message("debugger stopped");
        Ok(())
    }

    /// The engine reported `stopping`/`stopped`: tear the session down.
    async fn finish(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!(error = %e, "close after script end");
            }
        }
        self.state = DebuggerState::Stopped;
        self.editor.message("debugger stopped. start to debug again");
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(DebuggerError::NotStarted)
    }

    async fn step(&mut self, command: Command) -> Result<()> {
        let resp = self.session_mut()?.send(&command).await?;
        if resp.is_finished() {
            self.finish().await;
            return Ok(());
        }
        let resp = resp.into_result()?;
        if let Some(location) = &resp.message {
            self.session_mut()?
                .set_location(location.filename.clone(), location.line);
        }
        self.state = DebuggerState::Broken;

        self.opportunistic_eval().await;
        self.refresh_location().await
    }

    async fn run(&mut self) -> Result<()> {
        self.state = DebuggerState::Running;
        let resp = match self.session_mut()?.send(&Command::run()).await {
            Ok(resp) => resp,
            Err(e) => {
                self.state = DebuggerState::Broken;
                return Err(e);
            }
        };

        if resp.is_finished() {
            self.finish().await;
            return Ok(());
        }

        let resp = resp.into_result();
        self.state = DebuggerState::Broken;
        let resp = resp?;
        if resp.is_break() {
            if let Some(location) = &resp.message {
                self.session_mut()?
                    .set_location(location.filename.clone(), location.line);
            }
            self.refresh_location().await?;
        }

        self.editor.message(&format!(
            "run: {} {}",
            display_or_dash(resp.status),
            display_or_dash(resp.reason)
        ));
        Ok(())
    }

    /// `stack_get` then `source`: move the editor to the stop location and cache the
    /// text of that line.
    async fn refresh_location(&mut self) -> Result<()> {
        let stack = self
            .session_mut()?
            .send(&Command::stack_get())
            .await?
            .into_result()?;
        info!("\n{}", render_stack(&stack.stack, &self.config));
        let session = self.session_mut()?;
        if let Some(top) = stack.stack.iter().min_by_key(|f| f.level) {
            session.set_location(top.filename.clone(), top.line);
        }
        if session.current_file().is_empty() {
            return Err(DebuggerError::DecodeError(
                "stop event carried no file location".to_string(),
            ));
        }

        self.jump_to_file();

        let session = self.session_mut()?;
        let file = session.current_file().to_string();
        let source = session
            .send(&Command::source(&file))
            .await?
            .into_result()?;
        let text = source.decoded_text()?;
        session.cache_source_line(&text);
        debug!(line = session.last_source_line(), "cached source line");
        Ok(())
    }

    fn jump_to_file(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let file = self.config.strip_base_path(session.current_file()).to_string();
        let line = session.current_line();
        info!(file = %file, line, "open");
        self.editor.open_file(&file);
        self.editor.goto_line(line);
    }

    /// Show the value just assigned by the previous line, when it was a plain
    /// `$var = ...;`. Failures are only logged.
    async fn opportunistic_eval(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(target) = assignment_target(session.last_source_line()).map(str::to_string)
        else {
            return;
        };

        match session
            .send(&Command::eval_export(&target))
            .await
            .and_then(Response::into_result)
        {
            Ok(resp) => {
                let rendered = render_properties(&resp.properties);
                info!(expr = %target, "\n{}", rendered);
                self.editor
                    .message(&format!("=== {} ===\n{}", target, rendered));
            }
            Err(e) => warn!(expr = %target, error = %e, "opportunistic eval failed"),
        }
    }

    async fn break_here(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        if session.current_file().is_empty() {
            return Err(DebuggerError::InvalidCommand(
                "no current location to set a breakpoint at".to_string(),
            ));
        }
        let file = session.current_file().to_string();
        let line = session.current_line();

        let resp = session
            .send(&Command::breakpoint_set_line(&file, line))
            .await?
            .into_result()?;
        let shown = self.config.strip_base_path(&file).to_string();
        self.editor.message(&format!(
            "breakpoint {} set at {}:{}",
            resp.id.as_deref().unwrap_or("?"),
            shown,
            line
        ));

        self.list_breakpoints().await
    }

    async fn list_breakpoints(&mut self) -> Result<()> {
        let resp = self
            .session_mut()?
            .send(&Command::breakpoint_list())
            .await?
            .into_result()?;
        info!("\n{}", render_breakpoints(&resp.breakpoints, &self.config));
        let summary = summarize_breakpoints(&resp.breakpoints, &self.config);
        self.editor.message(&summary);
        Ok(())
    }

    async fn eval(&mut self, expr: &str) -> Result<()> {
        let resp = self
            .session_mut()?
            .send(&Command::eval_export(expr))
            .await?
            .into_result()?;
        let rendered = if resp.properties.is_empty() {
            "(no value)".to_string()
        } else {
            render_properties(&resp.properties)
        };
        info!(expr, "eval\n{}", rendered);
        self.editor.message(&format!("{} =\n{}", expr, rendered));
        Ok(())
    }

    async fn raw(&mut self, command: Command) -> Result<()> {
        let resp = self.session_mut()?.send(&command).await?;
        if resp.is_finished() {
            self.finish().await;
            return Ok(());
        }
        let resp = resp.into_result()?;
        debug!(response = ?resp, "raw command");
        self.editor.message(&format!(
            "{}: {} {}",
            resp.command,
            display_or_dash(resp.status),
            display_or_dash(resp.reason)
        ));
        Ok(())
    }

    fn report_launch_failures(&mut self) {
        while let Ok(e) = self.reports_rx.try_recv() {
            self.editor.error(&e);
        }
    }
}

fn display_or_dash<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
