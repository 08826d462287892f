//! One debug run: the listening socket, the accepted engine connection and the
//! per-run protocol state.
//!
//! DBGp is strictly request/response on a single connection, so [`Session::send`]
//! is the only synchronization point: it writes one command and blocks until the
//! matching reply block has been read and decoded.

use crate::config::Config;
use crate::debugger::breakpoint::LineBreakpoint;
use crate::protocol::{read_block, unmarshal, unmarshal_init, write_block, Command, Init, Response};
use crate::runtime::launcher::{spawn_init_command, LaunchReports};
use crate::{DebuggerError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
}

impl Connection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
            peer,
        }
    }

    async fn exchange(&mut self, wire: &[u8]) -> Result<Response> {
        write_block(&mut self.writer, wire).await?;
        let block = read_block(&mut self.reader).await?;
        debug!(block = %String::from_utf8_lossy(&block).trim_end_matches('\0'), "recv");
        unmarshal(&block)
    }
}

/// A bound listener waiting for the engine to connect.
pub struct PendingSession {
    listener: TcpListener,
    local_addr: SocketAddr,
    accept_timeout: Duration,
    replay: Vec<(LineBreakpoint, Command)>,
    cancel: CancellationToken,
}

impl PendingSession {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept exactly one engine connection within the accept deadline, read its
    /// `<init>` packet and replay the configured breakpoints.
    pub async fn accept(self) -> Result<Session> {
        info!(addr = %self.local_addr, "waiting for the debug engine to connect");

        let deadline = self.accept_timeout;
        let handshake = async {
            let (stream, peer) = self.listener.accept().await?;
            let mut conn = Connection::new(stream, peer);
            let block = read_block(&mut conn.reader).await?;
            let init = unmarshal_init(&block)?;
            Ok::<_, DebuggerError>((conn, init))
        };

        let (conn, init) = tokio::select! {
            res = tokio::time::timeout(deadline, handshake) => {
                res.map_err(|_| DebuggerError::AcceptTimeout(deadline))??
            }
            _ = self.cancel.cancelled() => {
                return Err(DebuggerError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "session start cancelled",
                )));
            }
        };

        info!(peer = %conn.peer, file = %init.file_uri, language = %init.language, "accepted");

        let mut session = Session {
            listener: Some(self.listener),
            conn: Some(conn),
            local_addr: self.local_addr,
            init,
            transaction_id: 0,
            current_file: String::new(),
            current_line: 0,
            last_source_line: String::new(),
            broken: None,
            cancel: self.cancel,
        };
        session.replay_breakpoints(&self.replay).await?;
        Ok(session)
    }
}

/// `breakpoint_set` commands for the configured breakpoints. Malformed entries
/// are logged and skipped.
fn replay_commands(config: &Config) -> Vec<(LineBreakpoint, Command)> {
    config
        .breakpoints
        .iter()
        .filter_map(|entry| match entry.parse::<LineBreakpoint>() {
            Ok(bp) => {
                let command = bp.to_command(&config.base_path);
                Some((bp, command))
            }
            Err(e) => {
                warn!(error = %e, "skipping breakpoint");
                None
            }
        })
        .collect()
}

pub struct Session {
    listener: Option<TcpListener>,
    conn: Option<Connection>,
    local_addr: SocketAddr,
    init: Init,
    transaction_id: u32,
    current_file: String,
    current_line: u32,
    last_source_line: String,
    broken: Option<String>,
    cancel: CancellationToken,
}

impl Session {
    /// Bind the IDE-side listening socket and start the configured init command in
    /// the background. The init command only ever reports through `reports`; a
    /// failure there does not stop the listener.
    pub async fn listen(
        config: &Config,
        cancel: CancellationToken,
        reports: LaunchReports,
    ) -> Result<PendingSession> {
        let listener = TcpListener::bind(&config.listen)
            .await
            .map_err(|source| DebuggerError::BindError {
                addr: config.listen.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "listening for DBGp connections");

        if let Some(command) = config.init_command() {
            spawn_init_command(command, reports);
        }

        Ok(PendingSession {
            listener,
            local_addr,
            accept_timeout: config.accept_timeout(),
            replay: replay_commands(config),
            cancel,
        })
    }

    /// [`Session::listen`] followed by [`PendingSession::accept`].
    pub async fn start(
        config: &Config,
        cancel: CancellationToken,
        reports: LaunchReports,
    ) -> Result<Self> {
        Self::listen(config, cancel, reports).await?.accept().await
    }

    /// Send one command with the next transaction id and wait for its reply.
    ///
    /// The reply must echo the command verb and, when present, the transaction id.
    /// A framing or I/O failure leaves the session unusable.
    pub async fn send(&mut self, command: &Command) -> Result<Response> {
        if let Some(reason) = &self.broken {
            return Err(DebuggerError::SessionBroken(reason.clone()));
        }
        let conn = self.conn.as_mut().ok_or(DebuggerError::NotStarted)?;

        let transaction_id = self.transaction_id;
        let next = transaction_id.checked_add(1).ok_or_else(|| {
            DebuggerError::SessionBroken("transaction ids exhausted".to_string())
        })?;
        let wire = command.encode(transaction_id)?;
        self.transaction_id = next;
        debug!(transaction_id, command = %command, "send");

        let result = tokio::select! {
            res = conn.exchange(wire.as_bytes()) => res,
            _ = self.cancel.cancelled() => Err(DebuggerError::IoError(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "request cancelled",
            ))),
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if e.is_connection_fatal() {
                    warn!(error = %e, "connection lost");
                    self.broken = Some(e.to_string());
                    self.conn = None;
                }
                return Err(e);
            }
        };

        if response.command != command.verb() {
            return Err(DebuggerError::ProtocolError {
                expected: command.verb().to_string(),
                actual: response.command,
            });
        }
        if let Some(actual) = response.transaction_id {
            if actual != transaction_id {
                return Err(DebuggerError::TransactionMismatch {
                    expected: transaction_id,
                    actual,
                });
            }
        }

        Ok(response)
    }

    /// Set every configured breakpoint. Engine refusals are logged and skipped;
    /// only a dead connection aborts the replay.
    async fn replay_breakpoints(&mut self, replay: &[(LineBreakpoint, Command)]) -> Result<()> {
        for (breakpoint, command) in replay {
            match self.send(command).await.and_then(Response::into_result) {
                Ok(resp) => {
                    info!(breakpoint = %breakpoint, id = resp.id.as_deref().unwrap_or("?"), "breakpoint set")
                }
                Err(e) if self.broken.is_some() => return Err(e),
                Err(e) => warn!(breakpoint = %breakpoint, error = %e, "set breakpoint failed"),
            }
        }
        Ok(())
    }

    /// Close the listener and the connection.
    ///
    /// Every failure is collected into one [`DebuggerError::CloseError`]; a second call
    /// reports both sockets as already closed.
    pub async fn close(&mut self) -> Result<()> {
        let mut errors = Vec::new();

        match self.listener.take() {
            Some(listener) => drop(listener),
            None => errors.push("listener already closed".to_string()),
        }

        match self.conn.take() {
            Some(mut conn) => match conn.writer.shutdown().await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {}
                Err(e) => errors.push(format!("connection to {}: {}", conn.peer, e)),
            },
            None if self.broken.is_some() => {}
            None => errors.push("connection already closed".to_string()),
        }

        info!(addr = %self.local_addr, "session closed");
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DebuggerError::CloseError(errors))
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn init(&self) -> &Init {
        &self.init
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Id the next request will carry.
    pub fn next_transaction_id(&self) -> u32 {
        self.transaction_id
    }

    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    pub fn set_location(&mut self, file: impl Into<String>, line: u32) {
        self.current_file = file.into();
        self.current_line = line;
    }

    /// Trimmed text of the source line at the current position.
    pub fn last_source_line(&self) -> &str {
        &self.last_source_line
    }

    /// Cache line `current_line` of `source`; out of range caches nothing.
    pub fn cache_source_line(&mut self, source: &str) {
        self.last_source_line = match self.current_line.checked_sub(1) {
            Some(index) => source
                .lines()
                .nth(index as usize)
                .map(|l| l.trim().to_string())
                .unwrap_or_default(),
            None => String::new(),
        };
    }
}
