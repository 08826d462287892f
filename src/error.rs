use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DebuggerError>;

/// Every failure the debugger client can report to the editor.
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// The length-prefixed stream is out of sync or ended early.
    #[error("Framing error: {0}")]
    FramingError(String),

    /// A block arrived intact but is not a well-formed DBGp document.
    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Protocol error: expected `{expected}` response, got `{actual}`")]
    ProtocolError { expected: String, actual: String },

    #[error("Protocol error: expected transaction id {expected}, got {actual}")]
    TransactionMismatch { expected: u32, actual: u32 },

    /// The engine answered with an `<error>` element.
    #[error("Engine error {code}: {message}")]
    EngineError { code: u32, message: String },

    #[error("Failed to listen on {addr}: {source}")]
    BindError {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?} waiting for the debug engine to connect")]
    AcceptTimeout(Duration),

    #[error("Init command `{command}` failed: {reason}")]
    InitCommandError { command: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("phpdebug is not started")]
    NotStarted,

    #[error("phpdebug already started")]
    AlreadyStarted,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Session is unusable after an earlier failure ({0}); stop and start again")]
    SessionBroken(String),

    #[error("Close failed: {}", .0.join("; "))]
    CloseError(Vec<String>),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl DebuggerError {
    /// Whether the error leaves the connection out of sync with the engine.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            DebuggerError::FramingError(_) | DebuggerError::IoError(_)
        )
    }
}
