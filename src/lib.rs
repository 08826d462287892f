//! A DBGp remote debugger client.
//!
//! The client listens for a debug engine (typically PHP with Xdebug), speaks the
//! DBGp wire protocol over the accepted TCP connection and reflects every stop
//! event into a host editor through the [`debugger::Editor`] capability.

pub mod cli;
pub mod config;
pub mod debugger;
pub mod error;
pub mod protocol;
pub mod runtime;

pub use config::Config;
pub use debugger::{Debugger, DebuggerState, Editor, Session};
pub use error::{DebuggerError, Result};
