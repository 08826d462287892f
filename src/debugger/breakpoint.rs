use crate::protocol::Command;
use crate::{DebuggerError, Result};
use std::fmt;
use std::str::FromStr;

/// A line breakpoint declared in the configuration as `"<file> <line>"`.
///
/// The engine assigns the id when the breakpoint is set; it is not tracked here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBreakpoint {
    /// Path relative to the configured base path.
    pub file: String,
    pub line: u32,
}

impl LineBreakpoint {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// `breakpoint_set -t line -f <base_path><file> -n <line>`
    pub fn to_command(&self, base_path: &str) -> Command {
        Command::breakpoint_set_line(&format!("{}{}", base_path, self.file), self.line)
    }
}

impl fmt::Display for LineBreakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

impl FromStr for LineBreakpoint {
    type Err = DebuggerError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(file), Some(line), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DebuggerError::ConfigError(format!(
                "breakpoint {:?} must look like \"<file> <line>\"",
                s
            )));
        };

        let line = line
            .parse::<u32>()
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| {
                DebuggerError::ConfigError(format!(
                    "breakpoint {:?} has an invalid line number",
                    s
                ))
            })?;

        Ok(Self::new(file, line))
    }
}
