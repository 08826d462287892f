//! Outgoing DBGp commands.
//!
//! Wire syntax: `<verb> -i <transaction id> [-<flag> <value>]* [-- <base64>]` followed
//! by a single NUL. Values containing spaces, quotes or backslashes are quoted.
//! Free-form payloads (eval expressions, breakpoint conditions) travel base64 encoded
//! after `--` so they never need escaping.

use crate::{DebuggerError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;

/// A command verb with its flags and optional data payload, not yet bound to a
/// transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Vec<(char, String)>,
    data: Option<Vec<u8>>,
}

impl Command {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
            data: None,
        }
    }

    /// Append `-<flag> <value>`.
    pub fn arg(mut self, flag: char, value: impl Into<String>) -> Self {
        self.args.push((flag, value.into()));
        self
    }

    /// Attach the `-- <base64>` payload.
    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn args(&self) -> &[(char, String)] {
        &self.args
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn step_into() -> Self {
        Self::new("step_into")
    }

    pub fn step_over() -> Self {
        Self::new("step_over")
    }

    pub fn step_out() -> Self {
        Self::new("step_out")
    }

    pub fn run() -> Self {
        Self::new("run")
    }

    pub fn stack_get() -> Self {
        Self::new("stack_get")
    }

    pub fn source(file: &str) -> Self {
        Self::new("source").arg('f', file)
    }

    pub fn breakpoint_set_line(file: &str, line: u32) -> Self {
        Self::new("breakpoint_set")
            .arg('t', "line")
            .arg('f', file)
            .arg('n', line.to_string())
    }

    pub fn breakpoint_list() -> Self {
        Self::new("breakpoint_list")
    }

    /// `eval` of `var_export(<expr>, TRUE)`, which renders any PHP value as a string.
    pub fn eval_export(expr: &str) -> Self {
        Self::new("eval").data(format!("var_export({}, TRUE)", expr))
    }

    /// Serialize with the given transaction id, NUL terminator included.
    pub fn encode(&self, transaction_id: u32) -> Result<String> {
        let args: Vec<(char, &str)> = self
            .args
            .iter()
            .map(|(flag, value)| (*flag, value.as_str()))
            .collect();
        marshal(&self.verb, transaction_id, &args, self.data.as_deref())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb)?;
        for (flag, value) in &self.args {
            write!(f, " -{} {}", flag, quote(value))?;
        }
        if let Some(data) = &self.data {
            write!(f, " -- <{} bytes>", data.len())?;
        }
        Ok(())
    }
}

/// Build the NUL-terminated wire form of a command.
pub fn marshal(
    verb: &str,
    transaction_id: u32,
    args: &[(char, &str)],
    data: Option<&[u8]>,
) -> Result<String> {
    if verb.is_empty() || verb.chars().any(|c| c.is_whitespace() || c == '\0') {
        return Err(DebuggerError::InvalidCommand(format!(
            "invalid command verb {:?}",
            verb
        )));
    }

    let mut out = format!("{} -i {}", verb, transaction_id);
    for (flag, value) in args {
        if !flag.is_ascii_alphabetic() || *flag == 'i' {
            return Err(DebuggerError::InvalidCommand(format!(
                "invalid flag -{} for {}",
                flag, verb
            )));
        }
        if value.contains('\0') {
            return Err(DebuggerError::InvalidCommand(format!(
                "value of -{} contains a NUL byte",
                flag
            )));
        }
        out.push_str(&format!(" -{} {}", flag, quote(value)));
    }

    if let Some(data) = data {
        out.push_str(" -- ");
        out.push_str(&STANDARD.encode(data));
    }

    out.push('\0');
    Ok(out)
}

fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
