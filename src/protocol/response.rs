//! Typed views of engine replies.
//!
//! Decoding is all-or-nothing: a block either becomes a fully populated
//! [`Response`] (or [`Init`]) or a [`DebuggerError::DecodeError`].

use super::charset::decode_document;
use crate::{DebuggerError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use roxmltree::{Document, Node, ParsingOptions};
use std::fmt;
use std::str::FromStr;

/// Deepest property nesting accepted from `eval`/`property_get` replies.
pub const MAX_PROPERTY_DEPTH: usize = 64;

/// Upper bound on XML nodes in a single reply.
pub const MAX_XML_NODES: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Starting,
    Stopping,
    Stopped,
    Running,
    Break,
}

impl FromStr for Status {
    type Err = DebuggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "starting" => Ok(Status::Starting),
            "stopping" => Ok(Status::Stopping),
            "stopped" => Ok(Status::Stopped),
            "running" => Ok(Status::Running),
            "break" => Ok(Status::Break),
            other => Err(DebuggerError::DecodeError(format!(
                "unknown status {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Starting => "starting",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
            Status::Running => "running",
            Status::Break => "break",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Ok,
    Error,
    Aborted,
    Exception,
}

impl FromStr for Reason {
    type Err = DebuggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ok" => Ok(Reason::Ok),
            "error" => Ok(Reason::Error),
            "aborted" => Ok(Reason::Aborted),
            "exception" => Ok(Reason::Exception),
            other => Err(DebuggerError::DecodeError(format!(
                "unknown reason {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::Ok => "ok",
            Reason::Error => "error",
            Reason::Aborted => "aborted",
            Reason::Exception => "exception",
        };
        write!(f, "{}", s)
    }
}

/// `<error code=".."><message>..</message></error>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFault {
    pub code: u32,
    pub message: String,
}

/// Location carried by `<xdebug:message filename="" lineno=""/>` on stop events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopLocation {
    pub filename: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub level: u32,
    pub line: u32,
    pub filename: String,
    /// Function or scope label (`where` attribute).
    pub location: String,
}

/// A variable dump node. Arrays and objects nest their members in `children`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Property {
    pub kind: String,
    pub name: String,
    pub full_name: String,
    pub class_name: String,
    pub encoding: String,
    pub text: String,
    pub children: Vec<Property>,
}

impl Property {
    /// Text value with `encoding="base64"` undone.
    pub fn value(&self) -> Result<String> {
        if self.encoding == "base64" {
            let bytes = STANDARD
                .decode(self.text.trim())
                .map_err(|e| DebuggerError::DecodeError(format!("property {}: {}", self.name, e)))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(self.text.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: String,
    pub kind: String,
    pub filename: String,
    pub line: u32,
    pub state: String,
    pub hit_count: u32,
}

/// A decoded `<response>` element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub command: String,
    pub transaction_id: Option<u32>,
    pub status: Option<Status>,
    pub reason: Option<Reason>,
    pub encoding: Option<String>,
    /// Breakpoint id echoed by `breakpoint_set`.
    pub id: Option<String>,
    /// Direct text content (base64 file text for `source`).
    pub text: String,
    pub error: Option<EngineFault>,
    pub message: Option<StopLocation>,
    pub stack: Vec<StackFrame>,
    pub properties: Vec<Property>,
    pub breakpoints: Vec<Breakpoint>,
}

impl Response {
    /// Turn an engine-side `<error>` into an `Err`.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(fault) => Err(DebuggerError::EngineError {
                code: fault.code,
                message: fault.message,
            }),
            None => Ok(self),
        }
    }

    /// `status` is `stopping` or `stopped`: the script is done.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, Some(Status::Stopping) | Some(Status::Stopped))
    }

    pub fn is_break(&self) -> bool {
        self.status == Some(Status::Break)
    }

    /// Decoded `text`, for replies whose payload is base64 (`source`).
    pub fn decoded_text(&self) -> Result<String> {
        let bytes = STANDARD
            .decode(self.text.trim())
            .map_err(|e| DebuggerError::DecodeError(format!("{} payload: {}", self.command, e)))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// The `<init>` packet sent by the engine right after it connects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Init {
    pub app_id: String,
    pub ide_key: String,
    pub file_uri: String,
    pub language: String,
    pub protocol_version: String,
    pub engine: Option<String>,
}

/// Decode a `<response>` block (trailing NULs allowed).
pub fn unmarshal(block: &[u8]) -> Result<Response> {
    let text = document_text(block)?;
    let doc = parse(&text)?;
    let root = doc.root_element();
    expect_root(&root, "response")?;

    let command = root
        .attribute("command")
        .filter(|c| !c.is_empty())
        .ok_or_else(|| DebuggerError::DecodeError("response without command attribute".to_string()))?
        .to_string();

    let mut response = Response {
        command,
        transaction_id: attr_u32(&root, "transaction_id")?,
        status: root.attribute("status").map(str::parse).transpose()?,
        reason: root.attribute("reason").map(str::parse).transpose()?,
        encoding: root.attribute("encoding").map(str::to_string),
        id: root.attribute("id").map(str::to_string),
        text: direct_text(&root),
        ..Response::default()
    };

    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "error" => response.error = Some(decode_fault(&child)?),
            "message" => {
                if let Some(filename) = child.attribute("filename") {
                    response.message = Some(StopLocation {
                        filename: filename.to_string(),
                        line: attr_u32(&child, "lineno")?.unwrap_or(0),
                    });
                }
            }
            "stack" => response.stack.push(StackFrame {
                level: attr_u32(&child, "level")?.unwrap_or(0),
                line: attr_u32(&child, "lineno")?.unwrap_or(0),
                filename: attr_string(&child, "filename"),
                location: attr_string(&child, "where"),
            }),
            "property" => response.properties.push(decode_property(&child, 1)?),
            "breakpoint" => response.breakpoints.push(Breakpoint {
                id: attr_string(&child, "id"),
                kind: attr_string(&child, "type"),
                filename: attr_string(&child, "filename"),
                line: attr_u32(&child, "lineno")?.unwrap_or(0),
                state: attr_string(&child, "state"),
                hit_count: attr_u32(&child, "hit_count")?
                    .or(attr_u32(&child, "hitcount")?)
                    .unwrap_or(0),
            }),
            _ => {}
        }
    }

    Ok(response)
}

/// Decode the `<init>` announcement.
pub fn unmarshal_init(block: &[u8]) -> Result<Init> {
    let text = document_text(block)?;
    let doc = parse(&text)?;
    let root = doc.root_element();
    expect_root(&root, "init")?;

    let engine = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "engine")
        .map(|n| direct_text(&n).trim().to_string());

    Ok(Init {
        app_id: attr_string(&root, "appid"),
        ide_key: attr_string(&root, "idekey"),
        file_uri: attr_string(&root, "fileuri"),
        language: attr_string(&root, "language"),
        protocol_version: attr_string(&root, "protocol_version"),
        engine,
    })
}

fn document_text(block: &[u8]) -> Result<String> {
    let end = block
        .iter()
        .rposition(|b| *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    decode_document(&block[..end])
}

fn parse(text: &str) -> Result<Document<'_>> {
    let mut options = ParsingOptions::default();
    options.nodes_limit = MAX_XML_NODES;
    Document::parse_with_options(text, options)
        .map_err(|e| DebuggerError::DecodeError(format!("malformed XML: {}", e)))
}

fn expect_root(root: &Node<'_, '_>, name: &str) -> Result<()> {
    let actual = root.tag_name().name();
    if actual != name {
        return Err(DebuggerError::DecodeError(format!(
            "expected <{}> root element, got <{}>",
            name, actual
        )));
    }
    Ok(())
}

fn decode_fault(node: &Node<'_, '_>) -> Result<EngineFault> {
    let message = node
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "message")
        .map(|n| direct_text(&n).trim().to_string())
        .unwrap_or_default();
    Ok(EngineFault {
        code: attr_u32(node, "code")?.unwrap_or(0),
        message,
    })
}

fn decode_property(node: &Node<'_, '_>, depth: usize) -> Result<Property> {
    if depth > MAX_PROPERTY_DEPTH {
        return Err(DebuggerError::DecodeError(format!(
            "property nesting exceeds {} levels",
            MAX_PROPERTY_DEPTH
        )));
    }

    let children = node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "property")
        .map(|n| decode_property(&n, depth + 1))
        .collect::<Result<Vec<_>>>()?;

    Ok(Property {
        kind: attr_string(node, "type"),
        name: attr_string(node, "name"),
        full_name: attr_string(node, "fullname"),
        class_name: attr_string(node, "classname"),
        encoding: attr_string(node, "encoding"),
        text: direct_text(node),
        children,
    })
}

/// Text and CDATA directly under `node`. Indentation between child elements is
/// not a value.
fn direct_text(node: &Node<'_, '_>) -> String {
    let text: String = node
        .children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    if text.trim().is_empty() && node.children().any(|n| n.is_element()) {
        return String::new();
    }
    text
}

fn attr_string(node: &Node<'_, '_>, name: &str) -> String {
    node.attribute(name).unwrap_or_default().to_string()
}

fn attr_u32(node: &Node<'_, '_>, name: &str) -> Result<Option<u32>> {
    node.attribute(name)
        .map(|v| {
            v.trim().parse::<u32>().map_err(|_| {
                DebuggerError::DecodeError(format!(
                    "attribute {}={:?} on <{}> is not a number",
                    name,
                    v,
                    node.tag_name().name()
                ))
            })
        })
        .transpose()
}
