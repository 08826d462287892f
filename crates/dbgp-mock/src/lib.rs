//! A scripted fake DBGp engine.
//!
//! [`MockEngine`] plays the Xdebug side of a debug session: it connects to the
//! IDE's listening port, announces itself with an `<init>` packet and then lets a
//! test read each incoming command and answer it with a [`Reply`].
//!
//! ```no_run
//! # async fn demo(addr: std::net::SocketAddr) -> dbgp_mock::Result<()> {
//! use dbgp_mock::{MockEngine, Reply};
//!
//! let mut engine = MockEngine::connect(addr, "file:///srv/app.php").await?;
//! let cmd = engine.expect("step_into").await?;
//! engine
//!     .reply(&cmd, Reply::new().status("break", "ok").location("file:///srv/app.php", 3))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MockError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed command {0:?}")]
    Parse(String),

    #[error("expected `{expected}` command, got `{actual}`")]
    Unexpected { expected: String, actual: String },

    #[error("IDE closed the connection")]
    Closed,

    #[error("could not connect to {0} in time")]
    ConnectTimeout(SocketAddr),
}

pub type Result<T> = std::result::Result<T, MockError>;

/// A command as received from the IDE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCommand {
    pub verb: String,
    pub transaction_id: u32,
    pub args: Vec<(char, String)>,
    pub data: Option<Vec<u8>>,
}

impl ReceivedCommand {
    pub fn arg(&self, flag: char) -> Option<&str> {
        self.args
            .iter()
            .find(|(f, _)| *f == flag)
            .map(|(_, v)| v.as_str())
    }

    /// The `--` payload decoded as text.
    pub fn data_str(&self) -> Option<String> {
        self.data
            .as_ref()
            .map(|d| String::from_utf8_lossy(d).into_owned())
    }
}

/// Parse `<verb> -i <id> [-x value]* [-- base64]`, with or without the trailing NUL.
pub fn parse_command(wire: &str) -> Result<ReceivedCommand> {
    let wire = wire.trim_end_matches('\0');
    let bad = || MockError::Parse(wire.to_string());

    let mut tokens = tokenize(wire).ok_or_else(bad)?.into_iter();
    let (verb, _) = tokens.next().ok_or_else(bad)?;

    let mut transaction_id = None;
    let mut args = Vec::new();
    let mut data = None;
    while let Some((token, quoted)) = tokens.next() {
        if token == "--" && !quoted {
            let encoded = tokens.next().map(|(e, _)| e).unwrap_or_default();
            data = Some(STANDARD.decode(encoded).map_err(|_| bad())?);
            if tokens.next().is_some() {
                return Err(bad());
            }
            break;
        }
        let flag = token
            .strip_prefix('-')
            .filter(|f| f.chars().count() == 1 && !quoted)
            .and_then(|f| f.chars().next())
            .ok_or_else(bad)?;
        let (value, _) = tokens.next().ok_or_else(bad)?;
        if flag == 'i' {
            transaction_id = Some(value.parse::<u32>().map_err(|_| bad())?);
        } else {
            args.push((flag, value));
        }
    }

    Ok(ReceivedCommand {
        verb,
        transaction_id: transaction_id.ok_or_else(bad)?,
        args,
        data,
    })
}

/// Split on spaces, honouring `"..."` with `\"` and `\\` escapes. Each token
/// records whether it was quoted.
fn tokenize(input: &str) -> Option<Vec<(String, bool)>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            return Some(tokens);
        };

        let mut token = String::new();
        let quoted = first == '"';
        if quoted {
            chars.next();
            loop {
                match chars.next()? {
                    '\\' => token.push(chars.next()?),
                    '"' => break,
                    c => token.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ' ' {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push((token, quoted));
    }
}

/// Wrap an XML document in the engine's framing: `<len> NUL <xml> NUL`.
pub fn frame(xml: &str) -> Vec<u8> {
    let body = latin1(xml);
    let mut out = body.len().to_string().into_bytes();
    out.push(0);
    out.extend_from_slice(&body);
    out.push(0);
    out
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"iso-8859-1\"?>\n";
const NAMESPACES: &str =
    "xmlns=\"urn:debugger_protocol_v1\" xmlns:xdebug=\"https://xdebug.org/dbgp/xdebug\"";

pub fn init_packet(file_uri: &str) -> String {
    format!(
        "{XML_HEADER}<init {NAMESPACES} fileuri=\"{}\" language=\"PHP\" xdebug:language_version=\"8.2.0\" protocol_version=\"1.0\" appid=\"4242\" idekey=\"mock\"><engine version=\"3.2.0\"><![CDATA[Xdebug]]></engine></init>",
        escape(file_uri)
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Builder for a `<response>` document.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    command: Option<String>,
    transaction_id: Option<Option<u32>>,
    attrs: Vec<(String, String)>,
    body: String,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(self, status: &str, reason: &str) -> Self {
        self.attr("status", status).attr("reason", reason)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    /// Answer as if to a different command.
    pub fn command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }

    /// Override the echoed transaction id (`None` omits the attribute).
    pub fn transaction_id(mut self, id: Option<u32>) -> Self {
        self.transaction_id = Some(id);
        self
    }

    /// `<xdebug:message filename lineno>` carried by stop events.
    pub fn location(mut self, file: &str, line: u32) -> Self {
        let _ = write!(
            self.body,
            "<xdebug:message filename=\"{}\" lineno=\"{}\"></xdebug:message>",
            escape(file),
            line
        );
        self
    }

    pub fn stack_frame(mut self, level: u32, file: &str, line: u32, location: &str) -> Self {
        let _ = write!(
            self.body,
            "<stack where=\"{}\" level=\"{}\" type=\"file\" filename=\"{}\" lineno=\"{}\"></stack>",
            escape(location),
            level,
            escape(file),
            line
        );
        self
    }

    /// A scalar property with a plain text value.
    pub fn property(mut self, kind: &str, name: &str, value: &str) -> Self {
        let _ = write!(
            self.body,
            "<property name=\"{}\" type=\"{}\"><![CDATA[{}]]></property>",
            escape(name),
            escape(kind),
            value
        );
        self
    }

    /// A string property the way Xdebug sends it: base64 in CDATA.
    pub fn string_property(mut self, name: &str, value: &str) -> Self {
        let _ = write!(
            self.body,
            "<property name=\"{}\" type=\"string\" size=\"{}\" encoding=\"base64\"><![CDATA[{}]]></property>",
            escape(name),
            value.len(),
            STANDARD.encode(value)
        );
        self
    }

    pub fn breakpoint(mut self, id: &str, file: &str, line: u32) -> Self {
        let _ = write!(
            self.body,
            "<breakpoint type=\"line\" filename=\"{}\" lineno=\"{}\" state=\"enabled\" hit_count=\"0\" hit_value=\"0\" id=\"{}\"></breakpoint>",
            escape(file),
            line,
            escape(id)
        );
        self
    }

    pub fn error(mut self, code: u32, message: &str) -> Self {
        let _ = write!(
            self.body,
            "<error code=\"{}\"><message><![CDATA[{}]]></message></error>",
            code, message
        );
        self
    }

    /// `source` reply body.
    pub fn source(mut self, text: &str) -> Self {
        self.attrs
            .push(("encoding".to_string(), "base64".to_string()));
        let _ = write!(self.body, "<![CDATA[{}]]>", STANDARD.encode(text));
        self
    }

    /// Render for `cmd`, echoing its verb and transaction id unless overridden.
    pub fn to_xml(&self, cmd: &ReceivedCommand) -> String {
        let command = self.command.as_deref().unwrap_or(&cmd.verb);
        let transaction_id = self.transaction_id.unwrap_or(Some(cmd.transaction_id));

        let mut xml = format!("{XML_HEADER}<response {NAMESPACES} command=\"{}\"", escape(command));
        if let Some(id) = transaction_id {
            let _ = write!(xml, " transaction_id=\"{}\"", id);
        }
        for (name, value) in &self.attrs {
            let _ = write!(xml, " {}=\"{}\"", name, escape(value));
        }
        let _ = write!(xml, ">{}</response>", self.body);
        xml
    }
}

/// The engine side of one DBGp connection.
pub struct MockEngine {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl MockEngine {
    /// Connect to the IDE and send the `<init>` packet.
    pub async fn connect(addr: SocketAddr, file_uri: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::handshake(stream, file_uri).await
    }

    /// Keep trying to connect until the IDE is listening or `timeout` passes.
    pub async fn connect_with_retry(
        addr: SocketAddr,
        file_uri: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let started = Instant::now();
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Self::handshake(stream, file_uri).await,
                Err(_) if started.elapsed() < timeout => {
                    tokio::time::sleep(Duration::from_millis(10)).await
                }
                Err(_) => return Err(MockError::ConnectTimeout(addr)),
            }
        }
    }

    async fn handshake(stream: TcpStream, file_uri: &str) -> Result<Self> {
        let (reader, writer) = stream.into_split();
        let mut engine = Self {
            reader: BufReader::new(reader),
            writer,
        };
        engine.send_xml(&init_packet(file_uri)).await?;
        Ok(engine)
    }

    /// Read the next NUL-terminated command.
    pub async fn recv(&mut self) -> Result<ReceivedCommand> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(0, &mut buf).await?;
        if n == 0 || buf.last() != Some(&0) {
            return Err(MockError::Closed);
        }
        let wire = String::from_utf8_lossy(&buf).into_owned();
        debug!(command = %wire.trim_end_matches('\0'), "mock engine received");
        parse_command(&wire)
    }

    /// Read the next command and check its verb.
    pub async fn expect(&mut self, verb: &str) -> Result<ReceivedCommand> {
        let cmd = self.recv().await?;
        if cmd.verb != verb {
            return Err(MockError::Unexpected {
                expected: verb.to_string(),
                actual: cmd.verb,
            });
        }
        Ok(cmd)
    }

    pub async fn reply(&mut self, cmd: &ReceivedCommand, reply: Reply) -> Result<()> {
        self.send_xml(&reply.to_xml(cmd)).await
    }

    /// Expect `verb` and answer it in one go.
    pub async fn answer(&mut self, verb: &str, reply: Reply) -> Result<ReceivedCommand> {
        let cmd = self.expect(verb).await?;
        self.reply(&cmd, reply).await?;
        Ok(cmd)
    }

    pub async fn send_xml(&mut self, xml: &str) -> Result<()> {
        self.send_raw(&frame(xml)).await
    }

    /// Write bytes without any framing, for corrupt-stream tests.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Wait until the IDE closes its side of the connection.
    pub async fn wait_closed(mut self) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.reader.read_until(0, &mut buf).await? == 0 {
                return Ok(());
            }
        }
    }
}
