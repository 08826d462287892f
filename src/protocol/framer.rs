//! Block framing for engine-to-IDE traffic.
//!
//! The engine sends `<decimal length> NUL <xml> NUL`. Commands travelling the other
//! way already carry their own NUL terminator, so [`write_block`] adds no framing.

use crate::{DebuggerError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Largest payload accepted from a length prefix.
pub const MAX_BLOCK_LEN: u64 = 64 * 1024 * 1024;

/// Read one framed block.
///
/// Returns the payload together with its trailing NUL, i.e. exactly `length + 1`
/// bytes. A non-digit in the prefix or a stream that ends early is a framing error.
pub async fn read_block<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut length: u64 = 0;
    let mut digits = 0usize;

    loop {
        let byte = match reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(DebuggerError::FramingError(if digits == 0 {
                    "connection closed before a block started".to_string()
                } else {
                    "connection closed inside the length prefix".to_string()
                }));
            }
            Err(e) => return Err(e.into()),
        };

        if byte == 0 {
            break;
        }
        if !byte.is_ascii_digit() {
            return Err(DebuggerError::FramingError(format!(
                "non-digit byte 0x{:02x} in length prefix",
                byte
            )));
        }

        length = length * 10 + u64::from(byte - b'0');
        digits += 1;
        if length > MAX_BLOCK_LEN {
            return Err(DebuggerError::FramingError(format!(
                "length prefix exceeds {} bytes",
                MAX_BLOCK_LEN
            )));
        }
    }

    if digits == 0 {
        return Err(DebuggerError::FramingError("empty length prefix".to_string()));
    }

    let expected = length + 1;
    let mut block = Vec::with_capacity(expected as usize);
    let read = reader.take(expected).read_to_end(&mut block).await?;
    if (read as u64) != expected {
        return Err(DebuggerError::FramingError(format!(
            "short read: expected {} bytes, got {}",
            expected, read
        )));
    }

    trace!(length, "read block");
    Ok(block)
}

/// Send an already NUL-terminated command.
pub async fn write_block<W>(writer: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}
