//! Charset handling for engine replies.
//!
//! Xdebug declares `encoding="iso-8859-1"` in every reply, other engines send
//! UTF-8 or whatever their host locale uses. The declared label is resolved
//! against the WHATWG label table; the declaration itself is dropped so the XML
//! parser only ever sees UTF-8.

use crate::{DebuggerError, Result};
use encoding_rs::{Encoding, UTF_8};

/// Resolve an `encoding="..."` label, e.g. `iso-8859-1`, `windows-1252`, `shift_jis`.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Transcode an XML document to a `String` without its `<?xml ...?>` declaration.
pub fn decode_document(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let (encoding, body) = match split_declaration(bytes)? {
        Some((declaration, body)) => {
            let encoding = match declared_encoding(declaration) {
                Some(label) => encoding_for_label(&label).ok_or_else(|| {
                    DebuggerError::DecodeError(format!("unsupported charset {:?}", label))
                })?,
                None => UTF_8,
            };
            (encoding, body)
        }
        None => (UTF_8, bytes),
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            DebuggerError::DecodeError(format!("malformed {} text", encoding.name()))
        })
}

fn split_declaration(bytes: &[u8]) -> Result<Option<(&[u8], &[u8])>> {
    let trimmed_start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let rest = &bytes[trimmed_start..];
    if !rest.starts_with(b"<?xml") {
        return Ok(None);
    }

    let end = rest
        .windows(2)
        .position(|w| w == b"?>")
        .ok_or_else(|| DebuggerError::DecodeError("unterminated XML declaration".to_string()))?;
    Ok(Some((&rest[..end], &rest[end + 2..])))
}

fn declared_encoding(declaration: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(declaration).ok()?;
    let start = text.find("encoding")? + "encoding".len();
    let rest = text[start..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let end = value.find(quote)?;
    Some(value[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_bytes_become_unicode() {
        let doc = b"<?xml version=\"1.0\" encoding=\"iso-8859-1\"?>\n<r>caf\xe9</r>";
        assert_eq!(decode_document(doc).unwrap(), "\n<r>caf\u{e9}</r>");
    }

    #[test]
    fn utf8_is_the_default() {
        assert_eq!(decode_document("<r>é</r>".as_bytes()).unwrap(), "<r>é</r>");
        let doc = "<?xml version='1.0'?><r>é</r>";
        assert_eq!(decode_document(doc.as_bytes()).unwrap(), "<r>é</r>");
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let err = decode_document(b"<r>\xff</r>").unwrap_err();
        assert!(matches!(err, DebuggerError::DecodeError(_)));
    }

    #[test]
    fn windows_1252_punctuation_is_decoded() {
        let doc = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><r>\x93quoted\x94 \x80</r>";
        assert_eq!(
            decode_document(doc).unwrap(),
            "<r>\u{201c}quoted\u{201d} \u{20ac}</r>"
        );
    }

    #[test]
    fn labels_resolve_case_insensitively() {
        assert_eq!(encoding_for_label(" Latin1 "), encoding_for_label("iso-8859-1"));
        assert_eq!(encoding_for_label("UTF8"), Some(UTF_8));
        assert!(encoding_for_label("shift_jis").is_some());
        assert!(encoding_for_label("x-no-such-charset").is_none());
    }

    #[test]
    fn unknown_charset_is_a_decode_error() {
        let doc = b"<?xml version=\"1.0\" encoding=\"x-no-such-charset\"?><r/>";
        assert!(matches!(
            decode_document(doc),
            Err(DebuggerError::DecodeError(_))
        ));
    }

    #[test]
    fn unterminated_declaration_is_rejected() {
        assert!(decode_document(b"<?xml version=\"1.0\"").is_err());
    }
}
