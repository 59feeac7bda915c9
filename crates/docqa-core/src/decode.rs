//! Turning raw ingestion payloads into text.
//!
//! The core only understands UTF-8 text. Richer formats (PDF, Office
//! documents) are handled by decoders supplied by the application.

use crate::error::{QaError, Result};

/// Converts uploaded bytes into the text that gets chunked.
///
/// Character offsets in chunks and citations refer to the returned string.
pub trait ContentDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// UTF-8 text decoder.
///
/// Strips a leading byte-order mark and normalizes `\r\n` line endings.
/// Payloads that are not valid UTF-8 or contain NUL bytes are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextDecoder;

impl ContentDecoder for PlainTextDecoder {
    fn decode(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            QaError::Decode(format!("{content_type} payload is not valid UTF-8: {e}"))
        })?;
        if text.contains('\0') {
            return Err(QaError::Decode(format!(
                "{content_type} payload looks binary"
            )));
        }
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Ok(text.replace("\r\n", "\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_utf8() {
        let text = PlainTextDecoder.decode("héllo\r\nworld".as_bytes(), "text/plain").unwrap();
        assert_eq!(text, "héllo\nworld");
    }

    #[test]
    fn test_strips_bom() {
        let bytes = b"\xEF\xBB\xBFtitle";
        assert_eq!(PlainTextDecoder.decode(bytes, "text/markdown").unwrap(), "title");
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let err = PlainTextDecoder.decode(&[0xff, 0xfe, 0x00], "text/plain").unwrap_err();
        assert!(matches!(err, QaError::Decode(_)));
    }

    #[test]
    fn test_rejects_nul_bytes() {
        let err = PlainTextDecoder.decode(b"abc\0def", "application/octet-stream").unwrap_err();
        assert!(matches!(err, QaError::Decode(_)));
    }
}
