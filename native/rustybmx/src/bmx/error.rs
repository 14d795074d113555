//! BMX error types
//!
//! Two families share one error type so callers have a single catch surface:
//! format errors (the bytes are not a valid BMX stream) and I/O errors.

use std::io;

/// Deterministic, non-recoverable problems with the stream contents
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("not a BMX stream (magic {0:02X?})")]
    BadMagic([u8; 4]),
    #[error("unsupported node type 0x{0:02X}")]
    UnknownTag(u8),
    #[error("unresolved string index {index} ({defined} strings defined)")]
    UnresolvedString { index: u32, defined: usize },
    #[error("unexpected end of stream")]
    UnexpectedEof,
    #[error("invalid byte width {0}")]
    InvalidWidth(u8),
    #[error("unsupported settings 0x{0:08X}")]
    UnsupportedSettings(u32),
    #[error("string table entry {0} is not valid UTF-8")]
    InvalidUtf8(u32),
    #[error("{0} exceeds the format limit")]
    TooLarge(&'static str),
    #[error("malformed BMX stream: {0}")]
    Malformed(String),
}

/// Error returned by every BMX read and write operation
#[derive(Debug, thiserror::Error)]
pub enum BmxError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("BMX I/O failure: {0}")]
    Io(#[source] io::Error),
}

impl BmxError {
    /// True for errors caused by the stream contents rather than the stream itself
    pub fn is_format(&self) -> bool {
        matches!(self, BmxError::Format(_))
    }
}

impl From<io::Error> for BmxError {
    fn from(e: io::Error) -> Self {
        // Running out of bytes mid-record means the stream is truncated
        if e.kind() == io::ErrorKind::UnexpectedEof {
            BmxError::Format(FormatError::UnexpectedEof)
        } else {
            BmxError::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            FormatError::UnknownTag(0x99).to_string(),
            "unsupported node type 0x99"
        );
        assert_eq!(
            FormatError::BadMagic(*b"XML1").to_string(),
            "not a BMX stream (magic [58, 4D, 4C, 31])"
        );
        assert_eq!(
            BmxError::from(FormatError::UnresolvedString { index: 7, defined: 3 }).to_string(),
            "unresolved string index 7 (3 strings defined)"
        );
    }

    #[test]
    fn test_io_error_families() {
        let eof = BmxError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "short"));
        assert!(matches!(eof, BmxError::Format(FormatError::UnexpectedEof)));
        assert!(eof.is_format());

        let denied = BmxError::from(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(matches!(denied, BmxError::Io(_)));
        assert!(!denied.is_format());
    }
}
