use std::io;

use thiserror::Error;

/// Errors raised while setting up a gzip stream
#[derive(Debug, Error)]
pub enum GzipError {
    /// Level outside `-1..=9`
    #[error("invalid gzip compression level: {0}")]
    InvalidLevel(i32),

    /// Leading bytes are not the gzip magic
    #[error("invalid gzip header: expected magic [1f, 8b], found {found:02x?}")]
    InvalidHeader { found: [u8; 2] },

    /// Compression method other than deflate
    #[error("unsupported gzip compression method: {0}")]
    UnsupportedMethod(u8),

    /// Reserved flag bits set in the header
    #[error("invalid gzip header flags: {0:#04x}")]
    ReservedFlags(u8),

    /// Source ended before a full header was read
    #[error("gzip header truncated")]
    TruncatedHeader,

    /// File name or comment in the header runs past the accepted length
    #[error("gzip header {0} too long")]
    HeaderFieldTooLong(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GzipError {
    /// The `io::ErrorKind` this error maps to when it crosses a `Read` boundary
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            GzipError::InvalidLevel(_) => io::ErrorKind::InvalidInput,
            GzipError::InvalidHeader { .. }
            | GzipError::UnsupportedMethod(_)
            | GzipError::ReservedFlags(_)
            | GzipError::HeaderFieldTooLong(_) => io::ErrorKind::InvalidData,
            GzipError::TruncatedHeader => io::ErrorKind::UnexpectedEof,
            GzipError::Io(e) => e.kind(),
        }
    }

    /// Header problems mean the data is not gzip at all
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            GzipError::InvalidHeader { .. }
                | GzipError::UnsupportedMethod(_)
                | GzipError::ReservedFlags(_)
                | GzipError::HeaderFieldTooLong(_)
                | GzipError::TruncatedHeader
        )
    }
}

impl From<GzipError> for io::Error {
    fn from(error: GzipError) -> Self {
        match error {
            GzipError::Io(e) => e,
            other => io::Error::new(other.kind(), other),
        }
    }
}
