use std::io;

use thiserror::Error;

/// A failure on the command channel.
///
/// Every variant means the stream position can no longer be trusted: the
/// protocol carries no resynchronisation markers, so the caller is expected to
/// drop the connection (or the process) rather than keep decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{what}: expected to read {expected} bytes but read {actual}")]
    ShortRead {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An image row came up short. The remaining rows are not attempted.
    #[error("image row {row} of {rows}: expected to read {expected} bytes but read {actual}")]
    ShortRowRead {
        row: usize,
        rows: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{what}: expected to send {expected} bytes but sent {actual}")]
    ShortWrite {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what}: channel i/o failed")]
    Io {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// Header fields describe a payload that does not fit in `usize`.
    #[error("{what}: payload size overflows ({detail})")]
    PayloadOverflow { what: &'static str, detail: String },

    /// Caller-supplied destination does not match the size derived from the header.
    #[error("{what}: destination holds {actual} bytes, payload needs {expected}")]
    DestinationSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl ProtocolError {
    pub(crate) fn io(what: &'static str, source: io::Error) -> Self {
        Self::Io { what, source }
    }

    /// True when the peer hung up cleanly between messages.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ShortRead { actual, .. } => *actual == 0,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
