//! Error types for the WebSocket protocol engine.
//!
//! Every variant except [`Error::IncompleteFrame`] is fatal for the channel it
//! occurs on: the channel moves straight to `Closed` and the read handler is
//! told about it. None of them are retried.

use thiserror::Error;

use crate::connection::ConnectionId;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating or speaking a WebSocket draft.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Unparseable header block or a required header is missing.
    #[error("Malformed handshake: {0}")]
    MalformedHandshake(String),

    /// Accept key or challenge token mismatch, or the upgrade was refused.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// `Sec-WebSocket-Version` names a version this engine does not speak.
    #[error("Unsupported draft version: {0}")]
    UnsupportedDraftVersion(String),

    /// Handshake data exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The peer did not complete the handshake in time.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// Server received a frame without the mask bit.
    #[error("Client frame must be masked")]
    UnmaskedFrame,

    /// Client received a frame with the mask bit set.
    #[error("Server frame must not be masked")]
    UnexpectedMask,

    /// Invalid frame structure.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Reserved bits set without a negotiated extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// More bytes are needed before the frame can be decoded.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// The channel is closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No channel is registered under this id.
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// I/O error reported by the transport.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the error happened while negotiating the upgrade.
    #[must_use]
    pub const fn is_handshake(&self) -> bool {
        matches!(
            self,
            Error::MalformedHandshake(_)
                | Error::InvalidHandshake(_)
                | Error::UnsupportedDraftVersion(_)
                | Error::HandshakeTooLarge { .. }
                | Error::HandshakeTimeout
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
