//! Outbound application messages.
//!
//! A [`Message`] is what an application thread drops into a connection's
//! mailbox. The loop thread turns it into wire bytes for whatever draft the
//! channel negotiated.

use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Status code and reason carried by a Draft-07+ close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Numeric status, e.g. 1000 for a normal closure.
    pub code: u16,
    /// Human-readable reason (UTF-8, at most 123 bytes).
    pub reason: String,
}

impl CloseFrame {
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A message to send on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    /// Draft-07+ only.
    Ping(Vec<u8>),
    /// Draft-07+ only.
    Pong(Vec<u8>),
    /// Start the closing handshake. On Draft-76 this is `0xFF 0x00`; on
    /// Draft-75 nothing is written and the channel just closes.
    Close(Option<CloseFrame>),
}

impl Message {
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(s.into())
    }

    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Message::Binary(data.into())
    }

    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Message::Ping(data.into())
    }

    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Message::Pong(data.into())
    }

    /// Close with a status code and reason.
    #[must_use]
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Message::Close(Some(CloseFrame::new(code, reason)))
    }

    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Message::Close(_))
    }

    /// Draft-07+ opcode this message is sent with.
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
            Message::Ping(_) => OpCode::Ping,
            Message::Pong(_) => OpCode::Pong,
            Message::Close(_) => OpCode::Close,
        }
    }

    /// Draft-07+ frame for this message.
    ///
    /// # Errors
    ///
    /// `Error::InvalidFrame` if a control payload exceeds 125 bytes.
    pub fn into_frame(self) -> Result<Frame> {
        let frame = match self {
            Message::Text(s) => Frame::text(s.into_bytes()),
            Message::Binary(data) => Frame::binary(data),
            Message::Ping(data) => Frame::ping(data),
            Message::Pong(data) => Frame::pong(data),
            Message::Close(Some(close)) => Frame::close(Some(close.code), &close.reason),
            Message::Close(None) => Frame::close(None, ""),
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Payload for a Draft-75/76 data frame.
    ///
    /// # Errors
    ///
    /// `Error::InvalidFrame` for Ping and Pong, which those drafts cannot
    /// express. Close is handled by the channel, not framed.
    pub fn sentinel_payload(&self) -> Result<&[u8]> {
        match self {
            Message::Text(s) => Ok(s.as_bytes()),
            Message::Binary(data) => Ok(data),
            other => Err(Error::InvalidFrame(format!(
                "{} cannot be sent on draft-75/76",
                other.opcode()
            ))),
        }
    }
}
