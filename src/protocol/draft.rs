//! The three WebSocket drafts and how a server tells them apart.

use crate::error::{Error, Result};
use crate::protocol::headers::HeaderSet;

/// Negotiated protocol revision of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Draft {
    /// draft-hixie-thewebsocketprotocol-75: sentinel framing, no challenge.
    D75,
    /// draft-hixie-thewebsocketprotocol-76: sentinel framing, MD5 challenge.
    D76,
    /// hybi-07 and later, up to RFC 6455 (version 13).
    D07Plus {
        /// Value of `Sec-WebSocket-Version`.
        version: u8,
    },
}

impl Draft {
    /// RFC 6455.
    pub const RFC6455: Draft = Draft::D07Plus { version: 13 };

    /// Pick the draft a client is speaking from its request headers.
    ///
    /// - `Sec-WebSocket-Version` present: Draft-07+ with that version
    /// - otherwise `Sec-WebSocket-Key1` present: Draft-76
    /// - otherwise: Draft-75
    ///
    /// # Errors
    ///
    /// `Error::UnsupportedDraftVersion` if the version does not parse or is
    /// not in `supported`.
    pub fn select(headers: &HeaderSet, supported: &[u8]) -> Result<Draft> {
        if let Some(raw) = headers.get("Sec-WebSocket-Version") {
            let version: u8 = raw
                .parse()
                .map_err(|_| Error::UnsupportedDraftVersion(raw.to_string()))?;
            if !supported.contains(&version) {
                return Err(Error::UnsupportedDraftVersion(raw.to_string()));
            }
            return Ok(Draft::D07Plus { version });
        }
        if headers.contains("Sec-WebSocket-Key1") {
            return Ok(Draft::D76);
        }
        Ok(Draft::D75)
    }

    /// Header carrying the origin in a request.
    ///
    /// RFC 6455 renamed `Sec-WebSocket-Origin` to `Origin`.
    #[must_use]
    pub const fn origin_header(&self) -> &'static str {
        match self {
            Draft::D07Plus { version } if *version < 13 => "Sec-WebSocket-Origin",
            _ => "Origin",
        }
    }

    /// Subprotocol header name.
    #[must_use]
    pub const fn protocol_header(&self) -> &'static str {
        match self {
            Draft::D75 => "WebSocket-Protocol",
            _ => "Sec-WebSocket-Protocol",
        }
    }
}

impl std::fmt::Display for Draft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Draft::D75 => write!(f, "draft-75"),
            Draft::D76 => write!(f, "draft-76"),
            Draft::D07Plus { version } => write!(f, "draft-07+ (v{version})"),
        }
    }
}
