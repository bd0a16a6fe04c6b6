//! Upgrade handshake for all three drafts.
//!
//! Server side: [`HandshakeRequest`] reads a client head and
//! [`HandshakeResponse`] renders the matching `101` reply. Client side:
//! [`ClientHandshake`] writes the GET request and later checks the server's
//! proof (accept key or MD5 token) against a value it computed itself.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::{BufMut, BytesMut};
use sha1::{Digest, Sha1};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::challenge::{self, CHALLENGE_LEN, RESPONSE_LEN};
use crate::protocol::draft::Draft;
use crate::protocol::headers::{self, HttpHead, RequestLine};
use crate::protocol::random::RandomSource;

/// The GUID appended to `Sec-WebSocket-Key` before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use draftws::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Random 16-byte nonce, base64 encoded, for `Sec-WebSocket-Key`.
pub fn generate_client_key<R: RandomSource + ?Sized>(rng: &mut R) -> String {
    let mut nonce = [0u8; 16];
    rng.fill(&mut nonce);
    BASE64.encode(nonce)
}

/// Validate the origin against a list of allowed origins.
///
/// An empty list accepts any origin, including none.
///
/// # Errors
///
/// `Error::InvalidHandshake` if the origin is missing or not listed.
pub fn validate_origin(origin: Option<&str>, allowed: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }
    match origin {
        Some(o) if allowed.iter().any(|a| a == o) => Ok(()),
        Some(o) => Err(Error::InvalidHandshake(format!("origin not allowed: {o}"))),
        None => Err(Error::InvalidHandshake("origin not allowed: (none)".into())),
    }
}

/// Reject values that would split a header line.
fn validate_header_value(name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHandshake(format!(
            "{name} contains CR or LF characters"
        )));
    }
    Ok(())
}

fn put_header(dst: &mut BytesMut, name: &str, value: &str) -> Result<()> {
    validate_header_value(name, value)?;
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
    Ok(())
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// What the client sent to prove it is speaking WebSocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Draft-75 has none.
    None,
    /// Draft-07+ `Sec-WebSocket-Key`.
    Key(String),
    /// Draft-76 `Sec-WebSocket-Key1` / `Sec-WebSocket-Key2`.
    KeyPair { key1: String, key2: String },
}

/// A client upgrade request as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub draft: Draft,
    /// Request target from the request line.
    pub path: String,
    pub host: Option<String>,
    pub origin: Option<String>,
    /// Requested subprotocols, in the client's order.
    pub protocols: Vec<String>,
    pub credentials: Credentials,
}

impl HandshakeRequest {
    /// Interpret a parsed head.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedHandshake` for a bad request line or a missing
    ///   required header
    /// - `Error::UnsupportedDraftVersion` for an unknown
    ///   `Sec-WebSocket-Version`
    pub fn from_head(head: &HttpHead, config: &Config) -> Result<Self> {
        let line = RequestLine::parse(&head.start_line)?;
        let headers = &head.headers;
        let draft = Draft::select(headers, &config.supported_versions)?;

        let (host, credentials) = match draft {
            Draft::D07Plus { .. } => (
                headers.get("Host").map(String::from),
                Credentials::Key(headers.require("Sec-WebSocket-Key")?.to_string()),
            ),
            Draft::D76 => (
                Some(headers.require("Host")?.to_string()),
                Credentials::KeyPair {
                    key1: headers.require("Sec-WebSocket-Key1")?.to_string(),
                    key2: headers.require("Sec-WebSocket-Key2")?.to_string(),
                },
            ),
            Draft::D75 => (Some(headers.require("Host")?.to_string()), Credentials::None),
        };

        let origin = headers
            .get("Origin")
            .or_else(|| headers.get("Sec-WebSocket-Origin"))
            .map(String::from);

        Ok(Self {
            draft,
            path: line.path,
            host,
            origin,
            protocols: split_list(headers.get(draft.protocol_header())),
            credentials,
        })
    }

    /// Parse raw head bytes and interpret them.
    ///
    /// # Errors
    ///
    /// As [`headers::parse_head`] and [`HandshakeRequest::from_head`].
    pub fn parse(data: &[u8], config: &Config) -> Result<Self> {
        Self::from_head(&headers::parse_head(data)?, config)
    }

    /// Bytes that follow the head before the handshake is complete.
    #[must_use]
    pub const fn challenge_len(&self) -> usize {
        match self.draft {
            Draft::D76 => CHALLENGE_LEN,
            _ => 0,
        }
    }

    /// `ws://<host><path>`, used by Draft-75/76 responses.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        self.host
            .as_ref()
            .map(|host| format!("ws://{host}{}", self.path))
    }
}

/// A server's `101` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub draft: Draft,
    pub origin: Option<String>,
    pub location: Option<String>,
    pub protocol: Option<String>,
    /// Draft-07+ `Sec-WebSocket-Accept`.
    pub accept: Option<String>,
    /// Draft-76 body.
    pub token: Option<[u8; RESPONSE_LEN]>,
}

impl HandshakeResponse {
    /// Build the reply to `req`.
    ///
    /// `challenge` must hold the eight body bytes for Draft-76 and is
    /// ignored otherwise.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidHandshake` if the origin is refused or a Draft-76
    ///   key is malformed
    /// - `Error::MalformedHandshake` if a Draft-76 challenge is missing
    pub fn for_request(
        req: &HandshakeRequest,
        challenge: Option<&[u8; CHALLENGE_LEN]>,
        config: &Config,
    ) -> Result<Self> {
        if let Some(allowed) = &config.allowed_origins {
            validate_origin(req.origin.as_deref(), allowed)?;
        }

        let (accept, token) = match &req.credentials {
            Credentials::Key(key) => (Some(compute_accept_key(key)), None),
            Credentials::KeyPair { key1, key2 } => {
                let challenge = challenge.ok_or_else(|| {
                    Error::MalformedHandshake("missing draft-76 challenge bytes".into())
                })?;
                (None, Some(challenge::compute_response(key1, key2, challenge)?))
            }
            Credentials::None => (None, None),
        };

        let protocol = req
            .protocols
            .iter()
            .find(|p| config.protocols.contains(p))
            .cloned();

        Ok(Self {
            draft: req.draft,
            origin: req.origin.clone(),
            location: req.location(),
            protocol,
            accept,
            token,
        })
    }

    /// Append the reply (head, and body for Draft-76) to `dst`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` if an echoed value contains CR or LF.
    pub fn write(&self, dst: &mut BytesMut) -> Result<()> {
        let draft = self.draft;
        match draft {
            Draft::D75 => {
                dst.put_slice(b"HTTP/1.1 101 Web Socket Protocol Handshake\r\n");
                dst.put_slice(b"Upgrade: WebSocket\r\n");
                dst.put_slice(b"Connection: Upgrade\r\n");
                if let Some(origin) = &self.origin {
                    put_header(dst, "WebSocket-Origin", origin)?;
                }
                if let Some(location) = &self.location {
                    put_header(dst, "WebSocket-Location", location)?;
                }
            }
            Draft::D76 => {
                dst.put_slice(b"HTTP/1.1 101 WebSocket Protocol Handshake\r\n");
                dst.put_slice(b"Upgrade: WebSocket\r\n");
                dst.put_slice(b"Connection: Upgrade\r\n");
                if let Some(origin) = &self.origin {
                    put_header(dst, "Sec-WebSocket-Origin", origin)?;
                }
                if let Some(location) = &self.location {
                    put_header(dst, "Sec-WebSocket-Location", location)?;
                }
            }
            Draft::D07Plus { .. } => {
                dst.put_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
                dst.put_slice(b"Upgrade: websocket\r\n");
                dst.put_slice(b"Connection: Upgrade\r\n");
                if let Some(origin) = &self.origin {
                    put_header(dst, "Sec-WebSocket-Origin", origin)?;
                }
                if let Some(accept) = &self.accept {
                    put_header(dst, "Sec-WebSocket-Accept", accept)?;
                }
            }
        }
        if let Some(protocol) = &self.protocol {
            put_header(dst, draft.protocol_header(), protocol)?;
        }
        dst.put_slice(b"\r\n");
        if let Some(token) = &self.token {
            dst.put_slice(token);
        }
        Ok(())
    }
}

/// What a client wants to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    pub draft: Draft,
    pub host: String,
    pub path: String,
    pub origin: Option<String>,
    pub protocols: Vec<String>,
}

impl ClientRequest {
    #[must_use]
    pub fn new(draft: Draft, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            draft,
            host: host.into(),
            path: path.into(),
            origin: None,
            protocols: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expected {
    Nothing,
    Accept(String),
    Token([u8; RESPONSE_LEN]),
}

/// Client half of the handshake: what was sent and what must come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandshake {
    draft: Draft,
    expected: Expected,
}

impl ClientHandshake {
    /// Write the GET request for `request` to `dst`, drawing credentials
    /// from `rng`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` if a request field contains CR or LF.
    pub fn start<R: RandomSource + ?Sized>(
        request: &ClientRequest,
        rng: &mut R,
        dst: &mut BytesMut,
    ) -> Result<Self> {
        let draft = request.draft;
        validate_header_value("request path", &request.path)?;
        dst.put_slice(format!("GET {} HTTP/1.1\r\n", request.path).as_bytes());

        let expected = match draft {
            Draft::D07Plus { version } => {
                let key = generate_client_key(rng);
                put_header(dst, "Host", &request.host)?;
                dst.put_slice(b"Upgrade: websocket\r\n");
                dst.put_slice(b"Connection: Upgrade\r\n");
                put_header(dst, "Sec-WebSocket-Key", &key)?;
                if let Some(origin) = &request.origin {
                    put_header(dst, draft.origin_header(), origin)?;
                }
                if !request.protocols.is_empty() {
                    put_header(dst, draft.protocol_header(), &request.protocols.join(", "))?;
                }
                put_header(dst, "Sec-WebSocket-Version", &version.to_string())?;
                dst.put_slice(b"\r\n");
                Expected::Accept(compute_accept_key(&key))
            }
            Draft::D76 => {
                let key1 = challenge::generate_key(rng);
                let key2 = challenge::generate_key(rng);
                let body = challenge::generate_challenge(rng);
                dst.put_slice(b"Upgrade: WebSocket\r\n");
                dst.put_slice(b"Connection: Upgrade\r\n");
                put_header(dst, "Host", &request.host)?;
                if let Some(origin) = &request.origin {
                    put_header(dst, "Origin", origin)?;
                }
                if !request.protocols.is_empty() {
                    put_header(dst, draft.protocol_header(), &request.protocols.join(", "))?;
                }
                put_header(dst, "Sec-WebSocket-Key1", &key1.key)?;
                put_header(dst, "Sec-WebSocket-Key2", &key2.key)?;
                dst.put_slice(b"\r\n");
                dst.put_slice(&body);
                Expected::Token(challenge::response_for_numbers(
                    key1.number,
                    key2.number,
                    &body,
                ))
            }
            Draft::D75 => {
                dst.put_slice(b"Upgrade: WebSocket\r\n");
                dst.put_slice(b"Connection: Upgrade\r\n");
                put_header(dst, "Host", &request.host)?;
                if let Some(origin) = &request.origin {
                    put_header(dst, "Origin", origin)?;
                }
                if !request.protocols.is_empty() {
                    put_header(dst, draft.protocol_header(), &request.protocols.join(", "))?;
                }
                dst.put_slice(b"\r\n");
                Expected::Nothing
            }
        };

        Ok(Self { draft, expected })
    }

    #[must_use]
    pub const fn draft(&self) -> Draft {
        self.draft
    }

    /// Bytes the server sends after its head (the Draft-76 token).
    #[must_use]
    pub const fn body_len(&self) -> usize {
        match self.expected {
            Expected::Token(_) => RESPONSE_LEN,
            _ => 0,
        }
    }

    /// Check the server's status line and headers.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedHandshake` for a bad status line or a missing
    ///   `Upgrade` / `Sec-WebSocket-Accept` header
    /// - `Error::InvalidHandshake` for a non-101 status or an accept key
    ///   that does not match
    pub fn verify_head(&self, head: &HttpHead) -> Result<()> {
        let status = headers::parse_status_code(&head.start_line)?;
        if status != 101 {
            return Err(Error::InvalidHandshake(format!(
                "server refused upgrade: {}",
                head.start_line
            )));
        }

        let upgrade = head.headers.require("Upgrade")?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::MalformedHandshake(format!(
                "invalid Upgrade header: {upgrade}"
            )));
        }

        if let Expected::Accept(expected) = &self.expected {
            let accept = head.headers.require("Sec-WebSocket-Accept")?;
            if accept != expected {
                return Err(Error::InvalidHandshake(format!(
                    "Sec-WebSocket-Accept mismatch: got {accept}, expected {expected}"
                )));
            }
        }
        Ok(())
    }

    /// Check the Draft-76 token that follows the head.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` if the token does not match.
    pub fn verify_body(&self, body: &[u8]) -> Result<()> {
        match &self.expected {
            Expected::Token(token) if body != token.as_slice() => Err(Error::InvalidHandshake(
                "draft-76 challenge response mismatch".into(),
            )),
            _ => Ok(()),
        }
    }
}
