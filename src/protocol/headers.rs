//! HTTP-like head parsing for the upgrade handshake.
//!
//! A head is the start line (request line on the server, status line on the
//! client) followed by `Name: value` lines and an empty line. Only what the
//! handshake needs is parsed; there is no general HTTP support.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Terminator of the header block.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    name: String,
    value: String,
}

/// Header name → trimmed value.
///
/// Lookups ignore ASCII case, the spelling of the last write is kept, and a
/// repeated name replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: HashMap<String, Header>,
}

impl HeaderSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any previous value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.insert(
            name.to_ascii_lowercase(),
            Header {
                name,
                value: value.into(),
            },
        );
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|h| h.value.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Like [`get`](Self::get) but a missing header is a `MalformedHandshake`.
    ///
    /// # Errors
    ///
    /// `Error::MalformedHandshake` naming the missing header.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::MalformedHandshake(format!("missing {name} header")))
    }

    /// Iterate `(name, value)` pairs with names as they were received.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed start line plus header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHead {
    /// First line, kept out of the header map.
    pub start_line: String,
    pub headers: HeaderSet,
}

/// Offset just past the `\r\n\r\n` terminator, if the head is complete.
#[must_use]
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}

/// Parse a complete head (terminator included or not).
///
/// # Errors
///
/// `Error::MalformedHandshake` if the head is not UTF-8, is empty, or has a
/// non-empty line without a `:`.
pub fn parse_head(data: &[u8]) -> Result<HttpHead> {
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::MalformedHandshake("head is not valid UTF-8".into()))?;

    let mut lines = text.split("\r\n");
    let start_line = lines
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| Error::MalformedHandshake("empty head".into()))?
        .to_string();

    let mut headers = HeaderSet::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            Error::MalformedHandshake(format!("header line without ':': {line}"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::MalformedHandshake("empty header name".into()));
        }
        headers.insert(name, value.trim());
    }

    Ok(HttpHead {
        start_line,
        headers,
    })
}

/// `GET <path> HTTP/1.1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
    pub version: String,
}

impl RequestLine {
    /// # Errors
    ///
    /// `Error::MalformedHandshake` unless the line is `GET <path> HTTP/1.1`.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [method, path, version] = parts.as_slice() else {
            return Err(Error::MalformedHandshake(format!(
                "invalid request line: {line}"
            )));
        };
        if *method != "GET" {
            return Err(Error::MalformedHandshake(format!(
                "expected GET method, got {method}"
            )));
        }
        if *version != "HTTP/1.1" {
            return Err(Error::MalformedHandshake(format!(
                "expected HTTP/1.1, got {version}"
            )));
        }
        Ok(Self {
            method: (*method).to_string(),
            path: (*path).to_string(),
            version: (*version).to_string(),
        })
    }
}

/// Extract the status code from `HTTP/1.1 <code> <reason>`.
///
/// # Errors
///
/// `Error::MalformedHandshake` if the line is not an HTTP/1.1 status line.
pub fn parse_status_code(line: &str) -> Result<u16> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("HTTP/1.1"), Some(code)) => code
            .parse()
            .map_err(|_| Error::MalformedHandshake(format!("invalid status line: {line}"))),
        _ => Err(Error::MalformedHandshake(format!(
            "invalid status line: {line}"
        ))),
    }
}
