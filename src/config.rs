//! Configuration and limits for WebSocket channels.

use std::time::Duration;

/// Draft-07+ versions accepted by default (hybi-07, hybi-08 and RFC 6455).
pub const DEFAULT_SUPPORTED_VERSIONS: [u8; 3] = [7, 8, 13];

/// Resource limits for one channel.
///
/// These bound the memory a peer can pin by sending an endless handshake or
/// an oversized frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// For Draft-75/76 this bounds the bytes buffered while waiting for the
    /// `0xFF` terminator.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of the handshake header block in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024, // 16 MB
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_handshake_size: usize) -> Self {
        Self {
            max_frame_size,
            max_handshake_size,
        }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max frame: 64 KB
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_handshake_size: 4096,
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Timeout configuration.
///
/// The engine never reads a clock on its own; the event loop passes `now`
/// to [`Endpoint::expire_handshakes`](crate::Endpoint::expire_handshakes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Maximum time a channel may stay in `AwaitingHandshake`.
    ///
    /// Default: 30 seconds
    pub handshake: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(30),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(handshake: Duration) -> Self {
        Self { handshake }
    }
}

/// WebSocket engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Timeout configuration.
    pub timeouts: Timeouts,

    /// Size of the scratch buffer used for one transport read (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// `Sec-WebSocket-Version` values the server accepts.
    ///
    /// Default: 7, 8, 13
    pub supported_versions: Vec<u8>,

    /// Allowed origins for CSWSH protection (server only).
    ///
    /// If `Some`, only requests whose origin matches one of these values are
    /// upgraded. If `None`, origin validation is disabled.
    /// Default: None
    pub allowed_origins: Option<Vec<String>>,

    /// Subprotocols the server is willing to speak, in preference order.
    ///
    /// The first requested protocol that appears here is echoed back.
    /// Default: empty (no protocol header in responses)
    pub protocols: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            timeouts: Timeouts::default(),
            read_buffer_size: 8192,
            supported_versions: DEFAULT_SUPPORTED_VERSIONS.to_vec(),
            allowed_origins: None,
            protocols: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set timeout configuration.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Restrict the accepted Draft-07+ versions.
    #[must_use]
    pub fn with_supported_versions(mut self, versions: Vec<u8>) -> Self {
        self.supported_versions = versions;
        self
    }

    /// Set allowed origins for CSWSH protection.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Some(origins);
        self
    }

    /// Set the subprotocols the server accepts.
    #[must_use]
    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }
}
