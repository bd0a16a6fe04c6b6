//! Lifecycle of one channel.

/// Channel state.
///
/// ```text
/// AwaitingHandshake ──► Established ──► Closed
///         │                                ▲
///         └────────────────────────────────┘
/// ```
///
/// Any protocol error, EOF, or close jumps straight to `Closed`, which is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelState {
    /// Buffering the upgrade request (server) or response (client).
    #[default]
    AwaitingHandshake,
    /// Draft negotiated; frames flow both ways.
    Established,
    /// All I/O is discarded.
    Closed,
}

impl ChannelState {
    /// Anything but `Closed`.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ChannelState::Closed)
    }

    /// Application messages can be encoded only once the draft is known.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ChannelState::Established)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::AwaitingHandshake => write!(f, "awaiting-handshake"),
            ChannelState::Established => write!(f, "established"),
            ChannelState::Closed => write!(f, "closed"),
        }
    }
}
