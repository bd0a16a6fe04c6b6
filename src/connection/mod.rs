//! Per-channel state: identity, negotiated draft, buffers, and the
//! handshake/framing state machine.
//!
//! ## Channel Lifecycle
//!
//! 1. **AwaitingHandshake** - buffering the upgrade request or response
//! 2. **Established** - draft bound, frames decoded and forwarded
//! 3. **Closed** - terminal, all I/O discarded
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use draftws::{ChannelHandler, ChannelState, Config, ConnectionId};
//!
//! let conn = ChannelHandler::server(ConnectionId::new(0), Arc::new(Config::default()));
//! assert_eq!(conn.state(), ChannelState::AwaitingHandshake);
//! ```

mod context;
mod handler;
mod mailbox;
mod role;
mod state;

pub use context::ConnectionContext;
pub use handler::ChannelHandler;
pub use mailbox::Mailbox;
pub use role::Role;
pub use state::ChannelState;

/// Arena key of one channel inside an `Endpoint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(usize);

impl ConnectionId {
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Slab index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for ConnectionId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}
