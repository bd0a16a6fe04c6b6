//! # draftws - Multi-draft WebSocket protocol engine
//!
//! `draftws` negotiates and speaks three incompatible generations of the
//! WebSocket protocol over one non-blocking transport abstraction, in both
//! the client and the server role:
//!
//! - **Draft-75**: `0x00 … 0xFF` framing, no handshake proof
//! - **Draft-76**: same framing plus the `Key1`/`Key2` MD5 challenge
//! - **Draft-07+** (through RFC 6455): length-prefixed, masked frames and
//!   the SHA-1 `Sec-WebSocket-Accept` key
//!
//! The server picks the draft from the client's request headers. Each
//! channel is a sans-IO [`ChannelHandler`]; an [`Endpoint`] keeps them in an
//! arena and is driven by an event loop through the [`Transport`] and
//! [`ReadHandler`] traits.
//!
//! ## Quick Start
//!
//! ```
//! use draftws::{Config, ConnectionId, Endpoint, MemoryTransport, OpCode, ReadHandler};
//!
//! #[derive(Default)]
//! struct Log(Vec<Vec<u8>>);
//!
//! impl ReadHandler for Log {
//!     fn accepted(&mut self, _id: ConnectionId) {}
//!     fn read(&mut self, _id: ConnectionId, payload: &[u8], _opcode: Option<OpCode>) {
//!         self.0.push(payload.to_vec());
//!     }
//!     fn closed(&mut self, _id: ConnectionId) {}
//! }
//!
//! let mut endpoint = Endpoint::new(Config::default());
//! let mut transport = MemoryTransport::new();
//! let mut log = Log::default();
//!
//! let id = endpoint.accept();
//! transport.push_inbound(
//!     id,
//!     b"GET /demo HTTP/1.1\r\nHost: example.com\r\nOrigin: http://example.com\r\n\r\n\x00hi\xff",
//! );
//! endpoint.on_readable(id, &mut transport, &mut log).unwrap();
//! assert_eq!(log.0, vec![b"hi".to_vec()]);
//! ```

pub mod config;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod protocol;
pub mod transport;

pub use config::{Config, Limits, Timeouts};
pub use connection::{ChannelHandler, ChannelState, ConnectionContext, ConnectionId, Mailbox, Role};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use message::{CloseFrame, Message};
pub use protocol::{
    ClientRequest, Draft, HeaderSet, OpCode, OsRandom, RandomSource, SeededRandom, WS_GUID,
    compute_accept_key,
};
pub use transport::{MemoryTransport, ReadHandler, Transport};
