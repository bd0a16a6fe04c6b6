//! Seams between the engine and the outside world.
//!
//! The engine owns no sockets. An event loop implements [`Transport`] over
//! whatever it polls and calls the [`Endpoint`](crate::Endpoint) entry
//! points on readiness; the application implements [`ReadHandler`] to
//! receive frames.

mod memory;

#[cfg(feature = "async-tokio")]
pub mod tokio;

use std::io;

use bytes::Bytes;

use crate::connection::ConnectionId;
use crate::protocol::OpCode;

pub use memory::MemoryTransport;

/// Application callbacks, invoked on the event-loop thread.
pub trait ReadHandler {
    /// The handshake for `id` completed.
    fn accepted(&mut self, id: ConnectionId);

    /// One decoded frame. `opcode` is `None` for Draft-75/76, which have no
    /// opcodes.
    fn read(&mut self, id: ConnectionId, payload: &[u8], opcode: Option<OpCode>);

    /// The channel closed. Called exactly once per channel.
    fn closed(&mut self, id: ConnectionId);
}

impl<H: ReadHandler + ?Sized> ReadHandler for &mut H {
    fn accepted(&mut self, id: ConnectionId) {
        (**self).accepted(id);
    }

    fn read(&mut self, id: ConnectionId, payload: &[u8], opcode: Option<OpCode>) {
        (**self).read(id, payload, opcode);
    }

    fn closed(&mut self, id: ConnectionId) {
        (**self).closed(id);
    }
}

/// Non-blocking byte pipe per channel, implemented by the event loop.
pub trait Transport {
    /// Read available bytes into `buf`.
    ///
    /// `Ok(0)` is end of stream; `ErrorKind::WouldBlock` means nothing more
    /// is available right now.
    fn read(&mut self, id: ConnectionId, buf: &mut [u8]) -> io::Result<usize>;

    /// Enqueue bytes for writing. Must not block.
    fn send(&mut self, id: ConnectionId, data: Bytes) -> io::Result<()>;

    /// Release the underlying channel.
    fn close(&mut self, id: ConnectionId);
}
