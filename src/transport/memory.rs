//! In-memory [`Transport`] for tests and simulations.

use std::collections::HashMap;
use std::io;

use bytes::{Buf, Bytes, BytesMut};

use super::Transport;
use crate::connection::ConnectionId;

#[derive(Debug, Default)]
struct Pipe {
    inbound: BytesMut,
    eof: bool,
    outbound: BytesMut,
    closed: bool,
}

/// Byte buffers standing in for sockets.
///
/// Bytes pushed with [`push_inbound`](Self::push_inbound) are what the peer
/// "sent"; [`take_outbound`](Self::take_outbound) returns what the engine
/// wrote. An optional chunk size caps each read to exercise partial reads.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pipes: HashMap<ConnectionId, Pipe>,
    chunk_size: Option<usize>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return at most `size` bytes per read.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    pub fn push_inbound(&mut self, id: ConnectionId, data: &[u8]) {
        self.pipes
            .entry(id)
            .or_default()
            .inbound
            .extend_from_slice(data);
    }

    /// Reads return `Ok(0)` once the inbound bytes run out.
    pub fn set_eof(&mut self, id: ConnectionId) {
        self.pipes.entry(id).or_default().eof = true;
    }

    /// Everything written to `id` since the last call.
    pub fn take_outbound(&mut self, id: ConnectionId) -> Bytes {
        self.pipes
            .get_mut(&id)
            .map(|pipe| pipe.outbound.split().freeze())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_closed(&self, id: ConnectionId) -> bool {
        self.pipes.get(&id).is_some_and(|pipe| pipe.closed)
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, id: ConnectionId, buf: &mut [u8]) -> io::Result<usize> {
        let limit = self.chunk_size.unwrap_or(usize::MAX);
        let pipe = self.pipes.entry(id).or_default();
        if pipe.closed {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        if pipe.inbound.is_empty() {
            return if pipe.eof {
                Ok(0)
            } else {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            };
        }
        let n = pipe.inbound.len().min(buf.len()).min(limit);
        buf[..n].copy_from_slice(&pipe.inbound[..n]);
        pipe.inbound.advance(n);
        Ok(n)
    }

    fn send(&mut self, id: ConnectionId, data: Bytes) -> io::Result<()> {
        let pipe = self.pipes.entry(id).or_default();
        if pipe.closed {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        pipe.outbound.extend_from_slice(&data);
        Ok(())
    }

    fn close(&mut self, id: ConnectionId) {
        self.pipes.entry(id).or_default().closed = true;
    }
}
