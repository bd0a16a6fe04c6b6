//! Connection arena and event-loop entry points.
//!
//! An [`Endpoint`] owns every channel in a slab and is driven from a single
//! event-loop thread: the loop calls [`on_readable`](Endpoint::on_readable)
//! and [`on_writable`](Endpoint::on_writable) when the transport reports
//! readiness. Other threads talk to a channel only through its
//! [`Mailbox`].
//!
//! ```
//! use draftws::{ChannelState, Config, Endpoint, MemoryTransport, ReadHandler};
//! use draftws::{ConnectionId, OpCode};
//!
//! struct Echo;
//! impl ReadHandler for Echo {
//!     fn accepted(&mut self, _id: ConnectionId) {}
//!     fn read(&mut self, _id: ConnectionId, _payload: &[u8], _opcode: Option<OpCode>) {}
//!     fn closed(&mut self, _id: ConnectionId) {}
//! }
//!
//! let mut endpoint = Endpoint::new(Config::default());
//! let mut transport = MemoryTransport::new();
//! let id = endpoint.accept();
//! transport.push_inbound(id, b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
//! endpoint.on_readable(id, &mut transport, &mut Echo).unwrap();
//! assert_eq!(endpoint.state(id), Some(ChannelState::Established));
//! ```

use std::io;
use std::sync::Arc;
use std::time::Instant;

use slab::Slab;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::connection::{ChannelHandler, ChannelState, ConnectionContext, ConnectionId, Mailbox};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{ClientRequest, Draft, OsRandom, RandomSource};
use crate::transport::{ReadHandler, Transport};

/// Every channel of one event loop.
#[derive(Debug)]
pub struct Endpoint<R = OsRandom> {
    config: Arc<Config>,
    connections: Slab<ChannelHandler>,
    rng: R,
    scratch: Vec<u8>,
}

impl Endpoint<OsRandom> {
    /// Endpoint drawing randomness from the operating system.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_random(config, OsRandom::new())
    }
}

impl<R: RandomSource> Endpoint<R> {
    /// Endpoint with an explicit random source, e.g. a `SeededRandom` for
    /// reproducible tests.
    #[must_use]
    pub fn with_random(config: Config, rng: R) -> Self {
        let scratch = vec![0u8; config.read_buffer_size.max(1)];
        Self {
            config: Arc::new(config),
            connections: Slab::new(),
            rng,
            scratch,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a channel the transport just accepted. The server waits for
    /// the upgrade request.
    pub fn accept(&mut self) -> ConnectionId {
        let entry = self.connections.vacant_entry();
        let id = ConnectionId::new(entry.key());
        entry.insert(ChannelHandler::server(id, Arc::clone(&self.config)));
        debug!(conn = %id, "channel accepted");
        id
    }

    /// Register an outgoing channel. The upgrade request is written on the
    /// next [`on_writable`](Self::on_writable).
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` if a request field contains CR or LF.
    pub fn connect(&mut self, request: &ClientRequest) -> Result<ConnectionId> {
        let entry = self.connections.vacant_entry();
        let id = ConnectionId::new(entry.key());
        let conn = ChannelHandler::client(id, Arc::clone(&self.config), request, &mut self.rng)?;
        entry.insert(conn);
        Ok(id)
    }

    /// Drain the transport for `id` until it would block, feeding the bytes
    /// through the channel and flushing whatever that produced.
    ///
    /// Protocol violations, EOF and transport errors close the channel (the
    /// handler's `closed` is called and the transport released); they are
    /// not returned.
    ///
    /// # Errors
    ///
    /// `Error::UnknownConnection` if `id` is not registered.
    pub fn on_readable<T, H>(&mut self, id: ConnectionId, transport: &mut T, handler: &mut H) -> Result<()>
    where
        T: Transport + ?Sized,
        H: ReadHandler + ?Sized,
    {
        let conn = self
            .connections
            .get_mut(id.index())
            .ok_or(Error::UnknownConnection(id))?;

        while conn.state().is_active() {
            match transport.read(id, &mut self.scratch) {
                Ok(0) => conn.on_eof(handler),
                Ok(n) => {
                    if let Err(err) = conn.receive(&self.scratch[..n], &mut self.rng, handler) {
                        trace!(conn = %id, error = %err, "channel closed while reading");
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    conn.abort(err.into(), handler);
                }
            }
        }

        if let Err(err) = conn.pump_mailbox(&mut self.rng, handler) {
            debug!(conn = %id, error = %err, "mailbox message dropped");
        }
        Self::flush(conn, transport, handler);
        self.release_if_closed(id, transport);
        Ok(())
    }

    /// Encode pending mailbox messages and write all queued bytes.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownConnection` if `id` is not registered
    /// - the first `Error::InvalidFrame` for a mailbox message the draft
    ///   cannot carry (the rest are still written)
    pub fn on_writable<T, H>(&mut self, id: ConnectionId, transport: &mut T, handler: &mut H) -> Result<()>
    where
        T: Transport + ?Sized,
        H: ReadHandler + ?Sized,
    {
        let conn = self
            .connections
            .get_mut(id.index())
            .ok_or(Error::UnknownConnection(id))?;
        let pumped = conn.pump_mailbox(&mut self.rng, handler);
        Self::flush(conn, transport, handler);
        self.release_if_closed(id, transport);
        pumped
    }

    /// Queue a message for `id`; it is written on the next
    /// [`on_writable`](Self::on_writable).
    ///
    /// # Errors
    ///
    /// `Error::UnknownConnection`, or `Error::ConnectionClosed` if the
    /// channel is closing.
    pub fn send(&mut self, id: ConnectionId, message: Message) -> Result<()> {
        self.mailbox(id)?.push(message)
    }

    /// Cloneable handle for sending to `id` from any thread.
    ///
    /// # Errors
    ///
    /// `Error::UnknownConnection` if `id` is not registered.
    pub fn mailbox(&self, id: ConnectionId) -> Result<Mailbox> {
        self.connections
            .get(id.index())
            .map(ChannelHandler::mailbox)
            .ok_or(Error::UnknownConnection(id))
    }

    /// Close `id` from this side, flushing the closing frame if the draft
    /// has one.
    ///
    /// # Errors
    ///
    /// `Error::UnknownConnection` if `id` is not registered.
    pub fn close<T, H>(&mut self, id: ConnectionId, transport: &mut T, handler: &mut H) -> Result<()>
    where
        T: Transport + ?Sized,
        H: ReadHandler + ?Sized,
    {
        let conn = self
            .connections
            .get_mut(id.index())
            .ok_or(Error::UnknownConnection(id))?;
        conn.close(&mut self.rng, handler);
        Self::flush(conn, transport, handler);
        self.release_if_closed(id, transport);
        Ok(())
    }

    /// Close every channel whose handshake has been pending longer than
    /// `Timeouts::handshake` at `now`. Returns how many were closed.
    pub fn expire_handshakes<T, H>(&mut self, now: Instant, transport: &mut T, handler: &mut H) -> usize
    where
        T: Transport + ?Sized,
        H: ReadHandler + ?Sized,
    {
        let expired: Vec<usize> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.handshake_expired(now))
            .map(|(key, _)| key)
            .collect();

        for &key in &expired {
            let id = ConnectionId::new(key);
            if let Some(conn) = self.connections.get_mut(key) {
                conn.expire(handler);
            }
            self.release_if_closed(id, transport);
        }
        expired.len()
    }

    /// `None` once the channel has been released.
    #[must_use]
    pub fn state(&self, id: ConnectionId) -> Option<ChannelState> {
        self.connections.get(id.index()).map(ChannelHandler::state)
    }

    #[must_use]
    pub fn draft(&self, id: ConnectionId) -> Option<Draft> {
        self.connections.get(id.index()).and_then(ChannelHandler::draft)
    }

    #[must_use]
    pub fn context(&self, id: ConnectionId) -> Option<&ConnectionContext> {
        self.connections.get(id.index()).map(ChannelHandler::context)
    }

    /// Ids of all live channels.
    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().map(|(key, _)| ConnectionId::new(key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn flush<T, H>(conn: &mut ChannelHandler, transport: &mut T, handler: &mut H)
    where
        T: Transport + ?Sized,
        H: ReadHandler + ?Sized,
    {
        while let Some(bytes) = conn.take_outbound() {
            if let Err(err) = transport.send(conn.id(), bytes) {
                warn!(conn = %conn.id(), error = %err, "transport send failed");
                conn.abort(err.into(), handler);
                while conn.take_outbound().is_some() {}
                break;
            }
        }
    }

    fn release_if_closed<T: Transport + ?Sized>(&mut self, id: ConnectionId, transport: &mut T) {
        if self.state(id) == Some(ChannelState::Closed) {
            self.connections.remove(id.index());
            transport.close(id);
            debug!(conn = %id, remaining = self.connections.len(), "channel released");
        }
    }
}
