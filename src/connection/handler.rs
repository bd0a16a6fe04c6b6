//! Sans-IO channel state machine.
//!
//! A [`ChannelHandler`] is fed raw bytes with [`receive`](ChannelHandler::receive)
//! and produces raw bytes through [`take_outbound`](ChannelHandler::take_outbound).
//! It never touches a socket, so the same machine runs under the readiness
//! driven `Endpoint`, the tokio driver, or a unit test.

use std::mem;
use std::sync::Arc;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::connection::{ChannelState, ConnectionContext, ConnectionId, Mailbox, Role};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::challenge::CHALLENGE_LEN;
use crate::protocol::headers::{self, HttpHead};
use crate::protocol::random::RandomSource;
use crate::protocol::sentinel::{self, CLOSING_HANDSHAKE, SentinelCodec, SentinelFrame};
use crate::protocol::{
    ClientHandshake, ClientRequest, Draft, Frame, HandshakeRequest, HandshakeResponse, HybiCodec,
    OpCode,
};
use crate::transport::ReadHandler;

/// Close status sent when this side closes a Draft-07+ channel.
const NORMAL_CLOSURE: u16 = 1000;

/// What the handshake is waiting for.
#[derive(Debug)]
enum Pending {
    /// Server: the request head.
    Request,
    /// Server, Draft-76: the eight challenge bytes after the head.
    Challenge(HandshakeRequest),
    /// Client: the response head.
    Response(ClientHandshake),
    /// Client, Draft-76: the sixteen token bytes after the head.
    Token(ClientHandshake),
}

#[derive(Debug)]
enum Codec {
    Sentinel(SentinelCodec),
    Hybi(HybiCodec),
}

#[derive(Debug)]
enum Phase {
    AwaitingHandshake(Pending),
    Established(Codec),
    Closed,
}

/// Handshake and framing state of one channel.
#[derive(Debug)]
pub struct ChannelHandler {
    ctx: ConnectionContext,
    config: Arc<Config>,
    phase: Phase,
    read_buf: BytesMut,
    opened_at: Instant,
    /// `closed` has been reported to the read handler.
    finished: bool,
}

impl ChannelHandler {
    /// A channel accepted from a peer; waits for the upgrade request.
    #[must_use]
    pub fn server(id: ConnectionId, config: Arc<Config>) -> Self {
        Self::with_phase(
            ConnectionContext::new(id, Role::Server),
            config,
            Phase::AwaitingHandshake(Pending::Request),
        )
    }

    /// A channel opened towards a server. The upgrade request is queued
    /// immediately.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` if a request field contains CR or LF.
    pub fn client<R: RandomSource + ?Sized>(
        id: ConnectionId,
        config: Arc<Config>,
        request: &ClientRequest,
        rng: &mut R,
    ) -> Result<Self> {
        let mut ctx = ConnectionContext::new(id, Role::Client);
        let mut out = BytesMut::new();
        let handshake = ClientHandshake::start(request, rng, &mut out)?;
        ctx.bind_draft(request.draft)?;
        ctx.queue(out.freeze());
        debug!(conn = %id, draft = %request.draft, path = %request.path, "upgrade request queued");
        Ok(Self::with_phase(
            ctx,
            config,
            Phase::AwaitingHandshake(Pending::Response(handshake)),
        ))
    }

    fn with_phase(ctx: ConnectionContext, config: Arc<Config>, phase: Phase) -> Self {
        Self {
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            ctx,
            config,
            phase,
            opened_at: Instant::now(),
            finished: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.ctx.id()
    }

    #[must_use]
    pub const fn state(&self) -> ChannelState {
        match self.phase {
            Phase::AwaitingHandshake(_) => ChannelState::AwaitingHandshake,
            Phase::Established(_) => ChannelState::Established,
            Phase::Closed => ChannelState::Closed,
        }
    }

    #[must_use]
    pub const fn draft(&self) -> Option<Draft> {
        self.ctx.draft()
    }

    #[must_use]
    pub const fn context(&self) -> &ConnectionContext {
        &self.ctx
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle for queuing messages from other threads.
    #[must_use]
    pub fn mailbox(&self) -> Mailbox {
        self.ctx.mailbox().clone()
    }

    /// Feed bytes read from the transport.
    ///
    /// Complete frames are forwarded to `handler` as they are decoded; a
    /// partial frame stays buffered for the next call. Bytes arriving after
    /// close are discarded.
    ///
    /// # Errors
    ///
    /// Any handshake or framing violation. The channel is already closed,
    /// and `handler.closed` called, when this returns `Err`.
    pub fn receive<R, H>(&mut self, data: &[u8], rng: &mut R, handler: &mut H) -> Result<()>
    where
        R: RandomSource + ?Sized,
        H: ReadHandler + ?Sized,
    {
        if self.finished {
            trace!(conn = %self.id(), len = data.len(), "discarding bytes on closed channel");
            return Ok(());
        }
        self.read_buf.extend_from_slice(data);
        self.process(rng, handler)
            .map_err(|err| self.abort(err, handler))
    }

    /// The transport reported end of stream.
    pub fn on_eof<H: ReadHandler + ?Sized>(&mut self, handler: &mut H) {
        if !self.finished {
            debug!(conn = %self.id(), state = %self.state(), "peer closed transport");
            self.finish(handler);
        }
    }

    /// Queue a message. It is encoded right away once the channel is
    /// established, otherwise it waits in the mailbox.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` if the channel is closed
    /// - `Error::InvalidFrame` if the message cannot be expressed in the
    ///   negotiated draft
    pub fn send<R, H>(&mut self, message: Message, rng: &mut R, handler: &mut H) -> Result<()>
    where
        R: RandomSource + ?Sized,
        H: ReadHandler + ?Sized,
    {
        self.ctx.mailbox().push(message)?;
        self.pump_mailbox(rng, handler)
    }

    /// Encode every queued mailbox message onto the write queue.
    ///
    /// Does nothing before the handshake completes. A `Close` message
    /// closes the channel after its bytes are queued.
    ///
    /// # Errors
    ///
    /// The first `Error::InvalidFrame` hit for a message the draft cannot
    /// carry. Such messages are dropped, the rest are still sent, and the
    /// channel stays open.
    pub fn pump_mailbox<R, H>(&mut self, rng: &mut R, handler: &mut H) -> Result<()>
    where
        R: RandomSource + ?Sized,
        H: ReadHandler + ?Sized,
    {
        let mut result = Ok(());
        while self.state().can_send() {
            let Some(message) = self.ctx.mailbox().pop() else {
                break;
            };
            match self.encode(message, rng) {
                Ok(true) => {
                    debug!(conn = %self.id(), "closing channel on request");
                    self.finish(handler);
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(conn = %self.id(), error = %err, "dropping message");
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }
        result
    }

    /// Close from this side. Established Draft-07+ channels queue a close
    /// frame and Draft-76 channels queue `0xFF 0x00` first.
    pub fn close<R, H>(&mut self, rng: &mut R, handler: &mut H)
    where
        R: RandomSource + ?Sized,
        H: ReadHandler + ?Sized,
    {
        if self.finished {
            return;
        }
        if self.state().can_send() {
            if let Err(err) = self.encode(Message::close(NORMAL_CLOSURE, ""), rng) {
                warn!(conn = %self.id(), error = %err, "failed to encode close");
            }
        }
        debug!(conn = %self.id(), "closing channel");
        self.finish(handler);
    }

    /// Next buffer to write to the transport.
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        self.ctx.pop_outbound()
    }

    #[must_use]
    pub fn has_outbound(&self) -> bool {
        self.ctx.has_outbound()
    }

    /// The handshake is still pending after `Timeouts::handshake`.
    #[must_use]
    pub fn handshake_expired(&self, now: Instant) -> bool {
        matches!(self.phase, Phase::AwaitingHandshake(_))
            && now.saturating_duration_since(self.opened_at) >= self.config.timeouts.handshake
    }

    /// Close a channel whose handshake timed out.
    pub fn expire<H: ReadHandler + ?Sized>(&mut self, handler: &mut H) -> Error {
        self.abort(Error::HandshakeTimeout, handler)
    }

    /// Close the channel because of `err`, which is handed back.
    pub fn abort<H: ReadHandler + ?Sized>(&mut self, err: Error, handler: &mut H) -> Error {
        if err.is_handshake() {
            warn!(conn = %self.id(), error = %err, "handshake failed, closing channel");
        } else {
            warn!(conn = %self.id(), error = %err, "protocol violation, closing channel");
        }
        self.finish(handler);
        err
    }

    fn finish<H: ReadHandler + ?Sized>(&mut self, handler: &mut H) {
        self.phase = Phase::Closed;
        self.read_buf.clear();
        self.ctx.mailbox().close();
        if !self.finished {
            self.finished = true;
            handler.closed(self.id());
        }
    }

    fn process<R, H>(&mut self, rng: &mut R, handler: &mut H) -> Result<()>
    where
        R: RandomSource + ?Sized,
        H: ReadHandler + ?Sized,
    {
        loop {
            match self.phase {
                Phase::AwaitingHandshake(_) => {
                    if !self.advance_handshake(handler)? {
                        return Ok(());
                    }
                }
                Phase::Established(_) => return self.decode_frames(rng, handler),
                Phase::Closed => return Ok(()),
            }
        }
    }

    /// Take the head off the read buffer once its terminator has arrived.
    fn take_head(&mut self) -> Result<Option<HttpHead>> {
        let max = self.config.limits.max_handshake_size;
        match headers::find_head_end(&self.read_buf) {
            Some(end) => {
                self.config.limits.check_handshake_size(end)?;
                let head = self.read_buf.split_to(end);
                headers::parse_head(&head).map(Some)
            }
            None if self.read_buf.len() > max => Err(Error::HandshakeTooLarge {
                size: self.read_buf.len(),
                max,
            }),
            None => Ok(None),
        }
    }

    /// Move the handshake one step. `Ok(false)` means more bytes are needed.
    fn advance_handshake<H: ReadHandler + ?Sized>(&mut self, handler: &mut H) -> Result<bool> {
        let pending = match mem::replace(&mut self.phase, Phase::Closed) {
            Phase::AwaitingHandshake(pending) => pending,
            other => {
                self.phase = other;
                return Ok(false);
            }
        };

        match pending {
            Pending::Request => {
                let Some(head) = self.take_head()? else {
                    self.phase = Phase::AwaitingHandshake(Pending::Request);
                    return Ok(false);
                };
                let request = HandshakeRequest::from_head(&head, &self.config)?;
                self.ctx.record_head(head);
                self.ctx.bind_draft(request.draft)?;
                trace!(conn = %self.id(), draft = %request.draft, path = %request.path, "upgrade request parsed");
                if request.challenge_len() > 0 {
                    self.phase = Phase::AwaitingHandshake(Pending::Challenge(request));
                } else {
                    self.respond(&request, None, handler)?;
                }
            }
            Pending::Challenge(request) => {
                if self.read_buf.len() < CHALLENGE_LEN {
                    self.phase = Phase::AwaitingHandshake(Pending::Challenge(request));
                    return Ok(false);
                }
                let body = self.read_buf.split_to(CHALLENGE_LEN).freeze();
                let mut challenge = [0u8; CHALLENGE_LEN];
                challenge.copy_from_slice(&body);
                self.ctx.record_body(body);
                self.respond(&request, Some(&challenge), handler)?;
            }
            Pending::Response(handshake) => {
                let Some(head) = self.take_head()? else {
                    self.phase = Phase::AwaitingHandshake(Pending::Response(handshake));
                    return Ok(false);
                };
                handshake.verify_head(&head)?;
                self.ctx.record_head(head);
                if handshake.body_len() > 0 {
                    self.phase = Phase::AwaitingHandshake(Pending::Token(handshake));
                } else {
                    self.establish(handshake.draft(), handler);
                }
            }
            Pending::Token(handshake) => {
                let len = handshake.body_len();
                if self.read_buf.len() < len {
                    self.phase = Phase::AwaitingHandshake(Pending::Token(handshake));
                    return Ok(false);
                }
                let body = self.read_buf.split_to(len).freeze();
                handshake.verify_body(&body)?;
                self.ctx.record_body(body);
                self.establish(handshake.draft(), handler);
            }
        }
        Ok(true)
    }

    fn respond<H: ReadHandler + ?Sized>(
        &mut self,
        request: &HandshakeRequest,
        challenge: Option<&[u8; CHALLENGE_LEN]>,
        handler: &mut H,
    ) -> Result<()> {
        let response = HandshakeResponse::for_request(request, challenge, &self.config)?;
        let mut out = BytesMut::new();
        response.write(&mut out)?;
        self.ctx.queue(out.freeze());
        self.establish(request.draft, handler);
        Ok(())
    }

    fn establish<H: ReadHandler + ?Sized>(&mut self, draft: Draft, handler: &mut H) {
        let max = self.config.limits.max_frame_size;
        let codec = match draft {
            Draft::D75 => Codec::Sentinel(SentinelCodec::draft75(max)),
            Draft::D76 => Codec::Sentinel(SentinelCodec::draft76(max)),
            Draft::D07Plus { .. } => Codec::Hybi(HybiCodec::new(self.ctx.role(), max)),
        };
        self.phase = Phase::Established(codec);
        debug!(conn = %self.id(), role = %self.ctx.role(), draft = %draft, "handshake complete");
        handler.accepted(self.id());
    }

    fn decode_frames<R, H>(&mut self, rng: &mut R, handler: &mut H) -> Result<()>
    where
        R: RandomSource + ?Sized,
        H: ReadHandler + ?Sized,
    {
        let id = self.ctx.id();
        loop {
            let Phase::Established(codec) = &mut self.phase else {
                return Ok(());
            };
            let peer_closed = match codec {
                Codec::Sentinel(codec) => match codec.decode(&mut self.read_buf)? {
                    None => return Ok(()),
                    Some(SentinelFrame::Data(payload)) => {
                        trace!(conn = %id, len = payload.len(), "frame received");
                        handler.read(id, &payload, None);
                        false
                    }
                    Some(SentinelFrame::Close) => {
                        self.ctx.queue(Bytes::from_static(&CLOSING_HANDSHAKE));
                        true
                    }
                },
                Codec::Hybi(codec) => match codec.decode(&mut self.read_buf)? {
                    None => return Ok(()),
                    Some(frame) => {
                        let opcode = frame.opcode;
                        let close_code = frame.close_code();
                        let payload = frame.into_payload();
                        trace!(conn = %id, %opcode, len = payload.len(), "frame received");
                        match opcode {
                            OpCode::Ping => {
                                let mut out = BytesMut::new();
                                codec.encode(&Frame::pong(payload.clone()), rng, &mut out);
                                self.ctx.queue(out.freeze());
                            }
                            OpCode::Close => {
                                // Echo the status code only.
                                let mut out = BytesMut::new();
                                codec.encode(&Frame::close(close_code, ""), rng, &mut out);
                                self.ctx.queue(out.freeze());
                            }
                            _ => {}
                        }
                        handler.read(id, &payload, Some(opcode));
                        opcode == OpCode::Close
                    }
                },
            };
            if peer_closed {
                debug!(conn = %id, "peer sent close");
                self.finish(handler);
                return Ok(());
            }
        }
    }

    /// Encode one message onto the write queue. Returns whether the message
    /// closes the channel.
    fn encode<R: RandomSource + ?Sized>(&mut self, message: Message, rng: &mut R) -> Result<bool> {
        let Phase::Established(codec) = &self.phase else {
            return Err(Error::ConnectionClosed);
        };
        let closing = message.is_close();
        let mut out = BytesMut::new();
        match codec {
            Codec::Sentinel(codec) => {
                if closing {
                    if codec.has_closing_handshake() {
                        out.extend_from_slice(&CLOSING_HANDSHAKE);
                    }
                } else {
                    sentinel::encode(message.sentinel_payload()?, &mut out)?;
                }
            }
            Codec::Hybi(codec) => codec.encode(&message.into_frame()?, rng, &mut out),
        }
        trace!(conn = %self.id(), len = out.len(), "frame queued");
        self.ctx.queue(out.freeze());
        Ok(closing)
    }
}
