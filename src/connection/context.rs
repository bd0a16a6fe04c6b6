//! Everything known about one channel apart from its parser state.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::connection::{ConnectionId, Mailbox, Role};
use crate::error::{Error, Result};
use crate::protocol::{Draft, HeaderSet, HttpHead};

/// Negotiated draft, handshake record, write queue and mailbox of a channel.
#[derive(Debug)]
pub struct ConnectionContext {
    id: ConnectionId,
    role: Role,
    draft: Option<Draft>,
    start_line: Option<String>,
    headers: HeaderSet,
    /// Draft-76 challenge (server) or token (client).
    body: Bytes,
    write_queue: VecDeque<Bytes>,
    mailbox: Mailbox,
}

impl ConnectionContext {
    #[must_use]
    pub fn new(id: ConnectionId, role: Role) -> Self {
        Self {
            id,
            role,
            draft: None,
            start_line: None,
            headers: HeaderSet::new(),
            body: Bytes::new(),
            write_queue: VecDeque::new(),
            mailbox: Mailbox::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// `None` until the handshake has picked a draft.
    #[must_use]
    pub const fn draft(&self) -> Option<Draft> {
        self.draft
    }

    /// Fix the channel's draft.
    ///
    /// # Errors
    ///
    /// `Error::InvalidHandshake` if a different draft is already bound.
    pub fn bind_draft(&mut self, draft: Draft) -> Result<()> {
        match self.draft {
            Some(bound) if bound != draft => Err(Error::InvalidHandshake(format!(
                "channel already speaks {bound}, cannot switch to {draft}"
            ))),
            _ => {
                self.draft = Some(draft);
                Ok(())
            }
        }
    }

    /// Keep the start line and headers of the peer's handshake.
    pub fn record_head(&mut self, head: HttpHead) {
        self.start_line = Some(head.start_line);
        self.headers = head.headers;
    }

    /// Request line (server) or status line (client) of the peer's handshake.
    #[must_use]
    pub fn start_line(&self) -> Option<&str> {
        self.start_line.as_deref()
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn record_body(&mut self, body: Bytes) {
        self.body = body;
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append bytes to the write queue. Empty buffers are skipped.
    pub fn queue(&mut self, bytes: Bytes) {
        if !bytes.is_empty() {
            self.write_queue.push_back(bytes);
        }
    }

    /// Next buffer to hand to the transport.
    pub fn pop_outbound(&mut self) -> Option<Bytes> {
        self.write_queue.pop_front()
    }

    #[must_use]
    pub fn has_outbound(&self) -> bool {
        !self.write_queue.is_empty()
    }

    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}
