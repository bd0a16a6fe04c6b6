//! Cross-thread outbound queue for one channel.
//!
//! The event loop owns every channel, so application threads cannot touch
//! a [`ChannelHandler`](super::ChannelHandler) directly. They push
//! [`Message`]s into the channel's mailbox instead; the loop thread drains
//! it in `Endpoint::on_writable`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::message::Message;

#[derive(Debug, Default)]
struct Queue {
    messages: VecDeque<Message>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    /// Flag and messages share one lock: nothing is queued after `close`.
    queue: Mutex<Queue>,
    #[cfg(feature = "async-tokio")]
    notify: tokio::sync::Notify,
}

/// Cloneable handle to a channel's outbound queue.
///
/// Messages pushed before the handshake completes wait until the draft is
/// known.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    shared: Arc<Shared>,
}

impl Mailbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for the loop thread.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` once the channel has closed.
    pub fn push(&self, message: Message) -> Result<()> {
        {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                return Err(Error::ConnectionClosed);
            }
            queue.messages.push_back(message);
        }
        #[cfg(feature = "async-tokio")]
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Oldest queued message.
    pub fn pop(&self) -> Option<Message> {
        self.shared.queue.lock().messages.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.queue.lock().messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.queue.lock().messages.is_empty()
    }

    /// Refuse further pushes and drop anything still queued.
    pub fn close(&self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.closed = true;
            queue.messages.clear();
        }
        #[cfg(feature = "async-tokio")]
        self.shared.notify.notify_one();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.queue.lock().closed
    }

    /// Resolves after the next push or close.
    #[cfg(feature = "async-tokio")]
    pub async fn notified(&self) {
        self.shared.notify.notified().await;
    }
}
