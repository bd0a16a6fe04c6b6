//! Drive one [`ChannelHandler`] over a tokio stream.
//!
//! For applications that already run tokio and want one task per channel
//! instead of a readiness loop. The state machine is the same one the
//! [`Endpoint`](crate::Endpoint) uses.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::connection::{ChannelHandler, ChannelState};
use crate::error::Result;
use crate::protocol::random::RandomSource;
use crate::transport::ReadHandler;

enum Event {
    Read(std::io::Result<usize>),
    Mail,
    HandshakeDeadline,
}

/// Pump `conn` over `stream` until the channel closes.
///
/// Bytes read from the stream are fed to the channel, queued output is
/// written back, and messages pushed to the channel's mailbox from other
/// tasks or threads are sent as they arrive. The handshake must finish
/// within `Timeouts::handshake`.
///
/// # Errors
///
/// The error that closed the channel: a protocol violation, an I/O error,
/// or `Error::HandshakeTimeout`. A clean close or EOF returns `Ok(())`.
pub async fn drive<S, H, R>(
    mut stream: S,
    conn: &mut ChannelHandler,
    handler: &mut H,
    rng: &mut R,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: ReadHandler + ?Sized,
    R: RandomSource + ?Sized,
{
    let mailbox = conn.mailbox();
    let mut buf = vec![0u8; conn.config().read_buffer_size];
    let deadline = Instant::now() + conn.config().timeouts.handshake;

    loop {
        if let Err(err) = flush(&mut stream, conn).await {
            if conn.state() == ChannelState::Closed {
                debug!(conn = %conn.id(), error = %err, "peer gone before final flush");
                return Ok(());
            }
            return Err(conn.abort(err, handler));
        }
        if conn.state() == ChannelState::Closed {
            if let Err(err) = stream.shutdown().await {
                debug!(conn = %conn.id(), error = %err, "shutdown after close failed");
            }
            return Ok(());
        }

        let awaiting = conn.state() == ChannelState::AwaitingHandshake;
        let event = tokio::select! {
            read = stream.read(&mut buf) => Event::Read(read),
            () = mailbox.notified() => Event::Mail,
            () = time::sleep_until(deadline), if awaiting => Event::HandshakeDeadline,
        };

        match event {
            Event::Read(Ok(0)) => conn.on_eof(handler),
            Event::Read(Ok(n)) => conn.receive(&buf[..n], rng, handler)?,
            Event::Read(Err(err)) => return Err(conn.abort(err.into(), handler)),
            Event::Mail => {}
            Event::HandshakeDeadline => return Err(conn.expire(handler)),
        }

        if let Err(err) = conn.pump_mailbox(rng, handler) {
            warn!(conn = %conn.id(), error = %err, "mailbox message could not be sent");
        }
    }
}

async fn flush<S>(stream: &mut S, conn: &mut ChannelHandler) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut wrote = false;
    while let Some(bytes) = conn.take_outbound() {
        stream.write_all(&bytes).await?;
        wrote = true;
    }
    if wrote {
        stream.flush().await?;
    }
    Ok(())
}
