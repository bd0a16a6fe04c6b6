//! Draft-75/76 framing.
//!
//! ```text
//! +------+----------------------+------+
//! | 0x00 |  payload (no 0xFF)   | 0xFF |
//! +------+----------------------+------+
//! ```
//!
//! There is no length field and no opcode: a frame ends at the first `0xFF`.
//! Draft-76 adds a closing handshake, the two bytes `0xFF 0x00`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Byte that opens a data frame.
pub const FRAME_START: u8 = 0x00;

/// Byte that terminates a data frame.
pub const FRAME_END: u8 = 0xFF;

/// Draft-76 closing handshake.
pub const CLOSING_HANDSHAKE: [u8; 2] = [0xFF, 0x00];

/// One decoded Draft-75/76 unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelFrame {
    /// Payload found between `0x00` and `0xFF`.
    Data(Bytes),
    /// The peer sent `0xFF 0x00`.
    Close,
}

/// Write `0x00 <payload> 0xFF` to `dst`.
///
/// # Errors
///
/// Returns `Error::InvalidFrame` if `payload` contains `0xFF`, which this
/// framing cannot carry.
pub fn encode(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.contains(&FRAME_END) {
        return Err(Error::InvalidFrame(
            "payload contains 0xFF, which draft-75/76 framing cannot carry".into(),
        ));
    }
    dst.reserve(payload.len() + 2);
    dst.put_u8(FRAME_START);
    dst.put_slice(payload);
    dst.put_u8(FRAME_END);
    Ok(())
}

/// Incremental decoder for sentinel-delimited frames.
///
/// Remembers how far the current partial frame has been scanned so a frame
/// trickling in over many reads is not rescanned from the start each time.
#[derive(Debug, Clone)]
pub struct SentinelCodec {
    scanned: usize,
    max_frame_size: usize,
    closing_handshake: bool,
}

impl SentinelCodec {
    /// Decoder for Draft-75, which has no closing handshake.
    #[must_use]
    pub const fn draft75(max_frame_size: usize) -> Self {
        Self {
            scanned: 0,
            max_frame_size,
            closing_handshake: false,
        }
    }

    /// Decoder for Draft-76.
    #[must_use]
    pub const fn draft76(max_frame_size: usize) -> Self {
        Self {
            scanned: 0,
            max_frame_size,
            closing_handshake: true,
        }
    }

    /// Whether this draft has a `0xFF 0x00` closing handshake.
    #[must_use]
    pub const fn has_closing_handshake(&self) -> bool {
        self.closing_handshake
    }

    /// Take one complete frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` holds only a partial frame; the bytes
    /// stay in `buf` for the next call.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidFrame` if the frame does not start with `0x00`
    /// - `Error::FrameTooLarge` if a partial frame outgrows the limit
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<SentinelFrame>> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };

        match first {
            FRAME_START => {
                let from = self.scanned.max(1);
                match buf[from..].iter().position(|&b| b == FRAME_END) {
                    Some(offset) => {
                        let end = from + offset;
                        self.check_size(end - 1)?;
                        let mut frame = buf.split_to(end + 1);
                        frame.advance(1);
                        frame.truncate(end - 1);
                        self.scanned = 0;
                        Ok(Some(SentinelFrame::Data(frame.freeze())))
                    }
                    None => {
                        self.check_size(buf.len() - 1)?;
                        self.scanned = buf.len();
                        Ok(None)
                    }
                }
            }
            FRAME_END if self.closing_handshake => match buf.get(1) {
                None => Ok(None),
                Some(0x00) => {
                    buf.advance(CLOSING_HANDSHAKE.len());
                    Ok(Some(SentinelFrame::Close))
                }
                Some(other) => Err(Error::InvalidFrame(format!(
                    "expected closing handshake, got 0xFF {other:#04x}"
                ))),
            },
            other => Err(Error::InvalidFrame(format!(
                "frame must start with 0x00, got {other:#04x}"
            ))),
        }
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}
