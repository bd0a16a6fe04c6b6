//! Draft-07+ frame parsing and serialization (RFC 6455 lineage).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::random::RandomSource;
use crate::protocol::validation::FrameValidator;

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

#[derive(Debug, Clone)]
struct FrameHeader {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: usize,
    header_len: usize,
}

/// Parse a frame header from the front of `buf`.
///
/// # Errors
///
/// - `Error::IncompleteFrame` if not enough data is available
/// - `Error::ReservedOpcode` if a reserved opcode is used
/// - `Error::FrameTooLarge` if the 64-bit length does not fit in `usize`
#[inline]
fn parse_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < 2 {
        return Err(Error::IncompleteFrame {
            needed: 2 - buf.len(),
        });
    }

    let byte0 = buf[0];
    let byte1 = buf[1];

    let fin = (byte0 & 0x80) != 0;
    let rsv1 = (byte0 & 0x40) != 0;
    let rsv2 = (byte0 & 0x20) != 0;
    let rsv3 = (byte0 & 0x10) != 0;
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;

    let masked = (byte1 & 0x80) != 0;
    let (payload_len, len_size) = match byte1 & 0x7F {
        126 => {
            if buf.len() < 4 {
                return Err(Error::IncompleteFrame {
                    needed: 4 - buf.len(),
                });
            }
            (usize::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
        }
        127 => {
            if buf.len() < 10 {
                return Err(Error::IncompleteFrame {
                    needed: 10 - buf.len(),
                });
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[2..10]);
            let len_u64 = u64::from_be_bytes(raw);
            let len = usize::try_from(len_u64).map_err(|_| Error::FrameTooLarge {
                size: usize::MAX,
                max: usize::MAX,
            })?;
            (len, 10)
        }
        short => (usize::from(short), 2),
    };

    let header_len = if masked { len_size + 4 } else { len_size };
    if buf.len() < header_len {
        return Err(Error::IncompleteFrame {
            needed: header_len - buf.len(),
        });
    }

    let mask = masked.then(|| [buf[len_size], buf[len_size + 1], buf[len_size + 2], buf[len_size + 3]]);

    Ok(FrameHeader {
        fin,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        mask,
        payload_len,
        header_len,
    })
}

/// A Draft-07+ frame.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                  Masking key (if MASK set)                    |
/// +---------------------------------------------------------------+
/// |                         Payload data                          |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Bytes,
}

impl Frame {
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Close frame with an optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = BytesMut::with_capacity(2 + reason.len());
                data.put_u16(code);
                data.put_slice(reason.as_bytes());
                data.freeze()
            }
            None => Bytes::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Status code carried by a close frame, if any.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        if self.opcode != OpCode::Close || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// Validate control-frame rules.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if RSV bits are set
    /// - `Error::InvalidFrame` if a control frame is fragmented or its
    ///   payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }

        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::InvalidFrame(format!(
                    "{} frame must not be fragmented",
                    self.opcode
                )));
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::InvalidFrame(format!(
                    "{} payload of {} bytes exceeds {}",
                    self.opcode,
                    self.payload.len(),
                    MAX_CONTROL_FRAME_PAYLOAD
                )));
            }
        }

        Ok(())
    }

    /// Append the wire form of this frame to `dst`, masking the payload
    /// when `mask` is given.
    pub fn write(&self, dst: &mut BytesMut, mask: Option<[u8; 4]>) {
        let payload_len = self.payload.len();
        dst.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }
        dst.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= 125 {
            dst.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= usize::from(u16::MAX) {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(payload_len as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(payload_len as u64);
        }

        match mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask_fast(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}

/// Incremental Draft-07+ decoder/encoder bound to one role.
#[derive(Debug, Clone)]
pub struct HybiCodec {
    role: Role,
    validator: FrameValidator,
}

impl HybiCodec {
    #[must_use]
    pub fn new(role: Role, max_frame_size: usize) -> Self {
        Self {
            role,
            validator: FrameValidator::new(role, max_frame_size),
        }
    }

    /// Take one complete frame off the front of `buf`.
    ///
    /// The mask direction, RSV bits and announced length are checked as
    /// soon as the header is readable, before the payload has arrived.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedFrame` / `Error::UnexpectedMask` on a masking violation
    /// - `Error::ReservedBitsSet`, `Error::ReservedOpcode`, `Error::FrameTooLarge`
    /// - `Error::InvalidFrame` for malformed control frames
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        let header = match parse_header(buf) {
            Ok(header) => header,
            Err(Error::IncompleteFrame { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.validator.validate_incoming(
            header.mask.is_some(),
            header.rsv1,
            header.rsv2,
            header.rsv3,
            header.payload_len,
        )?;

        let total = header.header_len + header.payload_len;
        if buf.len() < total {
            return Ok(None);
        }

        let mut raw = buf.split_to(total);
        raw.advance(header.header_len);
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut raw, mask);
        }

        let frame = Frame {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            payload: raw.freeze(),
        };
        frame.validate()?;
        Ok(Some(frame))
    }

    /// Append `frame` to `dst`, masked with a fresh key when this side is
    /// the client.
    pub fn encode<R: RandomSource + ?Sized>(&self, frame: &Frame, rng: &mut R, dst: &mut BytesMut) {
        let mask = self.role.must_mask().then(|| rng.mask_key());
        frame.write(dst, mask);
    }
}
