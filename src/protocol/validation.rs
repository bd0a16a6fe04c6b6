//! Direction and size checks for incoming Draft-07+ frames.
//!
//! - frames from a client must be masked, frames from a server must not be
//! - RSV bits must be clear (no extensions are negotiated)
//! - payloads must fit the configured frame limit

use crate::connection::Role;
use crate::error::{Error, Result};

/// Validator for frames arriving at one side of a channel.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    /// Role of the side receiving the frames.
    role: Role,
    max_frame_size: usize,
}

impl FrameValidator {
    #[must_use]
    pub const fn new(role: Role, max_frame_size: usize) -> Self {
        Self {
            role,
            max_frame_size,
        }
    }

    /// Run every check against an incoming frame header.
    ///
    /// # Errors
    ///
    /// - `Error::UnmaskedFrame` - server received an unmasked frame
    /// - `Error::UnexpectedMask` - client received a masked frame
    /// - `Error::ReservedBitsSet` - RSV bits set
    /// - `Error::FrameTooLarge` - payload exceeds the limit
    pub fn validate_incoming(
        &self,
        masked: bool,
        rsv1: bool,
        rsv2: bool,
        rsv3: bool,
        payload_len: usize,
    ) -> Result<()> {
        self.validate_masking(masked)?;
        self.validate_rsv_bits(rsv1, rsv2, rsv3)?;
        self.validate_frame_size(payload_len)
    }

    /// Check the mask bit against the direction of travel.
    ///
    /// # Errors
    ///
    /// `Error::UnmaskedFrame` or `Error::UnexpectedMask`.
    const fn validate_masking(&self, masked: bool) -> Result<()> {
        match (self.role.expects_masked(), masked) {
            (true, false) => Err(Error::UnmaskedFrame),
            (false, true) => Err(Error::UnexpectedMask),
            _ => Ok(()),
        }
    }

    /// # Errors
    ///
    /// `Error::ReservedBitsSet` if any bit is set.
    const fn validate_rsv_bits(&self, rsv1: bool, rsv2: bool, rsv3: bool) -> Result<()> {
        if rsv1 || rsv2 || rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `Error::FrameTooLarge` if `payload_len` exceeds the limit.
    const fn validate_frame_size(&self, payload_len: usize) -> Result<()> {
        if payload_len > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}
