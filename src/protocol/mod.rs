//! Wire-level protocol for Draft-75, Draft-76 and Draft-07+.
//!
//! Framing lives in [`sentinel`] (Draft-75/76) and [`frame`] (Draft-07+);
//! the upgrade handshake in [`headers`], [`draft`], [`handshake`] and
//! [`challenge`].

pub mod challenge;
pub mod draft;
pub mod frame;
pub mod handshake;
pub mod headers;
pub mod mask;
pub mod opcode;
pub mod random;
pub mod sentinel;
pub mod validation;

pub use draft::Draft;
pub use frame::{Frame, HybiCodec};
pub use handshake::{
    ClientHandshake, ClientRequest, HandshakeRequest, HandshakeResponse, WS_GUID,
    compute_accept_key,
};
pub use headers::{HeaderSet, HttpHead};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
pub use random::{OsRandom, RandomSource, SeededRandom};
pub use sentinel::{SentinelCodec, SentinelFrame};
pub use validation::FrameValidator;
