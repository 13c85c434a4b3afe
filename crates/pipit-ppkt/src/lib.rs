//! PPKT, Pipit's datagram framing protocol.
//!
//! A task bound to a datagram source does not read the socket itself: a
//! dedicated receive thread drains it, validates each packet, and
//! assembles multi-chunk frames into per-channel sample buffers that
//! reader tasks snapshot.
//!
//! - [`PpktHeader`] / [`decode_to_f32`]: the wire format and the pure
//!   dtype-driven payload conversion.
//! - [`SampleBuffer`]: per-channel circular float store.
//! - [`FrameAssembler`]: the frame state machine with structured drop
//!   accounting (sequence gaps, iteration gaps, boundary violations,
//!   metadata mismatches, inter-frame gaps).
//! - [`PpktReceiver`]: the background UDP receive thread.
//!
//! Integrity failures are counted, never raised: a bad packet costs one
//! counter bump and the stream continues.

mod assembler;
mod decode;
mod receiver;
mod sample_buffer;
mod wire;

pub use assembler::{ChannelSummary, FrameAssembler, FrameStats, RecvState};
pub use decode::decode_to_f32;
pub use receiver::PpktReceiver;
pub use sample_buffer::SampleBuffer;
pub use wire::{Dtype, FrameFlags, HeaderError, PpktHeader, HEADER_LEN, MAX_DATAGRAM, PPKT_MAGIC, PPKT_VERSION};
