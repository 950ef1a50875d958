//! RFC 6716 section 4.3 CELT encoder core.
//!
//! Turns PCM frames into CELT-coded range-coder bytes: transient/pitch
//! analysis, MDCT, per-band energy coding, bit allocation, and PVQ shape
//! quantization, in the exact order the bitstream requires them written.
//! Packetization (TOC byte, Ogg/RTP framing, SILK hybrid muxing) is out of
//! scope; callers own the container around the bytes this crate returns.

pub mod celt;
pub mod config;
pub mod encoder;
pub mod entropy;
pub mod error;

pub use config::{Bandwidth, Channels, EncoderConfig};
pub use encoder::{EncodedFrame, Encoder};
pub use error::{EncoderError, Result};
