//! Message framing for simulator links.
//!
//! Two wire formats are supported:
//! - [`slip`]: the classic two-reserved-byte byte-stuffing format used on
//!   serial links, where frame boundaries must be self-delimiting.
//! - [`codec`]: a 4-byte big-endian length prefix, as spoken by the simulator
//!   server over TCP.
//!
//! [`FrameReader`] and [`FrameWriter`] hide partial reads and writes, so
//! callers always deal in complete payloads.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod slip;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::WireCodec;
pub use codec::{decode_frame, encode_frame, FrameConfig, Framing, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
