//! SLIP byte stuffing.
//!
//! ```text
//! payload:  61 C0 7A DB 64
//! wire:     C0 61 DB DC 7A DB DD 64 C0
//!           ^END  ^ESC ESC_END ^ESC ESC_ESC  ^END
//! ```
//!
//! Every frame is wrapped in `END` on both sides. Literal `END` and `ESC` bytes
//! inside the payload are replaced by two-byte escape sequences, so `END` on
//! the wire always marks a frame boundary.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame boundary.
pub const END: u8 = 0xC0;
/// Escape introducer.
pub const ESC: u8 = 0xDB;
/// Substitute for a literal `END` after `ESC`.
pub const ESC_END: u8 = 0xDC;
/// Substitute for a literal `ESC` after `ESC`.
pub const ESC_ESC: u8 = 0xDD;

/// Number of bytes `payload` occupies on the wire.
pub fn encoded_len(payload: &[u8]) -> usize {
    let escaped = payload.iter().filter(|b| **b == END || **b == ESC).count();
    payload.len() + escaped + 2
}

/// Encode a payload into a complete SLIP frame.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(encoded_len(payload));
    encode_into(payload, &mut dst);
    dst.freeze()
}

/// Append the SLIP frame for `payload` to `dst`.
pub fn encode_into(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(encoded_len(payload));
    dst.put_u8(END);
    for &byte in payload {
        match byte {
            END => dst.put_slice(&[ESC, ESC_END]),
            ESC => dst.put_slice(&[ESC, ESC_ESC]),
            other => dst.put_u8(other),
        }
    }
    dst.put_u8(END);
}

/// Decode one SLIP frame.
///
/// Leading `END` bytes are skipped and decoding stops at the first `END` that
/// follows payload data; anything after it is ignored. A missing trailing
/// `END` is tolerated.
pub fn decode(framed: &[u8]) -> Result<Bytes> {
    let mut decoded = BytesMut::with_capacity(framed.len());
    let mut escaped = false;

    for (offset, &byte) in framed.iter().enumerate() {
        if escaped {
            match byte {
                ESC_END => decoded.put_u8(END),
                ESC_ESC => decoded.put_u8(ESC),
                other => return Err(FrameError::InvalidEscape { byte: other, offset }),
            }
            escaped = false;
            continue;
        }

        match byte {
            END if decoded.is_empty() => {}
            END => break,
            ESC => escaped = true,
            other => decoded.put_u8(other),
        }
    }

    if escaped {
        return Err(FrameError::TruncatedEscape);
    }
    Ok(decoded.freeze())
}

/// Extract the next frame from an accumulating stream buffer.
///
/// Returns `Ok(None)` until a terminating `END` has been buffered. Empty frames
/// (back-to-back `END`s) are skipped. A malformed frame is consumed before the
/// error is returned, so the caller can keep reading and the stream
/// resynchronises on the next `END`.
pub fn decode_slip_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    let leading = src.iter().take_while(|b| **b == END).count();
    src.advance(leading);

    let Some(end) = src.iter().position(|b| *b == END) else {
        // Worst case every payload byte is escaped.
        let limit = max_payload.saturating_mul(2);
        if src.len() > limit {
            let size = src.len();
            src.clear();
            return Err(FrameError::PayloadTooLarge {
                size,
                max: max_payload,
            });
        }
        return Ok(None);
    };

    let body = src.split_to(end);
    src.advance(1);

    let payload = decode(&body)?;
    if payload.len() > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }
    Ok(Some(payload))
}
