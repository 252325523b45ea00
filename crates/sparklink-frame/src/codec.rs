use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::slip;

/// Length prefix: payload size as a 4-byte big-endian integer.
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// How payloads are delimited on a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// 4-byte big-endian length followed by the payload (simulator TCP link).
    #[default]
    LengthPrefixed,
    /// SLIP byte stuffing (serial links).
    Slip,
}

impl Framing {
    /// Append one framed payload to `dst`.
    pub fn encode(&self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        match self {
            Framing::LengthPrefixed => encode_frame(payload, dst),
            Framing::Slip => {
                slip::encode_into(payload, dst);
                Ok(())
            }
        }
    }

    /// Take the next complete payload out of `src`, if one is buffered.
    pub fn decode(&self, src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
        match self {
            Framing::LengthPrefixed => decode_frame(src, max_payload),
            Framing::Slip => slip::decode_slip_frame(src, max_payload),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Framing::LengthPrefixed => "length",
            Framing::Slip => "slip",
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "length" | "length-prefixed" | "tcp" => Ok(Framing::LengthPrefixed),
            "slip" | "serial" => Ok(Framing::Slip),
            other => Err(format!(
                "unknown framing '{other}' (expected 'length' or 'slip')"
            )),
        }
    }
}

/// Encode a payload with its length prefix.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────────┐
/// │ Length (4B)  │ Payload          │
/// │ big-endian   │ (Length bytes)   │
/// └──────────────┴─────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a length-prefixed payload from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let payload_len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Configuration shared by [`FrameReader`](crate::FrameReader) and
/// [`FrameWriter`](crate::FrameWriter).
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Wire framing. Default: length-prefixed.
    pub framing: Framing,
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl FrameConfig {
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"(time (now 12.34))(GS (t 0.00) (pm BeforeKickOff))";

        encode_frame(payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());
        assert_eq!(&buf[..4], &(payload.len() as u32).to_be_bytes());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_header() {
        let mut buf = BytesMut::from(&[0u8, 0][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_partial_payload() {
        let mut full = BytesMut::new();
        encode_frame(b"(beam 1 2 3)", &mut full).unwrap();

        let mut buf = BytesMut::from(&full[..7]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());

        buf.extend_from_slice(&full[7..]);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"(beam 1 2 3)");
    }

    #[test]
    fn test_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(4096);
        let err = decode_frame(&mut buf, 1024).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 4096,
                max: 1024
            }
        ));
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0, 0, 0, 0]);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_framing_dispatch() {
        for framing in [Framing::LengthPrefixed, Framing::Slip] {
            let mut buf = BytesMut::new();
            framing.encode(b"(syn)", &mut buf).unwrap();
            framing.encode(b"(say hi)", &mut buf).unwrap();

            let first = framing.decode(&mut buf, 1024).unwrap().unwrap();
            let second = framing.decode(&mut buf, 1024).unwrap().unwrap();
            assert_eq!(first.as_ref(), b"(syn)", "{framing}");
            assert_eq!(second.as_ref(), b"(say hi)", "{framing}");
            assert!(framing.decode(&mut buf, 1024).unwrap().is_none());
        }
    }

    #[test]
    fn test_framing_from_str() {
        assert_eq!("slip".parse::<Framing>().unwrap(), Framing::Slip);
        assert_eq!("LENGTH".parse::<Framing>().unwrap(), Framing::LengthPrefixed);
        assert_eq!("tcp".parse::<Framing>().unwrap(), Framing::LengthPrefixed);
        assert!("cobs".parse::<Framing>().is_err());
        assert_eq!(Framing::Slip.to_string(), "slip");
    }

    #[test]
    fn test_config_builders() {
        let config = FrameConfig::default()
            .with_framing(Framing::Slip)
            .with_max_payload_size(64)
            .with_read_timeout(Some(Duration::from_millis(20)));
        assert_eq!(config.framing, Framing::Slip);
        assert_eq!(config.max_payload_size, 64);
        assert_eq!(config.read_timeout, Some(Duration::from_millis(20)));
        assert_eq!(config.write_timeout, None);
    }
}
