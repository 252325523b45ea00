use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{FrameConfig, Framing, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// `tokio_util` codec for either wire framing.
///
/// Use with `FramedRead`/`FramedWrite`/`Framed` over any async byte stream.
#[derive(Debug, Clone)]
pub struct WireCodec {
    framing: Framing,
    max_payload_size: usize,
}

impl WireCodec {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(Framing::default())
    }
}

impl From<&FrameConfig> for WireCodec {
    fn from(config: &FrameConfig) -> Self {
        Self::new(config.framing).with_max_payload_size(config.max_payload_size)
    }
}

impl Decoder for WireCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.framing.decode(src, self.max_payload_size)
    }
}

impl Encoder<Bytes> for WireCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.max_payload_size,
            });
        }
        self.framing.encode(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::slip;

    #[tokio::test]
    async fn framed_roundtrip_length_prefixed() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(client, WireCodec::default());
        let mut stream = FramedRead::new(server, WireCodec::default());

        sink.send(Bytes::from_static(b"(scene rsg/agent/nao/nao.rsg)"))
            .await
            .unwrap();
        sink.send(Bytes::from_static(b"(init (unum 0))")).await.unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), b"(scene rsg/agent/nao/nao.rsg)");
        assert_eq!(second.as_ref(), b"(init (unum 0))");
    }

    #[tokio::test]
    async fn framed_roundtrip_slip() {
        let (client, server) = tokio::io::duplex(1024);
        let payload = Bytes::from_static(&[b'a', slip::END, b'z', slip::ESC, b'd']);

        let mut sink = FramedWrite::new(client, WireCodec::new(Framing::Slip));
        let mut stream = FramedRead::new(server, WireCodec::new(Framing::Slip));

        sink.send(payload.clone()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), payload);
    }

    #[tokio::test]
    async fn encoder_rejects_oversized() {
        let mut codec = WireCodec::default().with_max_payload_size(2);
        let mut dst = BytesMut::new();
        let err = codec.encode(Bytes::from_static(b"abc"), &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 3, max: 2 }));
        assert!(dst.is_empty());
    }

    #[test]
    fn from_config() {
        let config = FrameConfig::default()
            .with_framing(Framing::Slip)
            .with_max_payload_size(99);
        let codec = WireCodec::from(&config);
        assert_eq!(codec.framing(), Framing::Slip);
        assert_eq!(codec.max_payload_size, 99);
    }
}
