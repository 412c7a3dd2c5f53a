use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::protocol::{PayloadItem, SendError};

/// Writes exactly `length` bytes of payload and rejects anything beyond it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            warn!("encode payload_item but no need to encode anymore");
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(bytes) => {
                if !bytes.has_remaining() {
                    return Ok(());
                }
                let size = bytes.remaining() as u64;
                if size > self.length {
                    return Err(SendError::invalid_body(format!(
                        "entity exceeds its declared length, {} bytes left but got {size}",
                        self.length
                    )));
                }
                dst.extend_from_slice(bytes.chunk());
                self.length -= size;
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                if self.length != 0 {
                    return Err(SendError::invalid_body(format!("entity ended {} bytes short", self.length)));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn writes_exact_length() {
        let mut encoder = LengthEncoder::new(5);
        let mut dst = BytesMut::new();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hel")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"lo")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();
        assert!(encoder.is_finish());
        assert_eq!(&dst[..], b"hello");
    }

    #[test]
    fn rejects_overflow_and_short_entities() {
        let mut dst = BytesMut::new();
        let overflow = LengthEncoder::new(2).encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut dst);
        assert!(matches!(overflow, Err(SendError::InvalidBody { .. })));

        let short = LengthEncoder::new(2).encode(PayloadItem::<Bytes>::Eof, &mut dst);
        assert!(matches!(short, Err(SendError::InvalidBody { .. })));
    }
}
