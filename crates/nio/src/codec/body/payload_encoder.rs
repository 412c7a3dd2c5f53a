use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{MessageFraming, PayloadItem, SendError};

/// encode the payload of an outgoing message according to its framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// content-length payload
    Length(LengthEncoder),

    /// transfer-encoding chunked payload
    Chunked(ChunkedEncoder),

    /// raw bytes, the end of the payload is the end of the connection
    Identity { eof: bool },

    /// have no body with the message
    NoBody,
}

impl PayloadEncoder {
    /// create an empty `PayloadEncoder`
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// create a chunked `PayloadEncoder`
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    /// create a fixed length `PayloadEncoder`
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(size)) }
    }

    /// create a close-delimited `PayloadEncoder`
    pub fn identity() -> Self {
        Self { kind: Kind::Identity { eof: false } }
    }

    pub fn is_finish(&self) -> bool {
        match &self.kind {
            Kind::Length(encoder) => encoder.is_finish(),
            Kind::Chunked(encoder) => encoder.is_finish(),
            Kind::Identity { eof } => *eof,
            Kind::NoBody => true,
        }
    }
}

impl From<MessageFraming> for PayloadEncoder {
    fn from(framing: MessageFraming) -> Self {
        match framing {
            MessageFraming::ContentLength(length) => PayloadEncoder::fix_length(length),
            MessageFraming::Chunked => PayloadEncoder::chunked(),
            MessageFraming::Identity => PayloadEncoder::identity(),
            MessageFraming::Empty => PayloadEncoder::empty(),
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
            Kind::Identity { eof } => {
                match item {
                    PayloadItem::Chunk(bytes) if !*eof => dst.extend_from_slice(bytes.chunk()),
                    PayloadItem::Chunk(_) => {}
                    PayloadItem::Eof => *eof = true,
                }
                Ok(())
            }
            Kind::NoBody => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn no_body_drops_data() {
        let mut encoder = PayloadEncoder::from(MessageFraming::Empty);
        let mut dst = BytesMut::new();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"ignored")), &mut dst).unwrap();
        assert!(dst.is_empty());
        assert!(encoder.is_finish());
    }

    #[test]
    fn identity_writes_raw_bytes() {
        let mut encoder = PayloadEncoder::from(MessageFraming::Identity);
        let mut dst = BytesMut::new();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"raw")), &mut dst).unwrap();
        assert!(!encoder.is_finish());
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();
        assert!(encoder.is_finish());
        assert_eq!(&dst[..], b"raw");
    }
}
