//! Decoder implementation for HTTP message payloads.
//!
//! This module provides a unified decoder for the entity of a message, whatever
//! its [`MessageFraming`]:
//! - Content-Length based payloads
//! - Chunked transfer encoding
//! - Close-delimited (identity) payloads, only legal on responses
//! - Messages with no body

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{MessageFraming, ParseError, PayloadItem};

/// A unified decoder for handling HTTP message payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    /// The specific decoding strategy to use
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),

    /// Everything up to the end of the stream belongs to the payload
    Identity { limit: usize },

    /// Handle messages with no body
    NoBody,
}

impl PayloadDecoder {
    /// Creates a PayloadDecoder for messages with no body.
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// Creates a PayloadDecoder for chunked transfer encoding.
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    /// Creates a PayloadDecoder for a fixed-length payload.
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    /// Creates a PayloadDecoder for a payload delimited by the end of the stream.
    pub fn identity() -> Self {
        Self { kind: Kind::Identity { limit: usize::MAX } }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind, Kind::Identity { .. })
    }

    /// Caps the size of the next payload chunk.
    pub fn set_limit(&mut self, limit: usize) {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.set_limit(limit),
            Kind::Chunked(decoder) => decoder.set_limit(limit),
            Kind::Identity { limit: current } => *current = limit,
            Kind::NoBody => {}
        }
    }
}

impl From<MessageFraming> for PayloadDecoder {
    fn from(framing: MessageFraming) -> Self {
        match framing {
            MessageFraming::ContentLength(0) | MessageFraming::Empty => PayloadDecoder::empty(),
            MessageFraming::ContentLength(length) => PayloadDecoder::fix_length(length),
            MessageFraming::Chunked => PayloadDecoder::chunked(),
            MessageFraming::Identity => PayloadDecoder::identity(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::Identity { limit } => {
                if src.is_empty() || *limit == 0 {
                    return Ok(None);
                }
                let size = src.len().min(*limit);
                Ok(Some(PayloadItem::Chunk(src.split_to(size).freeze())))
            }
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    /// The end of the stream terminates an identity payload. For every other kind
    /// it means the peer went away in the middle of the entity.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if self.is_identity() && src.is_empty() => Ok(Some(PayloadItem::Eof)),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::invalid_body("stream ended inside the entity")),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn from_framing() {
        assert_eq!(PayloadDecoder::from(MessageFraming::Empty), PayloadDecoder::empty());
        assert_eq!(PayloadDecoder::from(MessageFraming::ContentLength(0)), PayloadDecoder::empty());
        assert_eq!(PayloadDecoder::from(MessageFraming::ContentLength(5)), PayloadDecoder::fix_length(5));
        assert_eq!(PayloadDecoder::from(MessageFraming::Chunked), PayloadDecoder::chunked());
        assert!(PayloadDecoder::from(MessageFraming::Identity).is_identity());
    }

    #[test]
    fn no_body_is_eof() {
        let mut buffer = BytesMut::from("GET / HTTP/1.1\r\n");
        let item = PayloadDecoder::empty().decode(&mut buffer).unwrap().unwrap();
        assert!(item.is_eof());
        assert_eq!(buffer.len(), 16);
    }

    #[test]
    fn identity_runs_until_end_of_stream() {
        let mut decoder = PayloadDecoder::identity();
        let mut buffer = BytesMut::from("hello world");

        decoder.set_limit(5);
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.into_bytes().unwrap(), Bytes::from_static(b"hello"));

        decoder.set_limit(usize::MAX);
        let chunk = decoder.decode_eof(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.into_bytes().unwrap(), Bytes::from_static(b" world"));

        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert!(decoder.decode_eof(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn truncated_length_payload() {
        let mut decoder = PayloadDecoder::fix_length(10);
        let mut buffer = BytesMut::from("abc");
        assert_eq!(decoder.decode_eof(&mut buffer).unwrap().unwrap().into_bytes().unwrap().len(), 3);
        assert!(decoder.decode_eof(&mut buffer).unwrap().is_none());
    }
}
