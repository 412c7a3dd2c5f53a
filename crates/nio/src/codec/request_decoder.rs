//! HTTP request decoder module
//!
//! This module provides functionality for decoding HTTP requests using a streaming approach.
//! It handles both header parsing and payload decoding through a state machine pattern.
//!
//! # Components
//!
//! - [`RequestDecoder`]: Main decoder that coordinates header and payload parsing
//! - Header parsing: Uses [`HeaderDecoder`] for parsing request headers
//! - Payload handling: Uses [`PayloadDecoder`] for handling request bodies if any
//!
//! # Example
//!
//! ```no_run
//! use micro_nio::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::new();
//! // ... add request data to buffer ...
//! let result = decoder.decode(&mut buffer);
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, MessageFraming, ParseError, PayloadItem, RequestHeader};
use crate::throttle::PayloadLimit;

/// A decoder for HTTP requests that handles both headers and payload
///
/// The decoder operates in two phases:
/// 1. Header parsing: Decodes the request headers using [`HeaderDecoder`]
/// 2. Payload parsing: Decodes the request body using [`PayloadDecoder`], finishing
///    with [`PayloadItem::Eof`]. Requests without a body skip this phase.
///
/// # State Machine
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: Currently parsing headers
/// - `Some(PayloadDecoder)`: Currently parsing payload
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
    payload_limit: usize,
}

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns true while the decoder is in the middle of a request entity.
    pub fn in_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder, payload_decoder: None, payload_limit: usize::MAX }
    }
}

impl PayloadLimit for RequestDecoder {
    fn set_payload_limit(&mut self, limit: usize) {
        self.payload_limit = limit;
        if let Some(payload_decoder) = &mut self.payload_decoder {
            payload_decoder.set_limit(limit);
        }
    }
}

impl RequestDecoder {
    fn decode_payload(
        &mut self,
        src: &mut BytesMut,
        at_eof: bool,
    ) -> Result<Option<Message<(RequestHeader, MessageFraming)>>, ParseError> {
        let Some(payload_decoder) = &mut self.payload_decoder else {
            return Ok(None);
        };

        let item = if at_eof { payload_decoder.decode_eof(src)? } else { payload_decoder.decode(src)? };
        let message = match item {
            Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
            Some(item @ PayloadItem::Eof) => {
                // no need payload decoder in this request now
                self.payload_decoder.take();
                Some(Message::Payload(item))
            }
            None => None,
        };
        Ok(message)
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, MessageFraming)>;
    type Error = ParseError;

    /// Attempts to decode an HTTP request from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: Successfully decoded request headers
    /// - `Ok(Some(Message::Payload(_)))`: Successfully decoded a payload chunk
    /// - `Ok(None)`: Need more data to proceed
    /// - `Err(_)`: Encountered a parsing error
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // parse payload if have payload_decoder
        if self.payload_decoder.is_some() {
            return self.decode_payload(src, false);
        }

        // parse request
        let message = match self.header_decoder.decode(src)? {
            Some((header, framing)) => {
                // a request without entity is complete with its header
                if !framing.is_empty() {
                    let mut payload_decoder = PayloadDecoder::from(framing);
                    payload_decoder.set_limit(self.payload_limit);
                    self.payload_decoder = Some(payload_decoder);
                }
                Some(Message::Header((header, framing)))
            }
            None => None,
        };

        Ok(message)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.payload_decoder.is_some() {
            return self.decode_payload(src, true);
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::invalid_header("connection closed inside a request header")),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::Method;
    use indoc::indoc;

    use super::*;

    fn header(message: Message<(RequestHeader, MessageFraming)>) -> (RequestHeader, MessageFraming) {
        match message {
            Message::Header(header) => header,
            Message::Payload(_) => panic!("expect header"),
        }
    }

    fn payload(message: Message<(RequestHeader, MessageFraming)>) -> PayloadItem {
        match message {
            Message::Payload(item) => item,
            Message::Header(_) => panic!("expect payload"),
        }
    }

    #[test]
    fn get_without_body_has_no_payload() {
        let mut buffer = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\nGET /next HTTP/1.1\r\n\r\n");
        let mut decoder = RequestDecoder::new();

        let (head, framing) = header(decoder.decode(&mut buffer).unwrap().unwrap());
        assert_eq!(head.method(), &Method::GET);
        assert_eq!(framing, MessageFraming::Empty);
        assert!(!decoder.in_payload());

        let (head, _) = header(decoder.decode(&mut buffer).unwrap().unwrap());
        assert_eq!(head.uri().path(), "/next");
    }

    #[test]
    fn chunked_body_respects_limit() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Transfer-Encoding: chunked

        a
        0123456789
        0

        "##};
        let mut buffer = BytesMut::from(str.replace('\n', "\r\n").as_str());
        let mut decoder = RequestDecoder::new();

        let (_, framing) = header(decoder.decode(&mut buffer).unwrap().unwrap());
        assert_eq!(framing, MessageFraming::Chunked);

        decoder.set_payload_limit(4);
        let chunk = payload(decoder.decode(&mut buffer).unwrap().unwrap());
        assert_eq!(chunk.into_bytes().unwrap(), Bytes::from_static(b"0123"));

        decoder.set_payload_limit(usize::MAX);
        let chunk = payload(decoder.decode(&mut buffer).unwrap().unwrap());
        assert_eq!(chunk.into_bytes().unwrap(), Bytes::from_static(b"456789"));
        assert!(payload(decoder.decode(&mut buffer).unwrap().unwrap()).is_eof());
    }

    #[test]
    fn limit_applies_to_the_next_entity() {
        let mut buffer = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 6\r\n\r\nabcdef");
        let mut decoder = RequestDecoder::new();
        decoder.set_payload_limit(2);

        header(decoder.decode(&mut buffer).unwrap().unwrap());
        let chunk = payload(decoder.decode(&mut buffer).unwrap().unwrap());
        assert_eq!(chunk.into_bytes().unwrap().len(), 2);
    }

    #[test]
    fn identity_request_is_rejected() {
        let mut buffer = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\nabc");
        let result = RequestDecoder::new().decode(&mut buffer);
        assert!(matches!(result, Err(ParseError::IndeterminateEntity { .. })));
    }

    #[test]
    fn truncated_header_at_eof() {
        let mut buffer = BytesMut::from("GET / HTTP/1.1\r\nHost: loc");
        let result = RequestDecoder::new().decode_eof(&mut buffer);
        assert!(matches!(result, Err(ParseError::InvalidHeader { .. })));
    }
}
