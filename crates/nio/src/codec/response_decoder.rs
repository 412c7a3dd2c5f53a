//! HTTP response decoder used by the client connection.

use bytes::BytesMut;
use http::Method;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::ResponseHeaderDecoder;
use crate::protocol::{Message, MessageFraming, ParseError, PayloadItem, ResponseHead};
use crate::throttle::PayloadLimit;

/// Decodes a response header followed by its payload, finishing with `Eof`.
/// Responses without entity, interim ones included, consist of the header alone.
///
/// The method of the request being answered must be announced with
/// [`expect_response_to`](Self::expect_response_to), since a response to HEAD
/// declares a length it never sends.
#[derive(Debug)]
pub struct ResponseDecoder {
    header_decoder: ResponseHeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
    payload_limit: usize,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn expect_response_to(&mut self, method: Method) {
        self.header_decoder.expect_response_to(method);
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self { header_decoder: ResponseHeaderDecoder::default(), payload_decoder: None, payload_limit: usize::MAX }
    }
}

impl PayloadLimit for ResponseDecoder {
    fn set_payload_limit(&mut self, limit: usize) {
        self.payload_limit = limit;
        if let Some(payload_decoder) = &mut self.payload_decoder {
            payload_decoder.set_limit(limit);
        }
    }
}

impl ResponseDecoder {
    fn decode_message(
        &mut self,
        src: &mut BytesMut,
        at_eof: bool,
    ) -> Result<Option<Message<(ResponseHead, MessageFraming)>>, ParseError> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = if at_eof { payload_decoder.decode_eof(src)? } else { payload_decoder.decode(src)? };
            return Ok(match item {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            });
        }

        match self.header_decoder.decode(src)? {
            Some((head, framing)) => {
                if !framing.is_empty() {
                    let mut payload_decoder = PayloadDecoder::from(framing);
                    payload_decoder.set_limit(self.payload_limit);
                    self.payload_decoder = Some(payload_decoder);
                }
                Ok(Some(Message::Header((head, framing))))
            }
            None if at_eof && !src.is_empty() => {
                Err(ParseError::invalid_header("connection closed inside a response header"))
            }
            None => Ok(None),
        }
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHead, MessageFraming)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decode_message(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decode_message(src, true)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;

    fn next(decoder: &mut ResponseDecoder, src: &mut BytesMut) -> Message<(ResponseHead, MessageFraming)> {
        decoder.decode(src).unwrap().unwrap()
    }

    #[test]
    fn interim_then_final_response() {
        let mut src = BytesMut::from("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
        let mut decoder = ResponseDecoder::new();
        decoder.expect_response_to(Method::POST);

        let Message::Header((head, framing)) = next(&mut decoder, &mut src) else { panic!("expect header") };
        assert_eq!(head.status(), StatusCode::CONTINUE);
        assert_eq!(framing, MessageFraming::Empty);

        let Message::Header((head, _)) = next(&mut decoder, &mut src) else { panic!("expect header") };
        assert_eq!(head.status(), StatusCode::OK);
        let Message::Payload(PayloadItem::Chunk(bytes)) = next(&mut decoder, &mut src) else { panic!("expect chunk") };
        assert_eq!(bytes, Bytes::from_static(b"ok"));
        assert!(matches!(next(&mut decoder, &mut src), Message::Payload(PayloadItem::Eof)));
    }

    #[test]
    fn close_delimited_body_ends_at_eof() {
        let mut src = BytesMut::from("HTTP/1.0 200 OK\r\n\r\nuntil close");
        let mut decoder = ResponseDecoder::new();
        decoder.expect_response_to(Method::GET);

        let Message::Header((_, framing)) = next(&mut decoder, &mut src) else { panic!("expect header") };
        assert_eq!(framing, MessageFraming::Identity);
        let Message::Payload(PayloadItem::Chunk(bytes)) = next(&mut decoder, &mut src) else { panic!("expect chunk") };
        assert_eq!(&bytes[..], b"until close");
        assert!(decoder.decode(&mut src).unwrap().is_none());
        assert!(matches!(decoder.decode_eof(&mut src).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
    }
}
