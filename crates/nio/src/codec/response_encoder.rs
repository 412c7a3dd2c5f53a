//! HTTP response encoder, the server side counterpart of [`RequestDecoder`](super::RequestDecoder).

use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, MessageFraming, ResponseHead, SendError};

/// Encodes a response header followed by its payload items.
///
/// Every response must be finished with `Message::Payload(PayloadItem::Eof)`,
/// including interim and bodiless ones. After that the encoder accepts the next
/// response header.
#[derive(Debug)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
    head_only: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Marks the next response as the answer to a HEAD request: its header keeps the
    /// framing fields, but no payload is written.
    pub fn set_head_only(&mut self, head_only: bool) {
        self.head_only = head_only;
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None, head_only: false }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, MessageFraming), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, MessageFraming), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, framing)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let payload_encoder = if self.head_only { PayloadEncoder::empty() } else { PayloadEncoder::from(framing) };
                self.payload_encoder = Some(payload_encoder);
                self.header_encoder.encode((head, framing), dst)
            }

            Message::Payload(payload_item) => {
                let payload_encoder = if let Some(encoder) = &mut self.payload_encoder {
                    encoder
                } else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);

                if is_eof {
                    self.payload_encoder.take();
                    self.head_only = false;
                }

                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Response, StatusCode};

    use super::*;
    use crate::protocol::PayloadItem;

    fn head(status: StatusCode) -> ResponseHead {
        Response::builder().status(status).body(()).unwrap()
    }

    #[test]
    fn full_response() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), MessageFraming::ContentLength(2))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Chunk(Bytes::from_static(b"ok"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof), &mut dst).unwrap();
        assert_eq!(&dst[..], &b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok"[..]);
    }

    #[test]
    fn head_only_keeps_length_but_drops_payload() {
        let mut encoder = ResponseEncoder::new();
        encoder.set_head_only(true);
        let mut dst = BytesMut::new();
        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), MessageFraming::ContentLength(5))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof), &mut dst).unwrap();
        assert_eq!(&dst[..], &b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n"[..]);

        // the flag only applies to one response
        let mut dst = BytesMut::new();
        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), MessageFraming::ContentLength(1))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Chunk(Bytes::from_static(b"x"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof), &mut dst).unwrap();
        assert!(dst.ends_with(b"\r\n\r\nx"));
    }

    #[test]
    fn bodiless_status_still_takes_its_end_marker() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::NO_CONTENT), MessageFraming::Empty)), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Chunk(Bytes::from_static(b"dropped"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        // a payload item with no response in progress is refused
        let stray = encoder.encode(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof), &mut dst);
        assert!(stray.is_err());

        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), MessageFraming::Empty)), &mut dst).unwrap();
        assert!(!dst.windows(7).any(|window| window == b"dropped"));
    }

    #[test]
    fn header_while_payload_pending_is_refused() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();
        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), MessageFraming::Chunked)), &mut dst).unwrap();
        let result = encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), MessageFraming::Chunked)), &mut dst);
        assert!(result.is_err());
    }
}
