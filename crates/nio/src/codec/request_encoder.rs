//! HTTP request encoder used by the client connection.

use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::RequestHeaderEncoder;
use crate::protocol::{Message, MessageFraming, RequestHeader, SendError};

/// Encodes a request header followed by its payload items, finished by `Eof`.
#[derive(Debug, Default)]
pub struct RequestEncoder {
    header_encoder: RequestHeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<D: Buf> Encoder<Message<(RequestHeader, MessageFraming), D>> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(RequestHeader, MessageFraming), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((header, framing)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive request header");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.header_encoder.encode((header, framing), dst)?;
                self.payload_encoder = Some(PayloadEncoder::from(framing));
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect request header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);
                if is_eof {
                    self.payload_encoder.take();
                }
                result
            }
        }
    }
}
