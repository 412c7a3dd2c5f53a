//! Encoder for HTTP request headers, used by the client connection.

use std::io;
use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use http::Version;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::header::header_fields::{FastWrite, INIT_HEADER_SIZE, apply_framing, write_fields};
use crate::protocol::{MessageFraming, RequestHeader, SendError};

#[derive(Debug, Default)]
pub struct RequestHeaderEncoder;

impl Encoder<(RequestHeader, MessageFraming)> for RequestHeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (RequestHeader, MessageFraming), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, framing) = item;

        if framing.is_identity() {
            return Err(SendError::invalid_body("a request entity must declare its length or be chunked"));
        }

        let version = match header.version() {
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        let target = header.uri().path_and_query().map_or("/", |path_and_query| path_and_query.as_str());

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {target} {version}\r\n", header.method())?;

        // a request without entity carries no framing headers at all
        if framing != MessageFraming::Empty {
            apply_framing(header.headers_mut(), framing, true);
        }
        write_fields(header.headers(), dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, Request, header};

    use super::*;

    #[test]
    fn encodes_request_line_and_framing() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/abcx3?q=1")
            .header(header::HOST, "localhost")
            .body(())
            .unwrap();
        let mut dst = BytesMut::new();
        RequestHeaderEncoder.encode((request.into(), MessageFraming::Chunked), &mut dst).unwrap();
        assert_eq!(&dst[..], &b"POST /abcx3?q=1 HTTP/1.1\r\nhost: localhost\r\ntransfer-encoding: chunked\r\n\r\n"[..]);
    }

    #[test]
    fn identity_request_is_refused() {
        let request = Request::builder().uri("/").body(()).unwrap();
        let result = RequestHeaderEncoder.encode((request.into(), MessageFraming::Identity), &mut BytesMut::new());
        assert!(matches!(result, Err(SendError::InvalidBody { .. })));
    }
}
