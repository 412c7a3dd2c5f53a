//! Encoder for HTTP response headers.
//!
//! Writes the status line and header fields, rewriting `Content-Length` and
//! `Transfer-Encoding` so that they match the framing chosen for the entity.

use std::io;
use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use http::Version;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::header::header_fields::{FastWrite, INIT_HEADER_SIZE, apply_framing, write_fields};
use crate::protocol::{MessageFraming, ResponseHead, SendError, status_allows_entity};

/// Encoder for HTTP response headers implementing the [`Encoder`] trait.
#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, MessageFraming)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, MessageFraming), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, framing) = item;

        let version = match header.version() {
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        dst.reserve(INIT_HEADER_SIZE);
        let status = header.status();
        write!(FastWrite(dst), "{version} {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or("<none>"))?;

        apply_framing(header.headers_mut(), framing, status_allows_entity(status));
        write_fields(header.headers(), dst);
        Ok(())
    }
}
