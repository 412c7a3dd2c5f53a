//! Decoder for HTTP request headers.
//!
//! Parses the request line and header fields with `httparse` and determines how the
//! request entity is framed. Header values share the frozen input buffer instead
//! of being copied.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use bytes::BytesMut;
use http::Request;
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::header::header_fields::{
    EMPTY_HEADER_INDEX_ARRAY, HeaderIndex, MAX_HEADER_BYTES, MAX_HEADER_NUM, declared_framing, fill_headers, uninit_headers,
};
use crate::ensure;
use crate::protocol::{MessageFraming, ParseError, RequestHeader};

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
///
/// Yields the parsed [`RequestHeader`] together with the [`MessageFraming`] of the
/// entity following it. A request whose entity could only be delimited by closing
/// the connection is rejected, since the server would have no way to find the
/// start of the next request.
#[derive(Debug, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, MessageFraming);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // "GET / HTTP/1.1\r\n\r\n" is the shortest request worth parsing
        if src.len() < 14 {
            return Ok(None);
        }

        let mut req = httparse::Request::new(&mut []);
        let mut headers = uninit_headers();

        let parsed_result = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed request header");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let header_count = req.headers.len();
                let mut header_index = EMPTY_HEADER_INDEX_ARRAY;
                HeaderIndex::record(src, req.headers, &mut header_index);

                let version = match req.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    _ => return Err(ParseError::InvalidVersion(req.version)),
                };

                let mut request = Request::builder()
                    .method(req.method.ok_or(ParseError::InvalidMethod)?)
                    .uri(req.path.ok_or(ParseError::InvalidUri)?)
                    .version(version)
                    .body(())
                    .map_err(|_| ParseError::InvalidUri)?;

                let header_bytes = src.split_to(body_offset).freeze();
                fill_headers(&header_bytes, &header_index[..header_count], request.headers_mut())?;

                let header = RequestHeader::from(request);
                let framing = request_framing(&header)?;

                Ok(Some((header, framing)))
            }

            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// A request without `Content-Length` or `Transfer-Encoding` has no entity, whatever
/// its method.
fn request_framing(header: &RequestHeader) -> Result<MessageFraming, ParseError> {
    let framing = declared_framing(header.headers())?.unwrap_or(MessageFraming::Empty);
    ensure!(
        framing.is_determinate(),
        ParseError::indeterminate_entity("transfer-encoding of a request must end with chunked")
    );
    Ok(framing)
}
