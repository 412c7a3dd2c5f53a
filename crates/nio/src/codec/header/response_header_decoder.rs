//! Decoder for HTTP response headers, used by the client connection.

use bytes::BytesMut;
use http::{Method, Response, StatusCode};
use httparse::{Error, ParserConfig, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::header::header_fields::{
    EMPTY_HEADER_INDEX_ARRAY, HeaderIndex, MAX_HEADER_BYTES, MAX_HEADER_NUM, declared_framing, fill_headers, uninit_headers,
};
use crate::ensure;
use crate::protocol::{MessageFraming, ParseError, ResponseHead, status_allows_entity};

/// Decodes a response header and the framing of the entity following it.
///
/// Whether a response carries an entity depends on the request it answers, so the
/// decoder must be told the method of that request before each response.
#[derive(Debug, Default)]
pub struct ResponseHeaderDecoder {
    request_method: Option<Method>,
}

impl ResponseHeaderDecoder {
    pub fn expect_response_to(&mut self, method: Method) {
        self.request_method = Some(method);
    }

    fn framing(&self, head: &ResponseHead) -> Result<MessageFraming, ParseError> {
        let status = head.status();
        if !status_allows_entity(status) || self.request_method.as_ref() == Some(&Method::HEAD) {
            return Ok(MessageFraming::Empty);
        }

        // a response without length or chunking runs until the connection closes
        Ok(declared_framing(head.headers())?.unwrap_or(MessageFraming::Identity))
    }
}

impl Decoder for ResponseHeaderDecoder {
    type Item = (ResponseHead, MessageFraming);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // "HTTP/1.1 200 \r\n\r\n"
        if src.len() < 17 {
            return Ok(None);
        }

        let mut resp = httparse::Response::new(&mut []);
        let mut headers = uninit_headers();

        let parsed_result = ParserConfig::default().parse_response_with_uninit_headers(&mut resp, src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed response header");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let header_count = resp.headers.len();
                let mut header_index = EMPTY_HEADER_INDEX_ARRAY;
                HeaderIndex::record(src, resp.headers, &mut header_index);

                let version = match resp.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    _ => return Err(ParseError::InvalidVersion(resp.version)),
                };
                let status = resp
                    .code
                    .and_then(|code| StatusCode::from_u16(code).ok())
                    .ok_or(ParseError::InvalidStatus)?;

                let mut head = Response::new(());
                *head.version_mut() = version;
                *head.status_mut() = status;

                let header_bytes = src.split_to(body_offset).freeze();
                fill_headers(&header_bytes, &header_index[..header_count], head.headers_mut())?;

                let framing = self.framing(&head)?;
                Ok(Some((head, framing)))
            }

            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}
