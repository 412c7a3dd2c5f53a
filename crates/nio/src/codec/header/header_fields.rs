//! Header field handling shared by the request and response header codecs.

use std::io;
use std::io::Write;
use std::mem::MaybeUninit;

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, header};

use crate::protocol::{MessageFraming, ParseError};

/// Maximum number of headers allowed in a message
pub(crate) const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
pub(crate) const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Initial buffer size reserved when serializing a header section
pub(crate) const INIT_HEADER_SIZE: usize = 4 * 1024;

pub(crate) type UninitHeaders<'buf> = [MaybeUninit<httparse::Header<'buf>>; MAX_HEADER_NUM];

pub(crate) const fn uninit_headers<'buf>() -> UninitHeaders<'buf> {
    [const { MaybeUninit::uninit() }; MAX_HEADER_NUM]
}

/// Byte ranges of a header's name and value within the parsed buffer.
///
/// Recording ranges lets the parsed buffer be frozen into `Bytes` afterwards, so
/// that header values share it instead of being copied.
#[derive(Clone, Copy)]
pub(crate) struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

pub(crate) const EMPTY_HEADER_INDEX_ARRAY: [HeaderIndex; MAX_HEADER_NUM] =
    [HeaderIndex { name: (0, 0), value: (0, 0) }; MAX_HEADER_NUM];

impl HeaderIndex {
    pub(crate) fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            indices.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            indices.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Appends the recorded headers of `header_bytes` to `headers`, keeping their
/// order and duplicates.
pub(crate) fn fill_headers(header_bytes: &Bytes, indices: &[HeaderIndex], headers: &mut HeaderMap) -> Result<(), ParseError> {
    headers.reserve(indices.len());
    for index in indices {
        let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
            .map_err(ParseError::invalid_header)?;
        headers.append(name, value);
    }
    Ok(())
}

/// Determines the framing declared by `Transfer-Encoding` and `Content-Length`.
///
/// Returns `None` when neither header is present; what that means depends on
/// whether the message is a request or a response.
///
/// refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length
pub(crate) fn declared_framing(headers: &HeaderMap) -> Result<Option<MessageFraming>, ParseError> {
    let te_header = headers.get_all(header::TRANSFER_ENCODING).iter().last();
    let mut cl_values = headers.get_all(header::CONTENT_LENGTH).iter();

    match (te_header, cl_values.next()) {
        (None, None) => Ok(None),

        (Some(te_value), None) => {
            if is_chunked(Some(te_value)) {
                Ok(Some(MessageFraming::Chunked))
            } else {
                Ok(Some(MessageFraming::Identity))
            }
        }

        (None, Some(cl_value)) => {
            let length = parse_content_length(cl_value)?;
            for other in cl_values {
                if parse_content_length(other)? != length {
                    return Err(ParseError::invalid_content_length("multiple content-length values differ"));
                }
            }
            Ok(Some(MessageFraming::ContentLength(length)))
        }

        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers"))
        }
    }
}

fn parse_content_length(value: &HeaderValue) -> Result<u64, ParseError> {
    let cl_str = value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;
    cl_str.trim().parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))
}

/// Checks if the Transfer-Encoding header ends with the chunked coding.
///
/// Chunked must be the last coding applied, anything after it means the entity
/// is delimited by closing the connection.
pub(crate) fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value
        && let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next()
    {
        return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
    }
    false
}

/// Rewrites the framing headers of an outgoing message so they match `framing`.
pub(crate) fn apply_framing(headers: &mut HeaderMap, framing: MessageFraming, entity_allowed: bool) {
    const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");
    const ZERO: HeaderValue = HeaderValue::from_static("0");

    match framing {
        MessageFraming::ContentLength(n) => {
            headers.remove(header::TRANSFER_ENCODING);
            headers.insert(header::CONTENT_LENGTH, n.into());
        }
        MessageFraming::Chunked => {
            headers.remove(header::CONTENT_LENGTH);
            headers.insert(header::TRANSFER_ENCODING, CHUNKED);
        }
        MessageFraming::Identity => {
            headers.remove(header::CONTENT_LENGTH);
            headers.remove(header::TRANSFER_ENCODING);
        }
        MessageFraming::Empty => {
            headers.remove(header::TRANSFER_ENCODING);
            if entity_allowed {
                headers.insert(header::CONTENT_LENGTH, ZERO);
            } else {
                headers.remove(header::CONTENT_LENGTH);
            }
        }
    }
}

/// Writes all header fields followed by the empty line ending the header section.
pub(crate) fn write_fields(headers: &HeaderMap, dst: &mut BytesMut) {
    for (header_name, header_value) in headers {
        dst.put_slice(header_name.as_ref());
        dst.put_slice(b": ");
        dst.put_slice(header_value.as_ref());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

/// Writes formatted output straight into a `BytesMut`.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
