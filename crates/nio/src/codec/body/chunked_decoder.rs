//! Decoder for `Transfer-Encoding: chunked` entities, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112.html#name-chunked-transfer-coding).
//!
//! Chunk extensions and trailer fields are validated for line structure and
//! then discarded. Chunk data is handed out in pieces no larger than the
//! current limit, so a throttled consumer never forces the whole chunk into memory.

use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    phase: Phase,
    chunk_left: u64,
    limit: usize,
}

/// Where in the chunked grammar the decoder currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SizeStart,
    SizeDigits,
    SizePadding,
    Extension,
    SizeLineEnd,
    Data,
    DataCr,
    DataLf,
    TrailerStart,
    TrailerLine,
    TrailerLf,
    FinalLf,
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { phase: Phase::SizeStart, chunk_left: 0, limit: usize::MAX }
    }

    /// Caps the size of the next piece of chunk data. Zero pauses the decoder
    /// inside chunk data until the limit is raised again.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Consumes one framing byte and moves to the next phase.
    fn advance(&mut self, byte: u8) -> io::Result<Phase> {
        use Phase::*;

        let next = match (self.phase, byte) {
            (SizeStart, digit) => {
                let value = hex_value(digit).ok_or_else(|| invalid("chunk size line without a size"))?;
                self.chunk_left = u64::from(value);
                SizeDigits
            }

            (SizeDigits, b'\t' | b' ') => SizePadding,
            (SizeDigits, b';') => Extension,
            (SizeDigits, b'\r') => SizeLineEnd,
            (SizeDigits, digit) => {
                let value = hex_value(digit).ok_or_else(|| invalid("invalid chunk size digit"))?;
                self.chunk_left = self
                    .chunk_left
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(u64::from(value)))
                    .ok_or_else(|| invalid("chunk size overflows"))?;
                SizeDigits
            }

            (SizePadding, b'\t' | b' ') => SizePadding,
            (SizePadding, b';') => Extension,
            (SizePadding, b'\r') => SizeLineEnd,
            (SizePadding, _) => return Err(invalid("unexpected byte after chunk size")),

            (Extension, b'\r') => SizeLineEnd,
            (Extension, b'\n') => return Err(invalid("bare LF in chunk extension")),
            (Extension, _) => Extension,

            (SizeLineEnd, b'\n') if self.chunk_left == 0 => TrailerStart,
            (SizeLineEnd, b'\n') => Data,
            (SizeLineEnd, _) => return Err(invalid("chunk size line not terminated by CRLF")),

            (DataCr, b'\r') => DataLf,
            (DataCr, _) => return Err(invalid("chunk data not followed by CR")),
            (DataLf, b'\n') => SizeStart,
            (DataLf, _) => return Err(invalid("chunk data not followed by LF")),

            (TrailerStart, b'\r') => FinalLf,
            (TrailerLine, b'\r') => TrailerLf,
            (TrailerStart | TrailerLine, _) => TrailerLine,
            (TrailerLf, b'\n') => TrailerStart,
            (TrailerLf, _) => return Err(invalid("trailer field not terminated by CRLF")),

            (FinalLf, b'\n') => Done,
            (FinalLf, _) => return Err(invalid("chunked entity not terminated by CRLF")),

            (Data | Done, _) => self.phase,
        };
        Ok(next)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.phase {
                Phase::Done => {
                    trace!("chunked entity complete");
                    return Ok(Some(PayloadItem::Eof));
                }
                Phase::Data => {
                    if src.is_empty() || self.limit == 0 {
                        return Ok(None);
                    }
                    let left = usize::try_from(self.chunk_left).unwrap_or(usize::MAX);
                    let take = left.min(src.len()).min(self.limit);
                    self.chunk_left -= take as u64;
                    if self.chunk_left == 0 {
                        self.phase = Phase::DataCr;
                    }
                    trace!(len = take, "chunk data");
                    return Ok(Some(PayloadItem::Chunk(src.split_to(take).freeze())));
                }
                _ => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let byte = src.get_u8();
                    self.phase = self.advance(byte).map_err(ParseError::invalid_body)?;
                }
            }
        }
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn invalid(message: &'static str) -> io::Error {
    io::Error::new(ErrorKind::InvalidInput, message)
}
