use std::io;
use std::io::Read;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};

use crate::protocol::body::EntityReader;

/// Reads a response entity on a worker thread.
///
/// `entity` blocks until the connection has pumped more bytes. Returning before
/// the end of the entity is allowed: the connection drains the rest, or closes
/// when too much is left.
pub trait EntityConsumer: Send {
    fn consume(&mut self, status: StatusCode, headers: &HeaderMap, entity: &mut EntityReader) -> io::Result<Bytes>;
}

/// Collects the whole entity in memory.
#[derive(Debug, Clone, Copy)]
pub struct CollectingConsumer {
    read_size: usize,
}

impl CollectingConsumer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads in steps of at most `read_size` bytes.
    pub fn with_read_size(read_size: usize) -> Self {
        Self { read_size: read_size.max(1) }
    }
}

impl Default for CollectingConsumer {
    fn default() -> Self {
        Self { read_size: 8 * 1024 }
    }
}

impl EntityConsumer for CollectingConsumer {
    fn consume(&mut self, _status: StatusCode, headers: &HeaderMap, entity: &mut EntityReader) -> io::Result<Bytes> {
        let capacity = headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0)
            .min(64 * 1024);

        let mut collected = BytesMut::with_capacity(capacity);
        let mut buf = vec![0u8; self.read_size];
        loop {
            match entity.read(&mut buf)? {
                0 => return Ok(collected.freeze()),
                n => collected.extend_from_slice(&buf[..n]),
            }
        }
    }
}
