use std::io;
use std::io::Read;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::protocol::MessageFraming;
use crate::throttle::ThrottledBuffer;

/// The entity of a request, read by the handler on its worker thread.
///
/// Reads block until the connection has pumped more bytes into the throttled
/// buffer behind this body. Reading slowly is fine: once the buffer reaches its
/// high watermark the connection stops reading the socket until the handler
/// catches up. Dropping the body without reading it to the end tells the
/// connection nobody wants the rest, which is then drained or the connection closed.
#[derive(Debug)]
pub struct ReqBody {
    framing: MessageFraming,
    reader: Option<EntityReader>,
}

impl ReqBody {
    pub fn empty() -> Self {
        Self { framing: MessageFraming::Empty, reader: None }
    }

    pub(crate) fn throttled(framing: MessageFraming, buffer: Arc<ThrottledBuffer>) -> Self {
        Self { framing, reader: Some(EntityReader::new(buffer)) }
    }

    pub fn framing(&self) -> MessageFraming {
        self.framing
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_none()
    }

    /// How many times the connection had to stop reading because this body was
    /// not read fast enough.
    pub fn suspensions(&self) -> u64 {
        self.reader.as_ref().map_or(0, EntityReader::suspensions)
    }

    /// Reads the whole entity into memory.
    pub fn read_to_bytes(&mut self) -> io::Result<Bytes> {
        let mut bytes = match self.framing.declared_length() {
            Some(length) => BytesMut::with_capacity(usize::try_from(length).unwrap_or(0).min(64 * 1024)),
            None => BytesMut::new(),
        };

        let mut buf = [0u8; 8 * 1024];
        loop {
            match self.read(&mut buf)? {
                0 => return Ok(bytes.freeze()),
                n => bytes.extend_from_slice(&buf[..n]),
            }
        }
    }
}

impl Read for ReqBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.reader {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

/// The consumer end of an entity's throttled buffer.
///
/// Blocking reads for worker threads. Dropping the reader abandons the entity,
/// which releases the connection from pumping the rest of it.
#[derive(Debug)]
pub struct EntityReader {
    buffer: Arc<ThrottledBuffer>,
}

impl EntityReader {
    pub(crate) fn new(buffer: Arc<ThrottledBuffer>) -> Self {
        Self { buffer }
    }

    pub fn suspensions(&self) -> u64 {
        self.buffer.suspensions()
    }
}

impl Read for EntityReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read_blocking(buf)
    }
}

impl Drop for EntityReader {
    fn drop(&mut self) {
        self.buffer.abandon();
    }
}
