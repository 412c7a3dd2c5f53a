use std::io;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use crate::throttle::{ThrottleConfig, ThrottledBuffer};

/// The entity of a response.
///
/// Besides in-memory bodies, a response can stream its entity from a worker
/// through [`RespBody::channel`]: the worker writes into a [`BodyWriter`] while the
/// connection sends what was written. The writer blocks once the peer falls
/// behind by more than the high watermark.
#[derive(Debug)]
pub struct RespBody {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    Empty,
    Full(Option<Bytes>),
    Channel { buffer: Arc<ThrottledBuffer>, length: Option<u64> },
}

impl RespBody {
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    pub fn full<B: Into<Bytes>>(bytes: B) -> Self {
        Self { kind: Kind::Full(Some(bytes.into())) }
    }

    /// Creates a streamed body and its writer, with the default watermarks.
    ///
    /// With a known `length` the response is sent with a `Content-Length`, otherwise
    /// it is chunked (or delimited by closing the connection for HTTP/1.0 peers).
    pub fn channel(length: Option<u64>) -> (RespBody, BodyWriter) {
        Self::channel_with(ThrottleConfig::default(), length)
    }

    pub fn channel_with(config: ThrottleConfig, length: Option<u64>) -> (RespBody, BodyWriter) {
        let buffer = Arc::new(ThrottledBuffer::new(config));
        let writer = BodyWriter { buffer: Arc::clone(&buffer), finished: false };
        (Self { kind: Kind::Channel { buffer, length } }, writer)
    }
}

impl Default for RespBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl Body for RespBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().kind {
            Kind::Empty => Poll::Ready(None),
            Kind::Full(bytes) => Poll::Ready(bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Channel { buffer, .. } => buffer.poll_chunk(cx).map(|chunk| chunk.map(|result| result.map(Frame::data))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Empty => true,
            Kind::Full(bytes) => bytes.is_none(),
            Kind::Channel { .. } => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Empty | Kind::Full(None) => SizeHint::with_exact(0),
            Kind::Full(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Channel { length: Some(length), .. } => SizeHint::with_exact(*length),
            Kind::Channel { length: None, .. } => SizeHint::new(),
        }
    }
}

impl Drop for RespBody {
    fn drop(&mut self) {
        if let Kind::Channel { buffer, .. } = &self.kind {
            buffer.abandon();
        }
    }
}

impl From<()> for RespBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<Bytes> for RespBody {
    fn from(bytes: Bytes) -> Self {
        Self::full(bytes)
    }
}

impl From<String> for RespBody {
    fn from(s: String) -> Self {
        Self::full(s)
    }
}

impl From<&'static str> for RespBody {
    fn from(s: &'static str) -> Self {
        Self::full(s)
    }
}

impl From<Vec<u8>> for RespBody {
    fn from(v: Vec<u8>) -> Self {
        Self::full(v)
    }
}

impl From<http_body_util::Empty<Bytes>> for RespBody {
    fn from(_: http_body_util::Empty<Bytes>) -> Self {
        Self::empty()
    }
}

/// The producing end of [`RespBody::channel`].
///
/// Meant to be used from a worker thread: writes block while the connection is
/// behind. Call [`BodyWriter::finish`] when done. A writer dropped while its
/// thread is panicking marks the entity as failed, so a truncated entity is never
/// mistaken for a complete one.
#[derive(Debug)]
pub struct BodyWriter {
    buffer: Arc<ThrottledBuffer>,
    finished: bool,
}

impl BodyWriter {
    /// How many times this writer had to wait for the connection to catch up.
    pub fn suspensions(&self) -> u64 {
        self.buffer.suspensions()
    }

    pub fn finish(mut self) {
        self.finished = true;
        self.buffer.finish();
    }
}

impl Write for BodyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write_blocking(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BodyWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            self.buffer.fail("body writer dropped while panicking");
        } else {
            self.buffer.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[tokio::test]
    async fn full_body_yields_once() {
        let mut body = RespBody::from("hello");
        assert_eq!(body.size_hint().exact(), Some(5));
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"hello"));
        assert!(body.frame().await.is_none());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn channel_body_streams_from_thread() {
        let (body, mut writer) = RespBody::channel_with(ThrottleConfig { high_watermark: 8, low_watermark: 2 }, None);
        assert_eq!(body.size_hint().exact(), None);

        let worker = std::thread::spawn(move || {
            writer.write_all(b"streamed response entity").unwrap();
            writer.finish();
        });

        let collected = body.collect().await.unwrap().to_bytes();
        worker.join().unwrap();
        assert_eq!(&collected[..], b"streamed response entity");
    }

    #[test]
    fn dropped_body_breaks_writer() {
        let (body, mut writer) = RespBody::channel(Some(3));
        drop(body);
        let err = writer.write(b"abc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
