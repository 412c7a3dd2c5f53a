use std::collections::VecDeque;
use std::io;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::task::AtomicWaker;
use tracing::trace;

use crate::throttle::ThrottleConfig;

/// A bounded single-producer single-consumer byte buffer between the reactor and a worker.
///
/// One side is always the connection's reactor task and never blocks: it polls for
/// room (when producing) or for data (when consuming) and is woken through an
/// [`AtomicWaker`]. The other side is a worker thread that blocks on a [`Condvar`].
///
/// The buffer applies hysteresis between two watermarks. Once the buffered byte
/// count reaches the high watermark the producer is suspended, and it only resumes
/// after the consumer has drained the buffer down to the low watermark. While not
/// suspended the producer is never offered more room than `high - buffered`, so
/// accepted bytes are never dropped and the buffer never grows past the high watermark.
#[derive(Debug)]
pub struct ThrottledBuffer {
    state: Mutex<BufferState>,
    changed: Condvar,
    reactor: AtomicWaker,
    suspensions: AtomicU64,
    config: ThrottleConfig,
}

#[derive(Debug, Default)]
struct BufferState {
    chunks: VecDeque<Bytes>,
    buffered: usize,
    suspended: bool,
    eof: bool,
    failure: Option<String>,
    abandoned: bool,
}

impl ThrottledBuffer {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            changed: Condvar::new(),
            reactor: AtomicWaker::new(),
            suspensions: AtomicU64::new(0),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.changed.notify_all();
        self.reactor.wake();
    }

    /// How many times the producer has been suspended at the high watermark.
    pub fn suspensions(&self) -> u64 {
        self.suspensions.load(Ordering::Relaxed)
    }

    pub fn buffered(&self) -> usize {
        self.lock().buffered
    }

    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    pub fn is_abandoned(&self) -> bool {
        self.lock().abandoned
    }

    /// Room the producer may fill right now.
    ///
    /// Returns `Ready(None)` once the consumer has gone away, in which case the
    /// producer should stop producing altogether.
    pub fn poll_room(&self, cx: &mut Context<'_>) -> Poll<Option<usize>> {
        let state = self.lock();
        if state.abandoned {
            return Poll::Ready(None);
        }

        match self.room(&state) {
            0 => {
                self.reactor.register(cx.waker());
                Poll::Pending
            }
            room => Poll::Ready(Some(room)),
        }
    }

    fn room(&self, state: &BufferState) -> usize {
        if state.suspended { 0 } else { self.config.high_watermark.saturating_sub(state.buffered) }
    }

    fn push_locked(&self, state: &mut BufferState, bytes: Bytes) {
        if state.abandoned || bytes.is_empty() {
            return;
        }

        state.buffered += bytes.len();
        state.chunks.push_back(bytes);
        if !state.suspended && state.buffered >= self.config.high_watermark {
            state.suspended = true;
            self.suspensions.fetch_add(1, Ordering::Relaxed);
            trace!(buffered = state.buffered, "producer suspended at high watermark");
        }
    }

    fn take_locked(&self, state: &mut BufferState, size: usize) {
        state.buffered -= size;
        if state.suspended && state.buffered <= self.config.low_watermark {
            state.suspended = false;
            trace!(buffered = state.buffered, "producer resumed at low watermark");
        }
    }

    /// Appends bytes produced by the reactor. The caller must have asked for room first.
    pub fn push(&self, bytes: Bytes) {
        let mut state = self.lock();
        self.push_locked(&mut state, bytes);
        drop(state);
        self.notify();
    }

    /// Marks the end of the produced data.
    pub fn finish(&self) {
        self.lock().eof = true;
        self.notify();
    }

    /// Ends the produced data with an error that the consumer will observe once it
    /// has read what was buffered before the failure.
    pub fn fail<S: ToString>(&self, reason: S) {
        let mut state = self.lock();
        if !state.eof {
            state.failure = Some(reason.to_string());
        }
        drop(state);
        self.notify();
    }

    /// Called by the consumer when it will not read any further.
    ///
    /// Buffered data is discarded, a blocked producer is released and all later
    /// pushes are ignored.
    pub fn abandon(&self) {
        let mut state = self.lock();
        state.abandoned = true;
        state.chunks.clear();
        state.buffered = 0;
        state.suspended = false;
        drop(state);
        self.notify();
    }

    /// Blocking read used by workers. Returns `Ok(0)` at the end of the data.
    pub fn read_blocking(&self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.lock();
        loop {
            if let Some(front) = state.chunks.front_mut() {
                let size = front.len().min(buf.len());
                buf[..size].copy_from_slice(&front[..size]);
                if size == front.len() {
                    state.chunks.pop_front();
                } else {
                    let _ = front.split_to(size);
                }
                self.take_locked(&mut state, size);
                drop(state);
                self.notify();
                return Ok(size);
            }

            if state.eof {
                return Ok(0);
            }

            if let Some(reason) = &state.failure {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, reason.clone()));
            }

            if state.abandoned {
                return Ok(0);
            }

            state = self.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocking write used by workers producing a response entity.
    ///
    /// Writes at most the room currently available and blocks while the producer
    /// is suspended. Fails with `BrokenPipe` once the reactor stopped consuming.
    pub fn write_blocking(&self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.lock();
        loop {
            if state.abandoned {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "entity consumer has gone away"));
            }

            if state.eof || state.failure.is_some() {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "entity has already been closed"));
            }

            let room = self.room(&state);
            if room > 0 {
                let size = room.min(buf.len());
                self.push_locked(&mut state, Bytes::copy_from_slice(&buf[..size]));
                drop(state);
                self.notify();
                return Ok(size);
            }

            state = self.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Takes the next buffered chunk on the reactor side.
    ///
    /// Yields `None` at the end of the data, or when the producer has gone away
    /// without finishing (which the caller learns through the framing check).
    pub fn poll_chunk(&self, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        let mut state = self.lock();
        if let Some(bytes) = state.chunks.pop_front() {
            self.take_locked(&mut state, bytes.len());
            drop(state);
            self.changed.notify_all();
            return Poll::Ready(Some(Ok(bytes)));
        }

        if state.eof || state.abandoned {
            return Poll::Ready(None);
        }

        if let Some(reason) = state.failure.take() {
            state.eof = true;
            return Poll::Ready(Some(Err(io::Error::other(reason))));
        }

        self.reactor.register(cx.waker());
        Poll::Pending
    }
}
