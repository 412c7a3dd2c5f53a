use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use http::Response;
use tokio::sync::Notify;
use tracing::trace;

use crate::protocol::body::RespBody;

/// Wakes a connection's reactor task from any thread.
///
/// A wake issued while the reactor is busy is remembered, so the reactor will
/// observe it the next time it waits.
#[derive(Debug, Default)]
pub struct ReactorWaker {
    notify: Notify,
}

impl ReactorWaker {
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    pub async fn woken(&self) {
        self.notify.notified().await;
    }
}

/// What a worker or gate hands back to the reactor.
#[derive(Debug)]
pub enum InboxMessage {
    /// The expectation was accepted, the request entity may be read.
    Accepted,
    /// The response of the exchange.
    Response(Response<RespBody>),
    /// The handler failed before producing a response.
    Fault(String),
}

#[derive(Debug)]
pub struct Envelope {
    pub exchange_id: u64,
    pub message: InboxMessage,
}

/// The per-connection mailbox through which other threads complete exchanges.
///
/// Posting never blocks for longer than a short lock, and is always followed by
/// a [`ReactorWaker::wake`].
#[derive(Debug, Default)]
pub struct Inbox {
    queue: Mutex<VecDeque<Envelope>>,
    waker: ReactorWaker,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, exchange_id: u64, message: InboxMessage) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Envelope { exchange_id, message });
        trace!(exchange_id, "posted to inbox");
        self.waker.wake();
    }

    pub fn try_recv(&self) -> Option<Envelope> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    /// Waits for the next envelope. Cancellation safe.
    pub async fn recv(&self) -> Envelope {
        loop {
            if let Some(envelope) = self.try_recv() {
                return envelope;
            }
            self.waker.woken().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn receives_posts_from_other_threads() {
        let inbox = Arc::new(Inbox::new());
        let poster = Arc::clone(&inbox);
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            poster.post(7, InboxMessage::Accepted);
            poster.post(7, InboxMessage::Fault("boom".into()));
        });

        let first = inbox.recv().await;
        assert_eq!(first.exchange_id, 7);
        assert!(matches!(first.message, InboxMessage::Accepted));

        let second = inbox.recv().await;
        assert!(matches!(second.message, InboxMessage::Fault(reason) if reason == "boom"));
        worker.join().unwrap();
    }

    #[tokio::test]
    async fn wake_before_wait_is_not_lost() {
        let inbox = Inbox::new();
        inbox.post(1, InboxMessage::Accepted);
        let envelope = tokio::time::timeout(Duration::from_secs(1), inbox.recv()).await.unwrap();
        assert_eq!(envelope.exchange_id, 1);
        assert!(inbox.try_recv().is_none());
    }
}
