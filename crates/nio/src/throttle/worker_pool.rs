use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use tokio::sync::{Semaphore, TryAcquireError};
use tokio::task::{JoinError, JoinHandle, spawn_blocking};
use tracing::{debug, warn};

use crate::protocol::ExchangeError;

/// A bounded pool for blocking handler work.
///
/// At most `pool_bound` tasks run at once, each on tokio's blocking threads. When
/// all of them are busy up to `queue_bound` further tasks wait for a free slot;
/// beyond that [`WorkerPool::submit`] rejects the task with
/// [`ExchangeError::ResourceExhausted`], failing only the exchange that submitted it.
///
/// The pool is cheap to clone and all clones share the same bounds.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    permits: Arc<Semaphore>,
    queued: AtomicUsize,
    pool_bound: usize,
    queue_bound: usize,
}

impl WorkerPool {
    pub fn new(pool_bound: usize, queue_bound: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                permits: Arc::new(Semaphore::new(pool_bound)),
                queued: AtomicUsize::new(0),
                pool_bound,
                queue_bound,
            }),
        }
    }

    pub fn pool_bound(&self) -> usize {
        self.inner.pool_bound
    }

    /// Number of tasks currently running.
    pub fn running(&self) -> usize {
        self.inner.pool_bound - self.inner.permits.available_permits()
    }

    /// Number of tasks waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.inner.queued.load(Ordering::Acquire)
    }

    /// Submits blocking work. Must be called from within a tokio runtime.
    pub fn submit<F, T>(&self, task: F) -> Result<WorkerHandle<T>, ExchangeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match Arc::clone(&self.inner.permits).try_acquire_owned() {
            Ok(permit) => Ok(WorkerHandle::Running(spawn_blocking(move || {
                let _permit = permit;
                task()
            }))),

            Err(TryAcquireError::NoPermits) => {
                let queue_bound = self.inner.queue_bound;
                let reserved = self
                    .inner
                    .queued
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| (queued < queue_bound).then_some(queued + 1));
                if reserved.is_err() {
                    warn!(pool_bound = self.inner.pool_bound, queue_bound, "worker pool saturated, rejecting task");
                    return Err(ExchangeError::resource_exhausted("worker pool"));
                }

                debug!(queued = self.queued(), "all workers busy, task queued");
                let inner = Arc::clone(&self.inner);
                Ok(WorkerHandle::Queued(tokio::spawn(async move {
                    let permit = Arc::clone(&inner.permits).acquire_owned().await;
                    inner.queued.fetch_sub(1, Ordering::AcqRel);
                    let permit = permit.map_err(|_closed| ExchangeError::resource_exhausted("worker pool"))?;

                    spawn_blocking(move || {
                        let _permit = permit;
                        task()
                    })
                    .await
                    .map_err(join_error)
                })))
            }

            Err(TryAcquireError::Closed) => Err(ExchangeError::resource_exhausted("worker pool")),
        }
    }
}

/// Completion handle of a task submitted to a [`WorkerPool`].
///
/// Dropping the handle detaches the task, it keeps running to completion.
#[derive(Debug)]
pub enum WorkerHandle<T> {
    Running(JoinHandle<T>),
    Queued(JoinHandle<Result<T, ExchangeError>>),
}

impl<T> Future for WorkerHandle<T> {
    type Output = Result<T, ExchangeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            WorkerHandle::Running(handle) => Pin::new(handle).poll(cx).map(|result| result.map_err(join_error)),
            WorkerHandle::Queued(handle) => {
                Pin::new(handle).poll(cx).map(|result| result.map_err(join_error).and_then(|inner| inner))
            }
        }
    }
}

fn join_error(e: JoinError) -> ExchangeError {
    if e.is_panic() {
        ExchangeError::handler_fault(format!("worker panicked: {}", panic_message(&*e.into_panic())))
    } else {
        ExchangeError::handler_fault("worker task was cancelled")
    }
}

/// Best effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::time::Duration;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_task_and_returns_value() {
        let pool = WorkerPool::new(2, 2);
        let handle = pool.submit(|| 40 + 2).unwrap();
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn queues_then_rejects_when_saturated() {
        let pool = WorkerPool::new(1, 1);
        let barrier = Arc::new(Barrier::new(2));

        let blocker = Arc::clone(&barrier);
        let running = pool.submit(move || blocker.wait()).unwrap();
        let queued = pool.submit(|| "queued").unwrap();
        assert_eq!(pool.queued(), 1);

        let rejected = pool.submit(|| "rejected");
        assert!(matches!(rejected, Err(ExchangeError::ResourceExhausted { .. })));

        barrier.wait();
        running.await.unwrap();
        assert_eq!(queued.await.unwrap(), "queued");
        assert_eq!(pool.queued(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panic_is_a_handler_fault() {
        let pool = WorkerPool::new(1, 0);
        let handle = pool.submit(|| -> u32 { panic!("boom") }).unwrap();
        match handle.await {
            Err(ExchangeError::HandlerFault { reason }) => assert!(reason.contains("boom")),
            other => panic!("unexpected result: {other:?}"),
        }

        // the permit is released after the panic
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.running(), 0);
        assert_eq!(pool.submit(|| 1).unwrap().await.unwrap(), 1);
    }
}
