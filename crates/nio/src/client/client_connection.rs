use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::{EXPECT, HOST};
use http::{HeaderValue, Request, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::time::{Instant, timeout_at};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, trace, warn};

use crate::client::{CollectingConsumer, EntityConsumer, JobQueue};
use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::config::EngineConfig;
use crate::exchange::{Job, JobEntity};
use crate::protocol::body::EntityReader;
use crate::protocol::{
    ContractViolation, ExchangeError, HttpError, Message, MessageFraming, PayloadItem, RequestHeader, ResponseHead,
    WireEntity,
};
use crate::reuse::{ConnectionState, ReuseDecider, ReuseStrategy, ResponseMeta};
use crate::throttle::{PumpProgress, ThrottledBuffer, WorkerPool, drain_entity, pump_entity};

/// Creates the consumer reading the response entity of a job.
pub type ConsumerFactory = Arc<dyn Fn(&Job) -> Box<dyn EntityConsumer> + Send + Sync>;

/// Size of the chunks a chunked request entity is written in.
const REQUEST_CHUNK_SIZE: usize = 4 * 1024;

/// A client connection executing jobs one after the other.
///
/// Each job becomes one request: `GET`, `HEAD` or `POST` to `/{pattern}x{count}`,
/// carrying the job's expected string as its entity when the job has one. With
/// `Expect: 100-continue` the entity is held back until the server answers
/// `100 Continue`, or the configured timeout passes without any answer.
///
/// Response entities are pumped into a throttled buffer and read by an
/// [`EntityConsumer`] on the worker pool. After every response the reuse strategy
/// decides whether the connection carries the next job.
pub struct ClientConnection<R, W> {
    framed_read: FramedRead<R, ResponseDecoder>,
    framed_write: FramedWrite<W, RequestEncoder>,
    config: EngineConfig,
    pool: WorkerPool,
    reuse: Arc<dyn ReuseStrategy>,
    consumers: ConsumerFactory,
    host: HeaderValue,
    open: bool,
}

impl<R: fmt::Debug, W: fmt::Debug> fmt::Debug for ClientConnection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("framed_read", &self.framed_read)
            .field("framed_write", &self.framed_write)
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("host", &self.host)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

/// A response as far as the job cares about it.
#[derive(Debug)]
struct Received {
    status: StatusCode,
    body: Option<Bytes>,
    keep_alive: bool,
}

impl<R, W> ClientConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, config: EngineConfig) -> Self {
        let pool = WorkerPool::new(config.worker_pool_bound(), config.worker_queue_bound());
        Self {
            framed_read: FramedRead::with_capacity(reader, ResponseDecoder::new(), config.read_buffer_size()),
            framed_write: FramedWrite::new(writer, RequestEncoder::new()),
            config,
            pool,
            reuse: Arc::new(ReuseDecider),
            consumers: Arc::new(|_: &Job| Box::new(CollectingConsumer::new()) as Box<dyn EntityConsumer>),
            host: HeaderValue::from_static("localhost"),
            open: true,
        }
    }

    /// Runs the consumers on `pool` instead of a pool of the connection's own.
    pub fn with_worker_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_reuse_strategy(mut self, reuse: Arc<dyn ReuseStrategy>) -> Self {
        self.reuse = reuse;
        self
    }

    pub fn with_consumers<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Job) -> Box<dyn EntityConsumer> + Send + Sync + 'static,
    {
        self.consumers = Arc::new(factory);
        self
    }

    pub fn with_host(mut self, host: HeaderValue) -> Self {
        self.host = host;
        self
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Executes jobs from `queue` until it is empty or the connection may not be
    /// reused. Returns the number of jobs executed on this connection.
    ///
    /// Jobs left in the queue are for another connection to pick up. A failed
    /// job ends the connection with the error that failed it.
    pub async fn run(&mut self, queue: &JobQueue) -> Result<usize, HttpError> {
        let mut executed = 0;
        while self.open {
            let Some(job) = queue.pop() else {
                break;
            };

            executed += 1;
            if let Err(e) = self.execute(&job).await {
                self.shutdown().await;
                return Err(e.into());
            }
        }

        if !self.open {
            self.shutdown().await;
        }
        info!(executed, remaining = queue.len(), open = self.open, "client connection done");
        Ok(executed)
    }

    /// Executes a single job and resolves it. Returns whether the connection may
    /// carry another request.
    pub async fn execute(&mut self, job: &Job) -> Result<bool, ExchangeError> {
        if !self.open {
            resolve(job, job.fail("connection is closed"));
            return Err(ExchangeError::Closed);
        }

        match self.exchange(job).await {
            Ok(received) => {
                debug!(uri = %job.uri(), status = %received.status, keep_alive = received.keep_alive, "job done");
                self.open = received.keep_alive;
                resolve(job, job.set_result(received.status, received.body));
                Ok(received.keep_alive)
            }
            Err(e) => {
                warn!(uri = %job.uri(), cause = %e, "job failed");
                self.open = false;
                resolve(job, job.fail(e.to_string()));
                Err(e)
            }
        }
    }

    async fn exchange(&mut self, job: &Job) -> Result<Received, ExchangeError> {
        let method = job.method().clone();
        let entity = match job.entity() {
            JobEntity::None => None,
            JobEntity::ContentLength | JobEntity::Chunked => Some(Bytes::from(job.expected())),
        };
        let framing = match (job.entity(), &entity) {
            (JobEntity::ContentLength, Some(bytes)) => MessageFraming::ContentLength(bytes.len() as u64),
            (JobEntity::Chunked, _) => MessageFraming::Chunked,
            _ => MessageFraming::Empty,
        };
        let expect_continue = job.expect_continue() && entity.is_some();

        let mut builder =
            Request::builder().method(method.clone()).uri(job.uri()).version(job.version()).header(HOST, self.host.clone());
        if expect_continue {
            builder = builder.header(EXPECT, HeaderValue::from_static("100-continue"));
        }
        let header: RequestHeader = builder.body(()).map_err(ExchangeError::protocol)?.into();

        self.framed_read.decoder_mut().expect_response_to(method);
        trace!(uri = %job.uri(), ?framing, expect_continue, "sending request");
        self.framed_write.feed(Message::<_, Bytes>::Header((header, framing))).await?;

        let mut early_response = None;
        match entity {
            Some(bytes) if expect_continue => {
                SinkExt::<Message<(RequestHeader, MessageFraming), Bytes>>::flush(&mut self.framed_write).await?;
                early_response = self.await_continue().await?;
                if early_response.is_none() {
                    self.send_entity(bytes, framing).await?;
                }
            }
            Some(bytes) => self.send_entity(bytes, framing).await?,
            None => self.framed_write.send(Message::<(RequestHeader, MessageFraming)>::Payload(PayloadItem::Eof)).await?,
        }

        // a final response arriving instead of 100 Continue means the entity was never sent
        let entity_withheld = early_response.is_some();
        let (head, framing) = match early_response {
            Some(response) => response,
            None => self.read_final_response().await?,
        };

        let status = head.status();
        let (body, drained) = self.consume_entity(job, &head, framing).await?;
        if framing.is_identity() {
            // the entity ended with the connection
            self.open = false;
        }

        let meta = ResponseMeta { version: head.version().into(), status, headers: head.headers(), framing };
        let connection = if self.open { ConnectionState::OPEN } else { ConnectionState::CLOSED };
        let keep_alive = !entity_withheld && drained && self.reuse.keep_alive(&connection, &meta);
        Ok(Received { status, body, keep_alive })
    }

    async fn send_entity(&mut self, bytes: Bytes, framing: MessageFraming) -> Result<(), ExchangeError> {
        if framing.is_chunked() {
            let mut remaining = bytes;
            while !remaining.is_empty() {
                let chunk = remaining.split_to(remaining.len().min(REQUEST_CHUNK_SIZE));
                self.framed_write.feed(Message::<(RequestHeader, MessageFraming)>::Payload(PayloadItem::Chunk(chunk))).await?;
            }
        } else if !bytes.is_empty() {
            self.framed_write.feed(Message::<(RequestHeader, MessageFraming)>::Payload(PayloadItem::Chunk(bytes))).await?;
        }
        self.framed_write.send(Message::<(RequestHeader, MessageFraming)>::Payload(PayloadItem::Eof)).await?;
        Ok(())
    }

    /// Waits for the server's verdict on an `Expect: 100-continue` request.
    ///
    /// Returns `None` when the entity should be sent, either because the server
    /// asked for it or because it stayed silent, and the final response otherwise.
    async fn await_continue(&mut self) -> Result<Option<(ResponseHead, MessageFraming)>, ExchangeError> {
        let deadline = Instant::now() + self.config.expect_continue_timeout();
        loop {
            let Ok(next) = timeout_at(deadline, self.framed_read.next()).await else {
                debug!("no answer to expect-continue, sending the entity anyway");
                return Ok(None);
            };

            match next {
                Some(Ok(Message::Header((head, _)))) if head.status() == StatusCode::CONTINUE => {
                    trace!("server asked for the request entity");
                    return Ok(None);
                }
                Some(Ok(Message::Header((head, _)))) if head.status().is_informational() => {
                    trace!(status = %head.status(), "skipping interim response");
                }
                Some(Ok(Message::Header(response))) => return Ok(Some(response)),
                Some(Ok(Message::Payload(_))) => {
                    return Err(ExchangeError::protocol("received response entity before a response header"));
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ExchangeError::Closed),
            }
        }
    }

    async fn read_final_response(&mut self) -> Result<(ResponseHead, MessageFraming), ExchangeError> {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((head, _)))) if head.status().is_informational() => {
                    trace!(status = %head.status(), "skipping interim response");
                }
                Some(Ok(Message::Header(response))) => return Ok(response),
                Some(Ok(Message::Payload(_))) => {
                    return Err(ExchangeError::protocol("received response entity before a response header"));
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ExchangeError::Closed),
            }
        }
    }

    /// Pumps the response entity to a consumer on the worker pool.
    ///
    /// Returns the consumed entity, `None` for a response without one, and whether
    /// the entity has been read to its end so the connection stays usable.
    async fn consume_entity(
        &mut self,
        job: &Job,
        head: &ResponseHead,
        framing: MessageFraming,
    ) -> Result<(Option<Bytes>, bool), ExchangeError> {
        let mut entity = WireEntity::new(framing);
        if framing.is_empty() {
            return Ok((None, true));
        }

        let buffer = Arc::new(ThrottledBuffer::new(self.config.throttle()));
        let mut reader = EntityReader::new(Arc::clone(&buffer));
        let mut consumer = (self.consumers)(job);
        let status = head.status();
        let headers = head.headers().clone();
        let mut handle = self.pool.submit(move || consumer.consume(status, &headers, &mut reader))?;

        let mut pumping = true;
        let mut entity_error = None;
        let consumed = loop {
            select! {
                biased;

                consumed = &mut handle => break consumed,

                progress = pump_entity(&mut self.framed_read, &buffer, &mut entity), if pumping => match progress {
                    Ok(PumpProgress::Pushed(_)) => {}
                    Ok(PumpProgress::Finished) => {
                        trace!(consumed = entity.consumed(), "response entity complete");
                        pumping = false;
                    }
                    Ok(PumpProgress::ConsumerGone) => pumping = false,
                    Err(e) => {
                        // the consumer observes the failure through the buffer
                        pumping = false;
                        entity_error = Some(e);
                    }
                },
            }
        };

        if let Some(e) = entity_error {
            return Err(e);
        }
        let body = consumed?.map_err(|e| ExchangeError::handler_fault(format!("entity consumer failed: {e}")))?;

        let drained = if entity.is_complete() {
            true
        } else {
            buffer.abandon();
            drain_entity(&mut self.framed_read, &mut entity, self.config.drain_limit()).await?
        };
        Ok((Some(body), drained))
    }

    async fn shutdown(&mut self) {
        self.open = false;
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(cause = %e, "client shutdown failed");
        }
    }
}

fn resolve(job: &Job, resolution: Result<(), ContractViolation>) {
    if let Err(e) = resolution {
        warn!(uri = %job.uri(), cause = %e, "job resolved twice");
    }
}
