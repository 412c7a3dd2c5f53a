use std::future;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::CONNECTION;
use http::{HeaderValue, Response, StatusCode};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::connection::ExchangeService;
use crate::exchange::{ExchangeContext, ExchangeOutcome, ExchangeShared, ExchangeState, Inbox, InboxMessage};
use crate::handler::run_handler;
use crate::protocol::body::{ReqBody, RespBody};
use crate::protocol::{
    ContractViolation, ExchangeError, HttpError, Message, MessageFraming, PayloadItem, ProtocolVersion, RequestHeader,
    ResponseHead, SendError, WireEntity, status_response,
};
use crate::reuse::{ConnectionState, ResponseMeta};
use crate::throttle::{PumpProgress, ThrottledBuffer, drain_entity, pump_entity};

/// An HTTP connection that runs its exchanges one after the other.
///
/// For every request the connection:
///
/// 1. resolves an `Expect: 100-continue` through the service's gate, if any
/// 2. looks up the handler and submits it to the worker pool
/// 3. pumps the request entity into a throttled buffer the handler reads from,
///    until the handler's response arrives through the inbox
/// 4. writes the response, still pumping the entity for handlers that read while
///    they stream their response
/// 5. drains what is left of the entity and asks the reuse strategy whether the
///    connection may carry the next request
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    service: Arc<ExchangeService>,
    inbox: Arc<Inbox>,
    sequence: u64,
}

/// What happens to the connection after an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    KeepAlive,
    Close,
}

/// The per-exchange state the reactor keeps while an exchange is in flight.
#[derive(Debug)]
struct InFlight {
    shared: Arc<ExchangeShared>,
    entity: WireEntity,
    buffer: Option<Arc<ThrottledBuffer>>,
    pumping: bool,
    continue_sent: bool,
    entity_error: bool,
}

impl InFlight {
    fn context(&self) -> &ExchangeContext {
        self.shared.context()
    }

    fn exchange_id(&self) -> u64 {
        self.shared.exchange_id()
    }

    /// Returns the error that ended the entity, if this step failed.
    fn on_pumped(&mut self, progress: Result<PumpProgress, ExchangeError>) -> Option<ExchangeError> {
        match progress {
            Ok(PumpProgress::Pushed(_)) => None,
            Ok(PumpProgress::Finished) => {
                trace!(exchange_id = self.exchange_id(), consumed = self.entity.consumed(), "request entity complete");
                self.pumping = false;
                None
            }
            Ok(PumpProgress::ConsumerGone) => {
                debug!(exchange_id = self.exchange_id(), "handler stopped reading the request entity");
                self.pumping = false;
                None
            }
            Err(e) => {
                warn!(exchange_id = self.exchange_id(), cause = %e, "request entity failed");
                self.pumping = false;
                self.entity_error = true;
                Some(e)
            }
        }
    }

    /// An unread entity the peer was never invited to send can not be drained.
    fn entity_withheld(&self) -> bool {
        let context = self.context();
        context.expects_continue && !self.entity.is_complete() && !self.continue_sent
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, service: Arc<ExchangeService>) -> Self {
        let capacity = service.config().read_buffer_size();
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), capacity),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            service,
            inbox: Arc::new(Inbox::new()),
            sequence: 0,
        }
    }

    pub async fn process(mut self) -> Result<(), HttpError> {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, framing)))) => {
                    if self.exchange(header, framing).await? == Next::Close {
                        break;
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("receive request entity while waiting for a request header");
                    return Err(ExchangeError::protocol("request entity without header").into());
                }

                Some(Err(e)) => {
                    if e.is_protocol_violation() {
                        warn!(cause = %e, "can't parse request, answering 400");
                        self.reject(StatusCode::BAD_REQUEST).await;
                    } else {
                        warn!(cause = %e, "can't receive next request");
                    }
                    return Err(e.into());
                }

                None => {
                    info!(exchanges = self.sequence, "cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }

        // the peer of a close delimited entity learns about its end here
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(cause = %e, "shutdown after last exchange failed");
        }
        Ok(())
    }

    /// Answers a request that never became an exchange, and closes.
    async fn reject(&mut self, status: StatusCode) {
        let (parts, body) = status_response(status).into_parts();
        let mut head = ResponseHead::from_parts(parts, ());
        head.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        let framing = MessageFraming::ContentLength(body.len() as u64);

        let result = async {
            self.framed_write.feed(Message::<_, Bytes>::Header((head, framing))).await?;
            self.framed_write.feed(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Chunk(Bytes::from(body)))).await?;
            self.framed_write.send(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof)).await?;
            self.framed_write.get_mut().shutdown().await.map_err(SendError::io)
        }
        .await;

        if let Err(e) = result {
            debug!(cause = %e, "can't send rejection");
        }
    }

    async fn exchange(&mut self, mut header: RequestHeader, framing: MessageFraming) -> Result<Next, HttpError> {
        self.sequence += 1;
        let exchange_id = self.service.next_exchange_id();
        let context = ExchangeContext::new(exchange_id, self.sequence, &header, framing);
        self.service.interceptors().process_request(&context, &mut header);
        debug!(exchange_id, method = %context.method, uri = %context.uri, ?framing, "request received");

        let mut flight = InFlight {
            shared: ExchangeShared::new(context, Arc::clone(&self.inbox)),
            entity: WireEntity::new(framing),
            buffer: None,
            pumping: false,
            continue_sent: false,
            entity_error: false,
        };

        let Some(handler) = self.service.registry().lookup(&header) else {
            debug!(exchange_id, "no handler matches the request");
            move_to(&flight, ExchangeState::Receiving, ExchangeState::ResponseReady)?;
            let response = status_response(StatusCode::NOT_IMPLEMENTED).map(RespBody::from);
            return self.complete(&mut flight, response, None).await;
        };

        if flight.context().expects_continue {
            move_to(&flight, ExchangeState::Receiving, ExchangeState::ExpectationCheck)?;
            if let Some(response) = self.verify_expectation(&flight, &header).await? {
                debug!(exchange_id, status = %response.status(), "expectation rejected");
                return self.complete(&mut flight, response, None).await;
            }
            if flight.context().has_request_entity() {
                self.send_continue().await.map_err(|e| self.transport_failed(&flight, e))?;
                flight.continue_sent = true;
            }
        } else {
            move_to(&flight, ExchangeState::Receiving, ExchangeState::Dispatched)?;
        }

        let req_body = if flight.context().has_request_entity() {
            let buffer = Arc::new(ThrottledBuffer::new(self.service.config().throttle()));
            flight.buffer = Some(Arc::clone(&buffer));
            flight.pumping = true;
            ReqBody::throttled(framing, buffer)
        } else {
            ReqBody::empty()
        };

        let request = header.body(req_body);
        let shared = Arc::clone(&flight.shared);
        let submitted = self.service.pool().submit(move || run_handler(handler.as_ref(), request, shared.dispatch_handle()));
        if let Err(e) = submitted {
            // the rejected task took the request entity's reader with it
            flight.pumping = false;
            flight.shared.state_cell().advance(ExchangeState::ResponseReady).map_err(ExchangeError::from)?;
            let response = status_response(StatusCode::SERVICE_UNAVAILABLE).map(RespBody::from);
            return self.complete(&mut flight, response, Some(e)).await;
        }

        let outcome = loop {
            select! {
                biased;

                envelope = self.inbox.recv() => {
                    if envelope.exchange_id != exchange_id {
                        trace!(exchange_id = envelope.exchange_id, "drop message of a finished exchange");
                        continue;
                    }
                    match envelope.message {
                        InboxMessage::Accepted => continue,
                        InboxMessage::Response(response) => break Ok(response),
                        InboxMessage::Fault(reason) => break Err(ExchangeError::handler_fault(reason)),
                    }
                }

                progress = pump(&mut self.framed_read, flight.buffer.as_deref(), &mut flight.entity), if flight.pumping => {
                    if let Some(e) = flight.on_pumped(progress) {
                        return self.entity_failed(&mut flight, e).await;
                    }
                }
            }
        };

        match outcome {
            Ok(response) => self.complete(&mut flight, response, None).await,
            Err(fault) => {
                let response = status_response(StatusCode::INTERNAL_SERVER_ERROR).map(RespBody::from);
                self.complete(&mut flight, response, Some(fault)).await
            }
        }
    }

    /// Runs the expectation gate, or accepts right away when there is none.
    ///
    /// Returns the gate's own response when it rejected the expectation.
    async fn verify_expectation(
        &self,
        flight: &InFlight,
        header: &RequestHeader,
    ) -> Result<Option<Response<RespBody>>, ExchangeError> {
        let Some(gate) = self.service.gate() else {
            move_to(flight, ExchangeState::ExpectationCheck, ExchangeState::Dispatched)?;
            return Ok(None);
        };

        gate.verify(header, flight.shared.gate_handle());

        let exchange_id = flight.exchange_id();
        loop {
            let envelope = self.inbox.recv().await;
            if envelope.exchange_id != exchange_id {
                trace!(exchange_id = envelope.exchange_id, "drop message of a finished exchange");
                continue;
            }
            match envelope.message {
                InboxMessage::Accepted => return Ok(None),
                InboxMessage::Response(response) => return Ok(Some(response)),
                InboxMessage::Fault(reason) => return Err(ExchangeError::handler_fault(reason)),
            }
        }
    }

    async fn send_continue(&mut self) -> Result<(), ExchangeError> {
        let mut head = Response::new(());
        *head.status_mut() = StatusCode::CONTINUE;
        self.framed_write.feed(Message::<_, Bytes>::Header((head, MessageFraming::Empty))).await?;
        self.framed_write.send(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof)).await?;
        trace!("sent 100 continue");
        Ok(())
    }

    /// Sends `response`, then decides what happens to the connection.
    ///
    /// `failure` is set when the response is the engine's answer to a failed
    /// exchange: it is still sent, but the exchange is reported as failed.
    async fn complete(
        &mut self,
        flight: &mut InFlight,
        response: Response<RespBody>,
        failure: Option<ExchangeError>,
    ) -> Result<Next, HttpError> {
        move_to(flight, ExchangeState::ResponseReady, ExchangeState::Sending)?;

        let remaining = flight.entity.remaining();
        let undrainable = remaining.is_some_and(|remaining| remaining > self.service.config().drain_limit());
        let status = response.status();
        let force_close = flight.entity_withheld()
            || matches!(failure, Some(ExchangeError::ResourceExhausted { .. }))
            || (undrainable && !flight.pumping);

        let keep_alive = match self.write_response(flight, response, force_close).await {
            Ok(keep_alive) => keep_alive,
            Err(e) => {
                error!(exchange_id = flight.exchange_id(), cause = %e, "can't send response");
                flight.shared.state_cell().fail();
                self.observe(flight, &ExchangeOutcome::Failed(e));
                return Ok(Next::Close);
            }
        };

        let next = if keep_alive && !flight.entity_error && self.discard_entity(flight).await {
            Next::KeepAlive
        } else {
            Next::Close
        };

        let outcome = match failure {
            Some(e) => {
                flight.shared.state_cell().fail();
                ExchangeOutcome::Failed(e)
            }
            None => {
                move_to(flight, ExchangeState::Sending, ExchangeState::Completed)?;
                ExchangeOutcome::Responded { status, keep_alive: next == Next::KeepAlive }
            }
        };
        info!(exchange_id = flight.exchange_id(), %status, keep_alive = next == Next::KeepAlive, "exchange finished");
        self.observe(flight, &outcome);
        Ok(next)
    }

    /// Writes the response header and entity. Returns whether the response allows
    /// the connection to be reused.
    async fn write_response(
        &mut self,
        flight: &mut InFlight,
        response: Response<RespBody>,
        force_close: bool,
    ) -> Result<bool, ExchangeError> {
        let shared = Arc::clone(&flight.shared);
        let context = shared.context();

        let (parts, mut body) = response.into_parts();
        let mut head = ResponseHead::from_parts(parts, ());
        *head.version_mut() = context.version.response_version();
        let status = head.status();
        let framing = MessageFraming::for_response(context.version, status, &body.size_hint());

        if force_close {
            head.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        }
        self.service.interceptors().process_response(context, &mut head, framing);

        let meta = ResponseMeta { version: ProtocolVersion::from(head.version()), status, headers: head.headers(), framing };
        let keep_alive = !force_close && self.service.reuse().keep_alive(&ConnectionState::OPEN, &meta);

        self.framed_write.encoder_mut().set_head_only(context.is_head());
        self.framed_write.feed(Message::<_, Bytes>::Header((head, framing))).await?;

        if context.is_head() || framing == MessageFraming::Empty {
            drop(body);
        } else {
            loop {
                let frame = select! {
                    biased;

                    frame = body.frame() => frame,

                    progress = pump(&mut self.framed_read, flight.buffer.as_deref(), &mut flight.entity), if flight.pumping => {
                        flight.on_pumped(progress);
                        continue;
                    }
                };

                match frame {
                    Some(Ok(frame)) => {
                        if let Ok(data) = frame.into_data() {
                            self.framed_write.send(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Chunk(data))).await?;
                        }
                    }
                    Some(Err(e)) => return Err(ExchangeError::handler_fault(format!("response entity failed: {e}"))),
                    None => break,
                }
            }
        }

        self.framed_write.send(Message::<(ResponseHead, MessageFraming)>::Payload(PayloadItem::Eof)).await?;
        Ok(keep_alive)
    }

    /// Gets rid of whatever the handler did not read, so that the next request
    /// starts at the right place. Returns false when the connection can not be reused.
    async fn discard_entity(&mut self, flight: &mut InFlight) -> bool {
        if flight.entity.is_complete() {
            return true;
        }
        if flight.entity_withheld() {
            return false;
        }

        if let Some(buffer) = flight.buffer.take() {
            buffer.fail("exchange completed before the request entity was read");
        }

        let drain_limit = self.service.config().drain_limit();
        match drain_entity(&mut self.framed_read, &mut flight.entity, drain_limit).await {
            Ok(drained) => drained,
            Err(e) => {
                debug!(exchange_id = flight.exchange_id(), cause = %e, "can't drain request entity");
                false
            }
        }
    }

    /// The request entity broke while the handler was still working.
    async fn entity_failed(&mut self, flight: &mut InFlight, e: ExchangeError) -> Result<Next, HttpError> {
        flight.shared.state_cell().fail();

        if matches!(e, ExchangeError::Protocol { .. }) {
            self.reject(StatusCode::BAD_REQUEST).await;
        }
        self.observe(flight, &ExchangeOutcome::Failed(e));
        Ok(Next::Close)
    }

    fn transport_failed(&self, flight: &InFlight, e: ExchangeError) -> HttpError {
        flight.shared.state_cell().fail();
        error!(exchange_id = flight.exchange_id(), cause = %e, "connection failed");
        let reason = e.to_string();
        self.observe(flight, &ExchangeOutcome::Failed(e));
        ExchangeError::io(std::io::Error::other(reason)).into()
    }

    fn observe(&self, flight: &InFlight, outcome: &ExchangeOutcome) {
        if let Some(observer) = self.service.observer() {
            observer.completed(flight.context(), outcome);
        }
    }
}

fn move_to(flight: &InFlight, from: ExchangeState, to: ExchangeState) -> Result<(), ExchangeError> {
    flight.shared.state_cell().transition(from, to)?.map_err(|state| {
        ExchangeError::from(ContractViolation::InvalidState { exchange_id: flight.exchange_id(), operation: "advance", state })
    })
}

/// One pump step, or nothing at all for exchanges without a request entity.
async fn pump<R>(
    framed_read: &mut FramedRead<R, RequestDecoder>,
    buffer: Option<&ThrottledBuffer>,
    entity: &mut WireEntity,
) -> Result<PumpProgress, ExchangeError>
where
    R: AsyncRead + Unpin,
{
    match buffer {
        Some(buffer) => pump_entity(framed_read, buffer, entity).await,
        None => future::pending().await,
    }
}
