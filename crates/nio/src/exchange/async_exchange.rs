use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::Response;
use tracing::{debug, error, warn};

use crate::exchange::{ExchangeContext, ExchangeState, Inbox, InboxMessage, StateCell};
use crate::protocol::body::RespBody;
use crate::protocol::{ContractViolation, ExchangeError};

/// The state of one exchange shared between its connection and every [`AsyncExchange`]
/// handle given out for it.
#[derive(Debug)]
pub struct ExchangeShared {
    context: ExchangeContext,
    state: StateCell,
    inbox: Arc<Inbox>,
    gate_handles: AtomicUsize,
    handler_handles: AtomicUsize,
}

/// Who a handle was given to. Losing the last handle of a role means something
/// different for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Gate,
    Handler,
}

impl ExchangeShared {
    pub fn new(context: ExchangeContext, inbox: Arc<Inbox>) -> Arc<Self> {
        Arc::new(Self {
            context,
            state: StateCell::new(),
            inbox,
            gate_handles: AtomicUsize::new(0),
            handler_handles: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn context(&self) -> &ExchangeContext {
        &self.context
    }

    #[inline]
    pub fn exchange_id(&self) -> u64 {
        self.context.exchange_id
    }

    #[inline]
    pub fn state(&self) -> ExchangeState {
        self.state.get()
    }

    #[inline]
    pub fn state_cell(&self) -> &StateCell {
        &self.state
    }

    /// Creates the handle given to the handler. Losing every handler handle
    /// without a response is a handler fault, whatever the gate still holds.
    pub fn dispatch_handle(self: &Arc<Self>) -> AsyncExchange {
        AsyncExchange::attach(Arc::clone(self), Role::Handler)
    }

    /// Creates the handle given to the expectation gate.
    pub fn gate_handle(self: &Arc<Self>) -> AsyncExchange {
        AsyncExchange::attach(Arc::clone(self), Role::Gate)
    }

    fn handles(&self, role: Role) -> &AtomicUsize {
        match role {
            Role::Gate => &self.gate_handles,
            Role::Handler => &self.handler_handles,
        }
    }
}

/// A handle through which the response of an exchange can be submitted from any thread.
///
/// Submission is atomic with respect to the exchange state: it moves the exchange
/// to `ResponseReady`, hands the response to the connection's inbox and wakes the
/// connection. A response can be submitted at most once, and only while the
/// exchange is `ExpectationCheck` or `Dispatched`; any other attempt is a
/// [`ContractViolation`] returned to the caller.
///
/// Handles can be cloned, e.g. to complete the exchange from a thread spawned by
/// the handler. Gate handles and handler handles are counted apart:
///
/// - when the last gate handle is dropped during the expectation check, the
///   expectation is implicitly accepted
/// - when the last handler handle is dropped after dispatch, the exchange fails
///   as a handler fault (500)
#[derive(Debug)]
pub struct AsyncExchange {
    shared: Arc<ExchangeShared>,
    role: Role,
}

impl AsyncExchange {
    fn attach(shared: Arc<ExchangeShared>, role: Role) -> Self {
        shared.handles(role).fetch_add(1, Ordering::AcqRel);
        Self { shared, role }
    }

    #[inline]
    pub fn exchange_id(&self) -> u64 {
        self.shared.exchange_id()
    }

    #[inline]
    pub fn context(&self) -> &ExchangeContext {
        self.shared.context()
    }

    #[inline]
    pub fn state(&self) -> ExchangeState {
        self.shared.state()
    }

    pub fn submit_response<B>(&self, response: Response<B>) -> Result<(), ExchangeError>
    where
        B: Into<RespBody>,
    {
        let exchange_id = self.exchange_id();
        let mut current = self.state();

        while current.accepts_response() {
            match self.shared.state.transition(current, ExchangeState::ResponseReady)? {
                Ok(()) => {
                    debug!(exchange_id, status = %response.status(), from = ?current, "response submitted");
                    self.shared.inbox.post(exchange_id, InboxMessage::Response(response.map(Into::into)));
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }

        let violation = match current {
            ExchangeState::ResponseReady | ExchangeState::Sending | ExchangeState::Completed => {
                ContractViolation::DoubleSubmission { exchange_id }
            }
            state => ContractViolation::InvalidState { exchange_id, operation: "submit_response", state },
        };
        error!(exchange_id, cause = %violation, "response submission rejected");
        Err(violation.into())
    }

    /// Accepts the expectation of the request: the connection sends `100 Continue`
    /// and the handler is dispatched.
    pub fn accept(self) -> Result<(), ExchangeError> {
        let exchange_id = self.exchange_id();
        match self.shared.state.transition(ExchangeState::ExpectationCheck, ExchangeState::Dispatched)? {
            Ok(()) => {
                self.shared.inbox.post(exchange_id, InboxMessage::Accepted);
                Ok(())
            }
            Err(state) => {
                let violation = ContractViolation::InvalidState { exchange_id, operation: "accept", state };
                error!(exchange_id, cause = %violation, "expectation acceptance rejected");
                Err(violation.into())
            }
        }
    }

    /// Resolves the exchange as a handler fault, unless a response was already submitted.
    pub(crate) fn fault<S: ToString>(&self, reason: S) {
        let exchange_id = self.exchange_id();
        let reason = reason.to_string();
        match self.shared.state.transition(ExchangeState::Dispatched, ExchangeState::ResponseReady) {
            Ok(Ok(())) => {
                warn!(exchange_id, %reason, "handler fault");
                self.shared.inbox.post(exchange_id, InboxMessage::Fault(reason));
            }
            Ok(Err(state)) => {
                warn!(exchange_id, ?state, %reason, "handler failed after the exchange was resolved");
            }
            Err(e) => error!(exchange_id, cause = %e, "can not resolve handler fault"),
        }
    }
}

impl Clone for AsyncExchange {
    fn clone(&self) -> Self {
        Self::attach(Arc::clone(&self.shared), self.role)
    }
}

impl Drop for AsyncExchange {
    fn drop(&mut self) {
        if self.shared.handles(self.role).fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        let exchange_id = self.exchange_id();
        let state = &self.shared.state;
        match (self.role, self.state()) {
            (Role::Gate, ExchangeState::ExpectationCheck) => {
                if let Ok(Ok(())) = state.transition(ExchangeState::ExpectationCheck, ExchangeState::Dispatched) {
                    debug!(exchange_id, "expectation implicitly accepted");
                    self.shared.inbox.post(exchange_id, InboxMessage::Accepted);
                }
            }
            (Role::Handler, ExchangeState::Dispatched) => {
                self.fault("exchange dropped without a response");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use http::{Request, StatusCode};

    use super::*;
    use crate::protocol::{MessageFraming, RequestHeader};

    fn shared(inbox: &Arc<Inbox>) -> Arc<ExchangeShared> {
        let header = RequestHeader::from(Request::builder().uri("/test").body(()).unwrap());
        let context = ExchangeContext::new(11, 1, &header, MessageFraming::Empty);
        ExchangeShared::new(context, Arc::clone(inbox))
    }

    fn ok() -> Response<&'static str> {
        Response::new("ok")
    }

    #[test]
    fn submit_moves_to_response_ready() {
        let inbox = Arc::new(Inbox::new());
        let shared = shared(&inbox);
        shared.state_cell().transition(ExchangeState::Receiving, ExchangeState::Dispatched).unwrap().unwrap();

        let exchange = shared.dispatch_handle();
        exchange.submit_response(ok()).unwrap();
        assert_eq!(shared.state(), ExchangeState::ResponseReady);

        let envelope = inbox.try_recv().unwrap();
        assert_eq!(envelope.exchange_id, 11);
        assert!(matches!(envelope.message, InboxMessage::Response(ref r) if r.status() == StatusCode::OK));
    }

    #[test]
    fn second_submission_is_a_contract_violation() {
        let inbox = Arc::new(Inbox::new());
        let shared = shared(&inbox);
        shared.state_cell().transition(ExchangeState::Receiving, ExchangeState::Dispatched).unwrap().unwrap();

        let exchange = shared.dispatch_handle();
        exchange.submit_response(ok()).unwrap();
        let err = exchange.submit_response(ok()).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Contract { source: ContractViolation::DoubleSubmission { exchange_id: 11 } }
        ));
        drop(exchange);

        // only the first response reached the inbox, and dropping did not add a fault
        assert!(inbox.try_recv().is_some());
        assert!(inbox.try_recv().is_none());
    }

    #[test]
    fn submit_before_dispatch_is_rejected() {
        let inbox = Arc::new(Inbox::new());
        let shared = shared(&inbox);
        let exchange = shared.gate_handle();
        let err = exchange.submit_response(ok()).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Contract {
                source: ContractViolation::InvalidState { state: ExchangeState::Receiving, .. }
            }
        ));
    }

    #[test]
    fn dropping_last_handle_after_dispatch_is_a_fault() {
        let inbox = Arc::new(Inbox::new());
        let shared = shared(&inbox);
        shared.state_cell().transition(ExchangeState::Receiving, ExchangeState::Dispatched).unwrap().unwrap();

        let exchange = shared.dispatch_handle();
        let clone = exchange.clone();
        drop(exchange);
        assert!(inbox.try_recv().is_none());

        drop(clone);
        assert_eq!(shared.state(), ExchangeState::ResponseReady);
        assert!(matches!(inbox.try_recv().unwrap().message, InboxMessage::Fault(_)));
    }

    #[test]
    fn dropping_gate_handle_accepts() {
        let inbox = Arc::new(Inbox::new());
        let shared = shared(&inbox);
        shared.state_cell().transition(ExchangeState::Receiving, ExchangeState::ExpectationCheck).unwrap().unwrap();

        drop(shared.gate_handle());
        assert_eq!(shared.state(), ExchangeState::Dispatched);
        assert!(matches!(inbox.try_recv().unwrap().message, InboxMessage::Accepted));
    }

    #[test]
    fn explicit_accept_does_not_fault() {
        let inbox = Arc::new(Inbox::new());
        let shared = shared(&inbox);
        shared.state_cell().transition(ExchangeState::Receiving, ExchangeState::ExpectationCheck).unwrap().unwrap();

        shared.gate_handle().accept().unwrap();
        assert_eq!(shared.state(), ExchangeState::Dispatched);
        assert!(matches!(inbox.try_recv().unwrap().message, InboxMessage::Accepted));
        assert!(inbox.try_recv().is_none());
    }

    #[test]
    fn handle_kept_by_the_gate_does_not_hide_an_abandoned_handler() {
        let inbox = Arc::new(Inbox::new());
        let shared = shared(&inbox);
        shared.state_cell().transition(ExchangeState::Receiving, ExchangeState::ExpectationCheck).unwrap().unwrap();

        let gate = shared.gate_handle();
        let kept = gate.clone();
        gate.accept().unwrap();
        assert!(matches!(inbox.try_recv().unwrap().message, InboxMessage::Accepted));

        drop(shared.dispatch_handle());
        assert_eq!(shared.state(), ExchangeState::ResponseReady);
        assert!(matches!(inbox.try_recv().unwrap().message, InboxMessage::Fault(_)));

        drop(kept);
        assert!(inbox.try_recv().is_none());
    }

    #[test]
    fn gate_may_answer_directly() {
        let inbox = Arc::new(Inbox::new());
        let shared = shared(&inbox);
        shared.state_cell().transition(ExchangeState::Receiving, ExchangeState::ExpectationCheck).unwrap().unwrap();

        let exchange = shared.gate_handle();
        let mut response = Response::new("denied");
        *response.status_mut() = StatusCode::EXPECTATION_FAILED;
        exchange.submit_response(response).unwrap();
        drop(exchange);

        assert_eq!(shared.state(), ExchangeState::ResponseReady);
        assert!(matches!(inbox.try_recv().unwrap().message, InboxMessage::Response(_)));
        assert!(inbox.try_recv().is_none());
    }
}
