use http::StatusCode;

use crate::exchange::ExchangeContext;
use crate::protocol::ExchangeError;

/// How an exchange ended. Every exchange ends exactly once.
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// A response was sent completely.
    Responded { status: StatusCode, keep_alive: bool },
    /// No complete response could be sent.
    Failed(ExchangeError),
}

impl ExchangeOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ExchangeOutcome::Failed(_))
    }
}

/// Receives the outcome of every exchange of the connections it is registered with.
pub trait ExchangeObserver: Send + Sync {
    fn completed(&self, context: &ExchangeContext, outcome: &ExchangeOutcome);
}

impl<F> ExchangeObserver for F
where
    F: Fn(&ExchangeContext, &ExchangeOutcome) + Send + Sync,
{
    fn completed(&self, context: &ExchangeContext, outcome: &ExchangeOutcome) {
        (self)(context, outcome)
    }
}
