use http::{Response, StatusCode};

use crate::exchange::AsyncExchange;
use crate::protocol::RequestHeader;
use crate::protocol::body::RespBody;

/// Decides whether a request declaring `Expect: 100-continue` may proceed.
///
/// The gate runs on the connection's reactor before any handler sees the request,
/// so it must not block. It resolves the expectation through the given exchange:
///
/// - [`AsyncExchange::accept`], or simply dropping the exchange, lets the request
///   continue: `100 Continue` is sent and the handler is dispatched
/// - [`AsyncExchange::submit_response`] answers the request directly (typically
///   with `417 Expectation Failed`), the handler never runs
///
/// The exchange may be moved to another thread to decide later.
pub trait ExpectationGate: Send + Sync {
    fn verify(&self, header: &RequestHeader, exchange: AsyncExchange);
}

impl<F> ExpectationGate for F
where
    F: Fn(&RequestHeader, AsyncExchange) + Send + Sync,
{
    fn verify(&self, header: &RequestHeader, exchange: AsyncExchange) {
        (self)(header, exchange)
    }
}

/// The conventional rejection of an expectation.
pub fn expectation_failed<B: Into<RespBody>>(body: B) -> Response<RespBody> {
    let mut response = Response::new(body.into());
    *response.status_mut() = StatusCode::EXPECTATION_FAILED;
    response
}
