//! Request handlers.
//!
//! A [`Handler`] runs on a worker thread of the [`WorkerPool`](crate::throttle::WorkerPool),
//! so it may block: read the request entity through [`ReqBody`]'s `Read` impl, or
//! write a streamed response through a [`BodyWriter`](crate::protocol::body::BodyWriter).
//!
//! A handler answers through the [`AsyncExchange`] it is given. It can submit the
//! response before returning, or move the exchange to another thread and submit
//! later. Returning an error, panicking, or dropping the exchange without a
//! response makes the engine answer `500 Internal Server Error`.
//!
//! Closures are turned into handlers with [`make_handler`] (returns the response)
//! and [`make_exchange_handler`] (receives the exchange).

mod registry;

use std::error::Error;
use std::panic::{self, AssertUnwindSafe};

use http::{Request, Response};

use crate::exchange::AsyncExchange;
use crate::protocol::body::{ReqBody, RespBody};
use crate::throttle::panic_message;

pub use registry::{HandlerRegistry, UriHandlerRegistry};

pub type HandlerError = Box<dyn Error + Send + Sync>;

pub trait Handler: Send + Sync {
    fn handle(&self, request: Request<ReqBody>, exchange: AsyncExchange) -> Result<(), HandlerError>;
}

/// Handler built from a function returning the response, see [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, RespBodyT, Err> Handler for HandlerFn<F>
where
    F: Fn(Request<ReqBody>) -> Result<Response<RespBodyT>, Err> + Send + Sync,
    RespBodyT: Into<RespBody>,
    Err: Into<HandlerError>,
{
    fn handle(&self, request: Request<ReqBody>, exchange: AsyncExchange) -> Result<(), HandlerError> {
        let response = (self.f)(request).map_err(Into::into)?;
        exchange.submit_response(response)?;
        Ok(())
    }
}

pub fn make_handler<F, RespBodyT, Err>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<ReqBody>) -> Result<Response<RespBodyT>, Err> + Send + Sync,
    RespBodyT: Into<RespBody>,
    Err: Into<HandlerError>,
{
    HandlerFn { f }
}

/// Handler built from a function that resolves the exchange itself, see
/// [`make_exchange_handler`].
#[derive(Debug)]
pub struct ExchangeHandlerFn<F> {
    f: F,
}

impl<F, Err> Handler for ExchangeHandlerFn<F>
where
    F: Fn(Request<ReqBody>, AsyncExchange) -> Result<(), Err> + Send + Sync,
    Err: Into<HandlerError>,
{
    fn handle(&self, request: Request<ReqBody>, exchange: AsyncExchange) -> Result<(), HandlerError> {
        (self.f)(request, exchange).map_err(Into::into)
    }
}

pub fn make_exchange_handler<F, Err>(f: F) -> ExchangeHandlerFn<F>
where
    F: Fn(Request<ReqBody>, AsyncExchange) -> Result<(), Err> + Send + Sync,
    Err: Into<HandlerError>,
{
    ExchangeHandlerFn { f }
}

/// Runs `handler` on the current (worker) thread and turns every way it can fail
/// into a handler fault of the exchange.
pub(crate) fn run_handler(handler: &dyn Handler, request: Request<ReqBody>, exchange: AsyncExchange) {
    let guard = exchange.clone();
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(request, exchange))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => guard.fault(e),
        Err(payload) => guard.fault(format!("handler panicked: {}", panic_message(&*payload))),
    }
}
