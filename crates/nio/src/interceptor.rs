//! Hooks that see every request and response of a connection.
//!
//! Interceptors run on the connection's reactor, in the order they were added:
//! request interceptors right after the header has been parsed, response
//! interceptors right before the response header is written. They adjust headers,
//! they can not replace a message or fail an exchange.

use std::fmt;
use std::sync::Arc;

use http::{HeaderValue, StatusCode, header};

use crate::exchange::ExchangeContext;
use crate::protocol::{MessageFraming, RequestHeader, ResponseHead};

pub trait Interceptor: Send + Sync {
    fn on_request(&self, _context: &ExchangeContext, _header: &mut RequestHeader) {}

    /// `framing` is the framing the response entity will be sent with.
    fn on_response(&self, _context: &ExchangeContext, _head: &mut ResponseHead, _framing: MessageFraming) {}
}

/// An ordered list of interceptors.
#[derive(Clone, Default)]
pub struct Interceptors {
    chain: Vec<Arc<dyn Interceptor>>,
}

impl Interceptors {
    pub fn new() -> Self {
        Self::default()
    }

    /// The interceptors every server connection wants: [`ResponseServer`] and
    /// [`ResponseConnControl`].
    pub fn standard() -> Self {
        let mut interceptors = Self::new();
        interceptors.add_last(ResponseServer::default()).add_last(ResponseConnControl);
        interceptors
    }

    pub fn add_first<I: Interceptor + 'static>(&mut self, interceptor: I) -> &mut Self {
        self.chain.insert(0, Arc::new(interceptor));
        self
    }

    pub fn add_last<I: Interceptor + 'static>(&mut self, interceptor: I) -> &mut Self {
        self.chain.push(Arc::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn process_request(&self, context: &ExchangeContext, header: &mut RequestHeader) {
        for interceptor in &self.chain {
            interceptor.on_request(context, header);
        }
    }

    pub fn process_response(&self, context: &ExchangeContext, head: &mut ResponseHead, framing: MessageFraming) {
        for interceptor in &self.chain {
            interceptor.on_response(context, head, framing);
        }
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors").field("len", &self.chain.len()).finish()
    }
}

/// Writes the `Connection` header of a response.
///
/// - a response that already says `close` is left alone
/// - statuses after which the request stream can not be trusted close
/// - a request asking for `close` gets `close` echoed
/// - an entity that ends with the connection closes
/// - an HTTP/1.0 request asking for `keep-alive` gets `keep-alive` when the
///   entity end can be found without closing
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseConnControl;

impl ResponseConnControl {
    fn closes_connection(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::BAD_REQUEST
                | StatusCode::REQUEST_TIMEOUT
                | StatusCode::LENGTH_REQUIRED
                | StatusCode::PAYLOAD_TOO_LARGE
                | StatusCode::URI_TOO_LONG
                | StatusCode::SERVICE_UNAVAILABLE
        )
    }
}

impl Interceptor for ResponseConnControl {
    fn on_response(&self, context: &ExchangeContext, head: &mut ResponseHead, framing: MessageFraming) {
        let headers = head.headers_mut();
        let already_closing =
            headers.get_all(header::CONNECTION).iter().any(|v| v.to_str().is_ok_and(|v| v.to_ascii_lowercase().contains("close")));
        if already_closing {
            return;
        }

        let close = HeaderValue::from_static("close");
        if Self::closes_connection(head.status()) || context.request_directive.close() || framing.is_identity() {
            head.headers_mut().insert(header::CONNECTION, close);
            return;
        }

        if !context.version.is_persistent_by_default() {
            let value = if context.request_directive.keep_alive() { HeaderValue::from_static("keep-alive") } else { close };
            head.headers_mut().insert(header::CONNECTION, value);
        }
    }
}

/// Sets the `Server` header of responses that have none.
#[derive(Debug, Clone)]
pub struct ResponseServer {
    value: HeaderValue,
}

impl ResponseServer {
    pub fn new(value: HeaderValue) -> Self {
        Self { value }
    }
}

impl Default for ResponseServer {
    fn default() -> Self {
        Self::new(HeaderValue::from_static(concat!("micro-nio/", env!("CARGO_PKG_VERSION"))))
    }
}

impl Interceptor for ResponseServer {
    fn on_response(&self, _context: &ExchangeContext, head: &mut ResponseHead, _framing: MessageFraming) {
        head.headers_mut().entry(header::SERVER).or_insert_with(|| self.value.clone());
    }
}
