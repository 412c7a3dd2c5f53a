use std::time::Instant;

use http::{Method, Uri};

use crate::protocol::{MessageFraming, ProtocolVersion, RequestHeader};
use crate::reuse::ConnectionDirective;

/// What the engine remembers about a request for the lifetime of its exchange.
///
/// The context is captured once the request header has been parsed and is
/// immutable afterwards, so it can be shared freely between the reactor, the
/// handler and interceptors.
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    pub exchange_id: u64,
    /// Position of this exchange on its connection, starting at 1.
    pub sequence: u64,
    pub method: Method,
    pub uri: Uri,
    pub version: ProtocolVersion,
    pub request_directive: ConnectionDirective,
    pub expects_continue: bool,
    pub request_framing: MessageFraming,
    pub received_at: Instant,
}

impl ExchangeContext {
    pub fn new(exchange_id: u64, sequence: u64, header: &RequestHeader, request_framing: MessageFraming) -> Self {
        Self {
            exchange_id,
            sequence,
            method: header.method().clone(),
            uri: header.uri().clone(),
            version: header.protocol_version(),
            request_directive: header.connection_directive(),
            expects_continue: header.expects_continue(),
            request_framing,
            received_at: Instant::now(),
        }
    }

    #[inline]
    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Returns true if the request declared an entity that follows its header.
    #[inline]
    pub fn has_request_entity(&self) -> bool {
        !self.request_framing.is_empty()
    }

    /// Returns true if the request itself asked for the connection to stay open
    /// beyond what its version implies.
    pub fn wants_keep_alive(&self) -> bool {
        if self.request_directive.close() {
            return false;
        }
        self.version.is_persistent_by_default() || self.request_directive.keep_alive()
    }
}
