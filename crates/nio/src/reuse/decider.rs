use http::{HeaderMap, StatusCode};
use tracing::trace;

use crate::protocol::{ContractViolation, MessageFraming, ProtocolVersion};
use crate::reuse::ConnectionDirective;

/// The liveness of a connection as seen by its transport.
///
/// The engine only reads this state, opening and closing belongs to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub open: bool,
    pub stale: bool,
}

impl ConnectionState {
    pub const OPEN: ConnectionState = ConnectionState { open: true, stale: false };
    pub const CLOSED: ConnectionState = ConnectionState { open: false, stale: false };
}

/// What the reuse decision needs to know about a response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseMeta<'a> {
    pub version: ProtocolVersion,
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
    pub framing: MessageFraming,
}

/// Decides whether a connection may carry another exchange after the current one.
pub trait ReuseStrategy: Send + Sync {
    fn keep_alive(&self, connection: &ConnectionState, response: &ResponseMeta<'_>) -> bool;

    /// Like [`keep_alive`](ReuseStrategy::keep_alive), for callers that may not have
    /// both arguments at hand. A missing argument is a contract violation.
    fn decide(
        &self,
        connection: Option<&ConnectionState>,
        response: Option<&ResponseMeta<'_>>,
    ) -> Result<bool, ContractViolation> {
        let connection = connection.ok_or(ContractViolation::MissingArgument("connection"))?;
        let response = response.ok_or(ContractViolation::MissingArgument("response"))?;
        Ok(self.keep_alive(connection, response))
    }
}

/// The HTTP/1.x persistence rules.
///
/// In order of precedence:
///
/// 1. a closed connection is never reused, whatever the response says
/// 2. a `close` token in the response's `Connection` header closes
/// 3. a `keep-alive` token keeps the connection, even for HTTP/1.0, as long as the
///    end of the response entity can be found without closing
/// 4. otherwise HTTP/1.1 and later are persistent and older versions are not,
///    except that an entity delimited by closing the connection forces a close
///
/// Staleness of the connection is not considered: detecting it is left to
/// whoever writes the next request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReuseDecider;

impl ReuseStrategy for ReuseDecider {
    fn keep_alive(&self, connection: &ConnectionState, response: &ResponseMeta<'_>) -> bool {
        if !connection.open {
            return false;
        }

        let directive = ConnectionDirective::from_headers(response.headers);
        if directive.close() {
            return false;
        }

        let determinate = response.framing.is_determinate();
        if directive.keep_alive() && determinate {
            return true;
        }

        let keep_alive = response.version.is_persistent_by_default() && determinate;
        trace!(version = %response.version, framing = ?response.framing, keep_alive, "reuse decided by default");
        keep_alive
    }
}
