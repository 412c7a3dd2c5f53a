//! Server side connection handling.
//!
//! - [`ExchangeService`]: what all connections of a server share, built once
//!   with [`ExchangeService::builder`]
//! - [`HttpConnection`]: drives the exchanges of one connection, strictly one
//!   after the other
//!
//! The task running [`HttpConnection::process`] is the connection's reactor. It
//! never blocks: handlers run on the service's worker pool and hand their response
//! back through the exchange inbox, waking the reactor.

mod http_connection;
mod service;

pub use http_connection::HttpConnection;
pub use service::{ExchangeService, ExchangeServiceBuilder};
