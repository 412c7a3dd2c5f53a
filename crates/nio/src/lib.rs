//! An asynchronous HTTP/1.x exchange engine
//!
//! This crate runs HTTP/1.x exchanges over any pair of tokio `AsyncRead` /
//! `AsyncWrite` halves, on the server side as well as on the client side. Handlers
//! run on a bounded pool of blocking workers and may answer long after they
//! returned, while the connection task keeps reading, writing and deciding
//! whether the connection can carry the next exchange.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 with `Connection: keep-alive` / `close` handling
//! - Responses submitted from any thread through an [`exchange::AsyncExchange`]
//! - `Expect: 100-continue` resolved by a pluggable [`exchange::ExpectationGate`]
//! - Throttled request and response entities with high/low watermarks
//! - A bounded worker pool rejecting work with `503` once saturated
//! - Content-length, chunked and close delimited entities
//! - A client connection executing queued jobs over a reused connection
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use http::{Request, Response};
//! use micro_nio::connection::{ExchangeService, HttpConnection};
//! use micro_nio::handler::{HandlerError, UriHandlerRegistry, make_handler};
//! use micro_nio::protocol::body::ReqBody;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let mut registry = UriHandlerRegistry::new();
//!     registry.register("*", make_handler(echo));
//!     let service = Arc::new(ExchangeService::builder(registry).build());
//!
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let service = Arc::clone(&service);
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             if let Err(e) = HttpConnection::new(reader, writer, service).process().await {
//!                 error!(cause = %e, "connection failed");
//!             }
//!         });
//!     }
//! }
//!
//! // runs on a worker thread, so reading the entity may block
//! fn echo(request: Request<ReqBody>) -> Result<Response<Vec<u8>>, HandlerError> {
//!     let bytes = request.into_body().read_to_bytes()?;
//!     Ok(Response::new(bytes.to_vec()))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: versions, framing, message heads, entities and errors
//! - [`codec`]: request and response codecs for both sides of a connection
//! - [`reuse`]: the decision whether a connection survives an exchange
//! - [`exchange`]: the exchange state machine, [`exchange::AsyncExchange`] and jobs
//! - [`throttle`]: throttled buffers, entity pumping and the worker pool
//! - [`handler`]: handlers and the registry selecting them by request URI
//! - [`interceptor`]: request and response header interceptors
//! - [`connection`]: the server connection and the service it runs
//! - [`client`]: the client connection executing jobs
//! - [`config`]: watermarks, pool bounds and limits
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: what ends a connection
//! - [`protocol::ExchangeError`]: what fails a single exchange
//! - [`protocol::ParseError`] / [`protocol::SendError`]: reading and writing messages
//! - [`protocol::ContractViolation`]: API misuse, e.g. submitting a second response
//!
//! # Limitations
//!
//! - HTTP/1.x only, no pipelining: a connection runs one exchange at a time
//! - No TLS support
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod exchange;
pub mod handler;
pub mod interceptor;
pub mod protocol;
pub mod reuse;
pub mod throttle;

mod utils;
pub(crate) use utils::ensure;
