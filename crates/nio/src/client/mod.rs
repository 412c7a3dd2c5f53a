//! The client side of the engine.
//!
//! A [`ClientConnection`] takes [`Job`](crate::exchange::Job)s off a shared
//! [`JobQueue`] and executes them one after the other over a single connection,
//! as long as the reuse strategy lets it keep the connection. Response entities
//! are pumped into a throttled buffer and read by an [`EntityConsumer`] on a
//! worker thread, so a slow consumer slows down reading from the socket.

mod client_connection;
mod consumer;
mod queue;

pub use client_connection::{ClientConnection, ConsumerFactory};
pub use consumer::{CollectingConsumer, EntityConsumer};
pub use queue::JobQueue;
