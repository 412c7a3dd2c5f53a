//! Backpressure between the connection and the code consuming or producing entities.
//!
//! Three pieces cooperate here:
//!
//! - [`ThrottledBuffer`]: a bounded buffer with high/low watermarks sitting between
//!   the reactor (the connection task) and a worker thread
//! - [`pump_entity`]: the reactor side loop step that only reads from the
//!   connection when the buffer has room, and never more than that room
//! - [`WorkerPool`]: a bounded pool running blocking handler work off the reactor,
//!   with a bounded queue and rejection once both are full
//!
//! A handler reading a request entity slowly therefore slows down reading from
//! the socket instead of letting the entity pile up in memory, and a handler
//! writing a large response blocks in its worker until the peer catches up.

mod buffer;
mod pump;
mod worker_pool;

pub use buffer::ThrottledBuffer;
pub use pump::{PayloadLimit, PumpProgress, drain_entity, pump_entity};
pub use worker_pool::{WorkerHandle, WorkerPool};

pub(crate) use worker_pool::panic_message;

/// Watermarks of a [`ThrottledBuffer`], in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub high_watermark: usize,
    pub low_watermark: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { high_watermark: 20 * 1024, low_watermark: 4 * 1024 }
    }
}
