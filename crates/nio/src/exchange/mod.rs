//! The asynchronous request/response exchange.
//!
//! An exchange starts when a request header has been parsed and ends when its
//! response has been written or the exchange failed. Its [`ExchangeState`] lives in
//! a [`StateCell`] shared between the connection's reactor task and whatever
//! threads hold an [`AsyncExchange`] handle for it:
//!
//! - the connection moves the exchange through `Receiving`, optionally
//!   `ExpectationCheck`, and `Dispatched`
//! - the [`ExpectationGate`] or the handler resolves it through
//!   [`AsyncExchange::submit_response`], from any thread, which moves it to
//!   `ResponseReady`, posts the response to the connection's [`Inbox`] and wakes
//!   the connection
//! - the connection then moves it through `Sending` to `Completed`, or to
//!   `Failed` when the transport gives up
//!
//! All transitions are compare-and-swap operations, so a response submitted by a
//! worker and a failure detected by the reactor can never both win.

mod async_exchange;
mod context;
mod gate;
mod inbox;
mod job;
mod outcome;
mod state;

pub use async_exchange::{AsyncExchange, ExchangeShared};
pub use context::ExchangeContext;
pub use gate::{ExpectationGate, expectation_failed};
pub use inbox::{Envelope, Inbox, InboxMessage, ReactorWaker};
pub use job::{Job, JobBuilder, JobEntity, JobState};
pub use outcome::{ExchangeObserver, ExchangeOutcome};
pub use state::{ExchangeState, StateCell};
