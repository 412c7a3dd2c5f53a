//! Connection reuse: may a connection carry another exchange after this one?
//!
//! The decision is a pure function of the connection's liveness and the response's
//! version, `Connection` header and entity framing. It never performs I/O and never
//! changes the connection. Both the server connection (after sending a response)
//! and the client connection (after receiving one) consult the same
//! [`ReuseStrategy`], by default [`ReuseDecider`].

mod decider;
mod directive;

pub use decider::{ConnectionState, ResponseMeta, ReuseDecider, ReuseStrategy};
pub use directive::ConnectionDirective;
