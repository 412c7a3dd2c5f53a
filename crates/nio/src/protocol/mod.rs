//! Core HTTP protocol types shared by the server and client sides.
//!
//! - [`ProtocolVersion`]: an ordered `(major, minor)` version, open to versions
//!   the engine does not know yet
//! - [`MessageFraming`] and [`WireEntity`]: how an entity is delimited on the wire
//!   and how much of it has been consumed
//! - [`Message`] and [`PayloadItem`]: the units moving through the codecs
//! - [`RequestHeader`] and [`ResponseHead`]: message heads
//! - [`body`]: request and response entities
//! - the error types of the crate

mod entity;
mod framing;
mod message;
mod request;
mod response;
mod version;

pub use entity::WireEntity;
pub use framing::{MessageFraming, status_allows_entity};
pub use message::{Message, PayloadItem};
pub use request::RequestHeader;
pub use response::{ResponseHead, status_response};
pub use version::ProtocolVersion;

mod error;
pub use error::{ContractViolation, ExchangeError, HttpError, ParseError, SendError};

pub mod body;
