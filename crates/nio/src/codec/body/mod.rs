//! Payload codecs for the entity following a message header.
//!
//! [`PayloadDecoder`] and [`PayloadEncoder`] pick one strategy per message from
//! its [`MessageFraming`](crate::protocol::MessageFraming):
//!
//! - content-length: exactly the declared number of bytes
//! - chunked: the chunked transfer coding of RFC 9112
//! - identity: everything until the connection closes (responses only)
//! - no body
//!
//! Both decoders honour a payload limit, so the reader never takes more entity
//! bytes off the wire than the consumer has room for.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
