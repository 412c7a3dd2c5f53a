//! Header codecs for both directions of an HTTP/1.x exchange.
//!
//! Server side: [`HeaderDecoder`] parses request headers and [`HeaderEncoder`]
//! serializes response headers. Client side: [`RequestHeaderEncoder`] and
//! [`ResponseHeaderDecoder`] do the reverse. All of them agree on how
//! `Content-Length` and `Transfer-Encoding` map onto a
//! [`MessageFraming`](crate::protocol::MessageFraming).

mod header_decoder;
mod header_encoder;
mod header_fields;
mod request_header_encoder;
mod response_header_decoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
pub use request_header_encoder::RequestHeaderEncoder;
pub use response_header_decoder::ResponseHeaderDecoder;
