//! Wire codecs for HTTP/1.x messages.
//!
//! Each direction of an exchange is a [`Decoder`](tokio_util::codec::Decoder) or
//! [`Encoder`](tokio_util::codec::Encoder) over
//! [`Message`](crate::protocol::Message) items: one header, then payload chunks,
//! then `Eof`.
//!
//! - Server side: [`RequestDecoder`] and [`ResponseEncoder`]
//! - Client side: [`RequestEncoder`] and [`ResponseDecoder`]
//!
//! Header parsing and entity framing live in the private `header` and `body` modules.
//! Both decoders implement [`PayloadLimit`](crate::throttle::PayloadLimit), which
//! lets the caller bound how many entity bytes the next payload item may carry.
//!
//! # Example
//!
//! ```no_run
//! use micro_nio::codec::{RequestDecoder, ResponseEncoder};
//! use tokio_util::codec::{Decoder, Encoder};
//! use bytes::BytesMut;
//!
//! // Decode incoming request
//! let mut decoder = RequestDecoder::new();
//! let mut request_buffer = BytesMut::new();
//! let request = decoder.decode(&mut request_buffer);
//!
//! // Encode outgoing response
//! let mut encoder = ResponseEncoder::new();
//! let mut response_buffer = BytesMut::new();
//! // ... encode response ...
//! ```

mod body;
mod header;
mod request_decoder;
mod request_encoder;
mod response_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
pub use response_encoder::ResponseEncoder;
