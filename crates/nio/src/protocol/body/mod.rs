//! Request and response entities.
//!
//! Handlers run on worker threads, so both entity types expose blocking
//! `std::io` interfaces to them:
//!
//! - [`ReqBody`] implements [`std::io::Read`] over the request entity the
//!   connection pumps into a throttled buffer
//! - [`RespBody`] is either in memory or streamed through a [`BodyWriter`]
//!   implementing [`std::io::Write`]
//!
//! On the connection side [`RespBody`] is an ordinary `http_body::Body`.

mod req_body;
mod resp_body;

pub use req_body::{EntityReader, ReqBody};
pub use resp_body::{BodyWriter, RespBody};
