//! HTTP response header handling.
//!
//! A response head is `http::Response<()>`: the body is attached separately once
//! the engine has decided how the entity is framed.

use http::{Response, StatusCode, header};
use mime::Mime;

/// Type alias for HTTP response headers.
pub type ResponseHead = Response<()>;

/// Builds the response the engine itself sends for a given status, e.g. 400 or 501.
///
/// The body is a short plain text reason so that a human reading the wire can tell
/// the engine's own responses apart from a handler's.
pub fn status_response(status: StatusCode) -> Response<String> {
    let reason = status.canonical_reason().unwrap_or("unknown status");
    let mut response = Response::new(format!("{} {reason}\r\n", status.as_u16()));
    *response.status_mut() = status;

    let mime: Mime = mime::TEXT_PLAIN_UTF_8;
    if let Ok(value) = mime.as_ref().parse() {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_response_carries_reason() {
        let response = status_response(StatusCode::NOT_IMPLEMENTED);
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(response.body(), "501 Not Implemented\r\n");
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
    }
}
