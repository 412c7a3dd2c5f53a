//! HTTP request header handling.
//!
//! [`RequestHeader`] wraps `http::Request<()>` and adds the few questions the
//! exchange engine keeps asking about a request: which protocol version it
//! speaks, whether it waits for `100 Continue`, and what its `Connection`
//! header asks for.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};

use crate::protocol::ProtocolVersion;
use crate::reuse::ConnectionDirective;

#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.inner.version().into()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    #[inline]
    pub fn is_head(&self) -> bool {
        self.inner.method() == Method::HEAD
    }

    /// Returns true if the request carries `Expect: 100-continue`.
    ///
    /// The expectation is only meaningful for HTTP/1.1 and later, an HTTP/1.0
    /// client never waits for the interim response.
    pub fn expects_continue(&self) -> bool {
        if self.version() < Version::HTTP_11 {
            return false;
        }
        self.headers()
            .get(header::EXPECT)
            .is_some_and(|value| value.as_bytes().trim_ascii().eq_ignore_ascii_case(b"100-continue"))
    }

    /// Collects the tokens of every `Connection` header of this request.
    pub fn connection_directive(&self) -> ConnectionDirective {
        ConnectionDirective::from_headers(self.headers())
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
