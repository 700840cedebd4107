//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};

/// An incoming HTTP request with its body already read.
///
/// The request's [`Extensions`] are its propagation context: middleware
/// stores request-scoped values there and handlers read them back.
#[derive(Debug)]
pub struct Request {
    inner: http::Request<Bytes>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(inner: http::Request<Bytes>) -> Self {
        Self { inner, remote_addr: None }
    }

    /// Sets the transport-level peer address.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method { self.inner.method() }
    pub fn uri(&self) -> &Uri { self.inner.uri() }
    pub fn path(&self) -> &str { self.inner.uri().path() }
    pub fn headers(&self) -> &HeaderMap { self.inner.headers() }
    pub fn body(&self) -> &[u8] { self.inner.body() }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// The request target as the client sent it: `/users/42?full=1` for
    /// origin-form requests, the whole URI for absolute-form ones.
    pub fn target(&self) -> String {
        self.inner.uri().to_string()
    }

    /// Header lookup. Names are case-insensitive; values that are not
    /// visible ASCII are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }

    pub fn extensions(&self) -> &Extensions { self.inner.extensions() }
    pub fn extensions_mut(&mut self) -> &mut Extensions { self.inner.extensions_mut() }

    pub fn into_inner(self) -> http::Request<Bytes> { self.inner }
}

impl From<http::Request<Bytes>> for Request {
    fn from(inner: http::Request<Bytes>) -> Self {
        Self::new(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request {
        http::Request::builder()
            .uri(uri)
            .header("X-Request-Id", "abc123")
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    #[test]
    fn test_header_is_case_insensitive() {
        let req = request("/");
        assert_eq!(req.header("x-request-id"), Some("abc123"));
        assert_eq!(req.header("X-REQUEST-ID"), Some("abc123"));
        assert_eq!(req.header("x-real-ip"), None);
    }

    #[test]
    fn test_target_keeps_query() {
        let req = request("/users/42?full=1");
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.target(), "/users/42?full=1");
    }

    #[test]
    fn test_remote_addr() {
        let addr: SocketAddr = "10.0.0.7:51234".parse().unwrap();
        let req = request("/").with_remote_addr(addr);
        assert_eq!(req.remote_addr(), Some(addr));
    }
}
