//! Incoming HTTP request type.

use bytes::Bytes;
use http::Method;
use tracing::debug;

use crate::params::{self, Params};

/// An incoming HTTP request.
///
/// Carries the route parameters captured by the dispatcher. Requests that
/// matched a template without placeholders carry none; [`Request::params`]
/// then returns an empty map.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: Option<Params>,
}

impl Request {
    /// Builds a request by hand, without a connection. Mostly useful for
    /// driving [`Router::dispatch`](crate::Router::dispatch) in tests.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: Vec::new(),
            body: Bytes::new(),
            params: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        let headers = parts.headers.iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(v) => Some((name.as_str().to_owned(), v.to_owned())),
                Err(_) => {
                    debug!(header = %name, "dropping header with non-visible-ASCII value");
                    None
                }
            })
            .collect();

        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers,
            body,
            params: None,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All route parameters captured for this request. Never fails: requests
    /// without parameters get an empty map.
    pub fn params(&self) -> &Params {
        self.params.as_ref().unwrap_or(&params::EMPTY)
    }

    /// `true` when the dispatcher attached a parameter map.
    pub fn has_params(&self) -> bool {
        self.params.is_some()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.as_ref().and_then(|p| p.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(headers: &[(&str, &[u8])]) -> http::request::Parts {
        let mut builder = http::Request::builder().method(Method::POST).uri("/users/sam?x=1");
        for (name, value) in headers {
            builder = builder.header(*name, http::HeaderValue::from_bytes(value).unwrap());
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn from_parts_copies_request_line_and_headers() {
        let req = Request::from_parts(parts(&[("Content-Type", b"application/json")]), Bytes::from_static(b"{}"));

        assert_eq!(*req.method(), Method::POST);
        assert_eq!(req.path(), "/users/sam");
        assert_eq!(req.query(), Some("x=1"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body(), b"{}");
        assert!(!req.has_params());
        assert!(req.params().is_empty());
    }

    #[test]
    fn non_ascii_header_values_are_dropped() {
        let req = Request::from_parts(
            parts(&[("authorization", b"Bearer \xfftoken"), ("x-ok", b"yes")]),
            Bytes::new(),
        );

        assert_eq!(req.header("authorization"), None);
        assert_eq!(req.header("x-ok"), Some("yes"));
        assert_eq!(req.headers().len(), 1);
    }
}
