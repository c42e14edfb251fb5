//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;

use crate::method::Method;

/// An incoming HTTP request as the dispatcher sees it.
///
/// Handlers that declare a `request()` parameter receive it as
/// `Arc<Request>`; hooks receive it by reference.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    /// Builds a request for `target` (path plus optional `?query`).
    ///
    /// ```rust
    /// use spur::{Method, Request};
    ///
    /// let req = Request::new(Method::Get, "/items?id=7&tag=a%20b");
    /// assert_eq!(req.path(), "/items");
    /// assert_eq!(req.query_param("tag"), Some("a b"));
    /// ```
    pub fn new(method: Method, target: &str) -> Self {
        Self::from_parts(method, target, Vec::new(), Bytes::new())
    }

    pub(crate) fn from_parts(
        method: Method,
        target: &str,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            method,
            path: path.to_owned(),
            query,
            headers,
            body,
            params: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn query(&self) -> &[(String, String)] { &self.query }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a decoded query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Value of a cookie sent in any `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
            .flat_map(|(_, v)| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    // Malformed encodings are dropped rather than failing the whole request;
    // a route that needs the parameter reports it missing.
    serde_urlencoded::from_str(query).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query() {
        let req = Request::new(Method::Get, "/search?q=rust&q=tokio&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_param("q"), Some("rust"));
        assert_eq!(req.query_param("page"), Some("2"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn empty_target_is_root() {
        assert_eq!(Request::new(Method::Get, "?x=1").path(), "/");
    }

    #[test]
    fn headers_and_cookies_are_case_insensitive_by_name() {
        let req = Request::new(Method::Get, "/")
            .with_header("Content-Type", "text/plain")
            .with_header("COOKIE", "theme=dark; sessionToken=abc123");
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.cookie("sessionToken"), Some("abc123"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.cookie("other"), None);
    }
}
