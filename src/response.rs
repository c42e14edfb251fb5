//! Outgoing HTTP response type and the handle handlers use to shape it.
//!
//! Handlers rarely build a [`Response`] themselves: they return a value, the
//! dispatcher formats it, and any status or headers set through a
//! [`ResponseHandle`] are applied on top. Returning a `Response` directly is
//! still allowed and bypasses the formatters.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use parking_lot::Mutex;
use tracing::warn;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use spur::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), headers: Vec::new(), status: code }
    }

    /// `302 Found` pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        Self::builder()
            .status(StatusCode::FOUND)
            .header("location", location)
            .no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive lookup of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Converts into the `http` type hyper writes to the wire.
    ///
    /// Headers that are not valid HTTP are dropped with a warning.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        for (name, value) in self.headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                (Ok(name), Ok(value)) => { res.headers_mut().append(name, value); }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.bytes("application/json", body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        let body: String = body.into();
        self.bytes("text/plain; charset=utf-8", body)
    }

    /// Terminate with a body of any content type.
    pub fn bytes(self, content_type: &str, body: impl Into<Bytes>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body: body.into(), headers, status: self.status }
    }

    /// Terminate with no body (e.g. `204 No Content`, redirects).
    pub fn no_body(self) -> Response {
        Response { body: Bytes::new(), headers: self.headers, status: self.status }
    }
}

// ── ResponseHandle ────────────────────────────────────────────────────────────

/// Status and headers a handler wants on its success response.
#[derive(Debug, Default)]
pub(crate) struct ResponseHead {
    pub(crate) status: Option<StatusCode>,
    pub(crate) headers: Vec<(String, String)>,
}

/// Shared handle to the response of the request being handled.
///
/// Declare a `response()` parameter to receive one. Changes only reach the
/// client if the handler succeeds; a failing request gets the error response
/// and nothing else.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle(Arc<Mutex<ResponseHead>>);

impl ResponseHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: StatusCode) {
        self.0.lock().status = Some(status);
    }

    pub fn add_header(&self, name: &str, value: &str) {
        self.0.lock().headers.push((name.to_owned(), value.to_owned()));
    }

    /// Replies with `302 Found` and a `Location` header.
    ///
    /// This only shapes the response; the handler still returns normally.
    pub fn redirect(&self, location: &str) {
        let mut head = self.0.lock();
        head.status = Some(StatusCode::FOUND);
        head.headers.push(("location".to_owned(), location.to_owned()));
    }

    pub fn set_cookie(&self, name: &str, value: &str, path: &str) {
        self.add_header("set-cookie", &format!("{name}={value}; Path={path}; HttpOnly"));
    }

    pub(crate) fn expire_cookie(&self, name: &str, path: &str) {
        self.add_header("set-cookie", &format!("{name}=; Path={path}; Max-Age=0"));
    }

    /// Applies the recorded status and headers onto `response`.
    ///
    /// A `content-type` set through the handle replaces the formatter's.
    pub(crate) fn apply(&self, mut response: Response) -> Response {
        let head = std::mem::take(&mut *self.0.lock());
        if let Some(status) = head.status {
            response.status = status;
        }
        if head.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            response.headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
        }
        response.headers.extend(head.headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_puts_content_type_first() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/1")
            .json(b"{}".to_vec());
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()[0], ("content-type".to_owned(), "application/json".to_owned()));
        assert_eq!(res.header("Location"), Some("/users/1"));
    }

    #[test]
    fn handle_redirect_overrides_status_and_adds_location() {
        let handle = ResponseHandle::new();
        handle.redirect("/login");
        let res = handle.apply(Response::text("moved"));
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.header("location"), Some("/login"));
    }

    #[test]
    fn handle_content_type_replaces_formatter_choice() {
        let handle = ResponseHandle::new();
        handle.add_header("Content-Type", "text/csv");
        let res = handle.apply(Response::text("a,b"));
        assert_eq!(res.header("content-type"), Some("text/csv"));
        assert_eq!(res.headers().len(), 1);
    }

    #[test]
    fn into_http_drops_invalid_headers() {
        let res = Response::builder()
            .header("x-ok", "1")
            .header("bad header", "2")
            .no_body()
            .into_http();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().len(), 1);
        assert!(res.headers().contains_key("x-ok"));
    }
}
