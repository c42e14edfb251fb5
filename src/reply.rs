//! What a handler hands back, before it is formatted.
//!
//! A [`Reply`] is the value success hooks observe and output formatters
//! serialise. Anything implementing [`IntoReply`] can be returned from a
//! handler, including `Result<T, E>` for any `T: IntoReply` and any error
//! convertible into a [`BoxError`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

use crate::error::BoxError;
use crate::response::Response;

/// A handler's return value, type-erased just enough to be formatted.
#[derive(Clone)]
pub enum Reply {
    /// No body. Answers `200 OK` unless the handler set another status.
    Empty,
    /// Formatted by `text` unless the route names another formatter.
    Text(String),
    /// Formatted by `bytes` unless the route names another formatter.
    Bytes(Bytes),
    /// Formatted by `json` unless the route names another formatter.
    Json(serde_json::Value),
    /// A response built by the handler itself; sent as is.
    Response(Response),
    /// Any other value. The route must name a formatter that understands it.
    Custom(Arc<dyn Any + Send + Sync>, &'static str),
}

impl Reply {
    /// Wraps a value only a custom [`OutputFormatter`](crate::OutputFormatter)
    /// knows how to render.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Self::Custom(Arc::new(value), std::any::type_name::<T>())
    }

    /// The value wrapped by [`Reply::custom`], if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(value, _) => value.downcast_ref(),
            _ => None,
        }
    }

    /// Formatter used when the route does not name one.
    pub(crate) fn default_formatter(&self) -> Option<&'static str> {
        match self {
            Self::Text(_) => Some("text"),
            Self::Bytes(_) => Some("bytes"),
            Self::Json(_) => Some("json"),
            Self::Empty | Self::Response(_) | Self::Custom(..) => None,
        }
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::Response(r) => f.debug_tuple("Response").field(&r.status_code()).finish(),
            Self::Custom(_, type_name) => f.debug_tuple("Custom").field(type_name).finish(),
        }
    }
}

/// Serialises `T` with the `json` formatter: `return Ok(Json(user))`.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion from a handler's return value into a [`Reply`].
///
/// An `Err` is the handler failing; the dispatcher turns it into an error
/// response and notifies the error hooks.
pub trait IntoReply: Send + 'static {
    fn into_reply(self) -> Result<Reply, BoxError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(self) }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(Reply::Response(self)) }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(Reply::Empty) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(Reply::Text(self.to_owned())) }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(Reply::Text(self)) }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(Reply::Bytes(self.into())) }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(Reply::Bytes(self)) }
}

impl IntoReply for serde_json::Value {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(Reply::Json(self)) }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoReply for StatusCode {
    fn into_reply(self) -> Result<Reply, BoxError> { Ok(Reply::Response(Response::status(self))) }
}

impl<T: Serialize + Send + 'static> IntoReply for Json<T> {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Json(serde_json::to_value(&self.0)?))
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError> + Send + 'static,
{
    fn into_reply(self) -> Result<Reply, BoxError> {
        match self {
            Ok(value) => value.into_reply(),
            Err(err) => Err(err.into()),
        }
    }
}
