//! Unified error type and the failure taxonomy used by the dispatcher.

use std::error::Error as _;

use http::StatusCode;
use thiserror::Error;

/// A boxed, thread-safe error. What handlers and converters fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by spur's fallible operations.
///
/// Every failure the dispatcher can observe maps onto one variant, and every
/// variant maps onto exactly one HTTP status through [`Error::status`].
#[derive(Debug, Error)]
pub enum Error {
    /// No pattern matched and no unknown-page handler is installed.
    #[error("no route for {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// A declared argument was missing or could not be converted.
    #[error("bad request: {0}")]
    Binding(#[from] BindingError),

    /// The target operation returned an error.
    #[error("operation `{operation}` failed: {cause}")]
    Invocation {
        operation: String,
        #[source]
        cause: BoxError,
    },

    /// The target operation panicked.
    #[error("operation `{operation}` panicked: {message}")]
    Panicked { operation: String, message: String },

    /// Route, parser or formatter misconfiguration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An output formatter rejected the reply it was handed.
    #[error("cannot format reply with `{formatter}`: {cause}")]
    Format {
        formatter: String,
        #[source]
        cause: BoxError,
    },

    /// Malformed configuration file.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// Binding to a port, accepting a connection, reading a file.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status this failure is reported with.
    ///
    /// Binding failures are client errors. An invocation failure is a server
    /// error unless its cause chain carries an [`HttpError`], whose status wins.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Binding(_) => StatusCode::BAD_REQUEST,
            Self::Invocation { cause, .. } => carried_status(&**cause)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Panicked { .. }
            | Self::Configuration(_)
            | Self::Format { .. }
            | Self::Config(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The error followed by every `caused by:` link of its source chain.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\ncaused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

fn carried_status(mut err: &(dyn std::error::Error + 'static)) -> Option<StatusCode> {
    loop {
        if let Some(http) = err.downcast_ref::<HttpError>() {
            return Some(http.status);
        }
        err = err.source()?;
    }
}

/// Why an argument could not be bound. Always a client error.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("missing {origin} parameter `{name}`")]
    Missing { origin: &'static str, name: String },

    #[error("invalid {origin} parameter `{name}` (parser `{parser}`): {cause}")]
    Invalid {
        origin: &'static str,
        name: String,
        parser: String,
        #[source]
        cause: BoxError,
    },
}

/// An error that carries its own HTTP status.
///
/// Return it (or anything whose source chain contains it) from a handler to
/// answer with that status instead of `500`:
///
/// ```rust
/// use spur::HttpError;
/// use http::StatusCode;
///
/// fn load(id: u64) -> Result<String, HttpError> {
///     Err(HttpError::new(StatusCode::NOT_FOUND, format!("no item {id}")))
/// }
/// ```
#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
}
