//! Resource-name to MIME type resolution.

use std::collections::HashMap;

/// Maps a formatter name or resource name to the `content-type` sent with it.
///
/// The dispatcher calls [`resolve`](ContentTypeProvider::resolve) with the
/// name of the output formatter that rendered the reply (`"json"`, `"csv"`,
/// or a resource name such as `"report.pdf"`).
pub trait ContentTypeProvider: Send + Sync + 'static {
    fn resolve(&self, name: &str) -> String;
}

impl<F> ContentTypeProvider for F
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    fn resolve(&self, name: &str) -> String {
        self(name)
    }
}

const OCTET_STREAM: &str = "application/octet-stream";

const BUILTIN: &[(&str, &str)] = &[
    ("bin",      OCTET_STREAM),
    ("bytes",    OCTET_STREAM),
    ("css",      "text/css; charset=utf-8"),
    ("csv",      "text/csv"),
    ("gif",      "image/gif"),
    ("htm",      "text/html; charset=utf-8"),
    ("html",     "text/html; charset=utf-8"),
    ("ico",      "image/x-icon"),
    ("jpeg",     "image/jpeg"),
    ("jpg",      "image/jpeg"),
    ("js",       "text/javascript; charset=utf-8"),
    ("json",     "application/json"),
    ("msgpack",  "application/msgpack"),
    ("pdf",      "application/pdf"),
    ("png",      "image/png"),
    ("svg",      "image/svg+xml"),
    ("text",     "text/plain; charset=utf-8"),
    ("txt",      "text/plain; charset=utf-8"),
    ("wasm",     "application/wasm"),
    ("xml",      "application/xml"),
];

/// Extension-table provider used unless the application installs its own.
///
/// Resolution looks at the text after the last `.` (or the whole name when
/// there is none), case-insensitively, and falls back to
/// `application/octet-stream`.
///
/// ```rust
/// use spur::{ContentTypeProvider, DefaultContentTypeProvider};
///
/// let mime = DefaultContentTypeProvider::new().with("ndjson", "application/x-ndjson");
/// assert_eq!(mime.resolve("json"), "application/json");
/// assert_eq!(mime.resolve("export.NDJSON"), "application/x-ndjson");
/// assert_eq!(mime.resolve("blob"), "application/octet-stream");
/// ```
#[derive(Debug, Clone)]
pub struct DefaultContentTypeProvider {
    types: HashMap<String, String>,
}

impl DefaultContentTypeProvider {
    pub fn new() -> Self {
        let types = BUILTIN.iter()
            .map(|(ext, mime)| ((*ext).to_owned(), (*mime).to_owned()))
            .collect();
        Self { types }
    }

    /// Adds or replaces the MIME type for an extension.
    pub fn with(mut self, extension: &str, mime: &str) -> Self {
        self.types.insert(extension.to_ascii_lowercase(), mime.to_owned());
        self
    }
}

impl Default for DefaultContentTypeProvider {
    fn default() -> Self { Self::new() }
}

impl ContentTypeProvider for DefaultContentTypeProvider {
    fn resolve(&self, name: &str) -> String {
        let extension = name.rsplit_once('.').map_or(name, |(_, ext)| ext);
        self.types
            .get(&extension.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| OCTET_STREAM.to_owned())
    }
}
