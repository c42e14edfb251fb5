//! Input parsers and output formatters.
//!
//! Both are looked up by name. An input parser turns raw request text or
//! body bytes into an [`Arg`]; an output formatter turns a [`Reply`] into
//! body bytes. Registering a converter under an existing name replaces it.
//!
//! | name     | parser produces        | formatter accepts        |
//! |----------|------------------------|--------------------------|
//! | `string` | `String`               |                          |
//! | `i32` `i64` `u32` `u64` `f64` `bool` | the number / flag |       |
//! | `bytes`  | `Bytes`                | `Reply::Bytes`, `Reply::Text` |
//! | `json`   | `serde_json::Value`    | `Reply::Json`, `Reply::Text`  |
//! | `text`   |                        | `Reply::Text`, `Reply::Json`  |

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::BoxError;
use crate::reply::Reply;

// ── Arg ───────────────────────────────────────────────────────────────────────

/// One bound argument. `None` inside marks an optional value that was absent.
#[derive(Clone)]
pub struct Arg {
    value: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl Arg {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self { value: Some(Arc::new(value)), type_name: std::any::type_name::<T>() }
    }

    pub(crate) fn absent() -> Self {
        Self { value: None, type_name: "<absent>" }
    }

    pub fn is_present(&self) -> bool { self.value.is_some() }
    pub fn type_name(&self) -> &'static str { self.type_name }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_ref()?.downcast_ref()
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Arg").field(&self.type_name).finish()
    }
}

// ── Param ─────────────────────────────────────────────────────────────────────

/// Types a route parameter can be declared as, with the parser that makes them.
///
/// Implement it for your own types and register a parser under
/// [`PARSER`](Param::PARSER):
///
/// ```rust
/// use spur::{Arg, Param};
///
/// #[derive(Clone)]
/// struct Rgb(u8, u8, u8);
///
/// impl Param for Rgb {
///     const PARSER: &'static str = "rgb";
/// }
///
/// fn parse_rgb(raw: &[u8]) -> Result<Arg, spur::BoxError> {
///     let hex = std::str::from_utf8(raw)?;
///     let n = u32::from_str_radix(hex.trim_start_matches('#'), 16)?;
///     Ok(Arg::new(Rgb((n >> 16) as u8, (n >> 8) as u8, n as u8)))
/// }
/// ```
pub trait Param: Any + Send + Sync + Clone {
    const PARSER: &'static str;
}

macro_rules! param {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(impl Param for $ty { const PARSER: &'static str = $name; })*
    };
}

param! {
    String            => "string",
    i32               => "i32",
    i64               => "i64",
    u32               => "u32",
    u64               => "u64",
    f64               => "f64",
    bool              => "bool",
    Bytes             => "bytes",
    serde_json::Value => "json",
}

// ── InputParser ───────────────────────────────────────────────────────────────

/// Named converter from raw request data to an argument value.
///
/// Path, query and header values arrive as their decoded UTF-8 bytes; body
/// parameters receive the whole body.
pub trait InputParser: Send + Sync + 'static {
    fn parse(&self, raw: &[u8]) -> Result<Arg, BoxError>;
}

impl<F> InputParser for F
where
    F: Fn(&[u8]) -> Result<Arg, BoxError> + Send + Sync + 'static,
{
    fn parse(&self, raw: &[u8]) -> Result<Arg, BoxError> {
        self(raw)
    }
}

/// Parses UTF-8 text with `T::from_str`.
pub struct FromStrParser<T>(PhantomData<fn() -> T>);

impl<T> FromStrParser<T> {
    pub fn new() -> Self { Self(PhantomData) }
}

impl<T> Default for FromStrParser<T> {
    fn default() -> Self { Self::new() }
}

impl<T> InputParser for FromStrParser<T>
where
    T: FromStr + Any + Send + Sync,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fn parse(&self, raw: &[u8]) -> Result<Arg, BoxError> {
        let text = std::str::from_utf8(raw)?;
        Ok(Arg::new(text.trim().parse::<T>()?))
    }
}

struct StringParser;

impl InputParser for StringParser {
    fn parse(&self, raw: &[u8]) -> Result<Arg, BoxError> {
        Ok(Arg::new(std::str::from_utf8(raw)?.to_owned()))
    }
}

struct BytesParser;

impl InputParser for BytesParser {
    fn parse(&self, raw: &[u8]) -> Result<Arg, BoxError> {
        Ok(Arg::new(Bytes::copy_from_slice(raw)))
    }
}

struct JsonParser;

impl InputParser for JsonParser {
    fn parse(&self, raw: &[u8]) -> Result<Arg, BoxError> {
        Ok(Arg::new(serde_json::from_slice::<serde_json::Value>(raw)?))
    }
}

pub(crate) fn default_parsers() -> HashMap<String, Arc<dyn InputParser>> {
    let parsers: [(&str, Arc<dyn InputParser>); 9] = [
        ("string", Arc::new(StringParser)),
        ("i32",    Arc::new(FromStrParser::<i32>::new())),
        ("i64",    Arc::new(FromStrParser::<i64>::new())),
        ("u32",    Arc::new(FromStrParser::<u32>::new())),
        ("u64",    Arc::new(FromStrParser::<u64>::new())),
        ("f64",    Arc::new(FromStrParser::<f64>::new())),
        ("bool",   Arc::new(FromStrParser::<bool>::new())),
        ("bytes",  Arc::new(BytesParser)),
        ("json",   Arc::new(JsonParser)),
    ];
    parsers.into_iter().map(|(name, p)| (name.to_owned(), p)).collect()
}

// ── OutputFormatter ───────────────────────────────────────────────────────────

/// Named converter from a handler's [`Reply`] to response body bytes.
///
/// The response's `content-type` is resolved from the formatter's name by the
/// application's [`ContentTypeProvider`](crate::ContentTypeProvider).
pub trait OutputFormatter: Send + Sync + 'static {
    fn format(&self, reply: &Reply) -> Result<Bytes, BoxError>;
}

impl<F> OutputFormatter for F
where
    F: Fn(&Reply) -> Result<Bytes, BoxError> + Send + Sync + 'static,
{
    fn format(&self, reply: &Reply) -> Result<Bytes, BoxError> {
        self(reply)
    }
}

fn unsupported(formatter: &str, reply: &Reply) -> BoxError {
    format!("`{formatter}` cannot render {reply:?}").into()
}

struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn format(&self, reply: &Reply) -> Result<Bytes, BoxError> {
        match reply {
            Reply::Text(text) => Ok(Bytes::from(text.clone())),
            Reply::Json(value) => Ok(Bytes::from(value.to_string())),
            other => Err(unsupported("text", other)),
        }
    }
}

struct BytesFormatter;

impl OutputFormatter for BytesFormatter {
    fn format(&self, reply: &Reply) -> Result<Bytes, BoxError> {
        match reply {
            Reply::Bytes(bytes) => Ok(bytes.clone()),
            Reply::Text(text) => Ok(Bytes::from(text.clone())),
            other => Err(unsupported("bytes", other)),
        }
    }
}

struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format(&self, reply: &Reply) -> Result<Bytes, BoxError> {
        match reply {
            Reply::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
            Reply::Text(text) => Ok(Bytes::from(serde_json::to_vec(text)?)),
            other => Err(unsupported("json", other)),
        }
    }
}

pub(crate) fn default_formatters() -> HashMap<String, Arc<dyn OutputFormatter>> {
    let formatters: [(&str, Arc<dyn OutputFormatter>); 3] = [
        ("text",  Arc::new(TextFormatter)),
        ("bytes", Arc::new(BytesFormatter)),
        ("json",  Arc::new(JsonFormatter)),
    ];
    formatters.into_iter().map(|(name, f)| (name.to_owned(), f)).collect()
}
