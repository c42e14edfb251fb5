//! Bound handler arguments.

use std::any::Any;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::convert::Arg;

/// Why an argument could not be read back out of [`Args`].
///
/// This is a route declaration mistake (asking for the wrong type or
/// index), so it surfaces as a server error when returned from a handler.
#[derive(Debug, Error)]
pub enum ArgError {
    #[error("no argument at position {0}")]
    OutOfRange(usize),
    #[error("no argument named `{0}`")]
    UnknownName(String),
    #[error("argument {index} is absent")]
    Absent { index: usize },
    #[error("argument {index} is a `{found}`, not a `{expected}`")]
    TypeMismatch { index: usize, expected: &'static str, found: &'static str },
    #[error("argument {index} does not deserialize: {cause}")]
    Json { index: usize, #[source] cause: serde_json::Error },
}

/// The arguments bound for one invocation, in declaration order.
///
/// Cloning is cheap; success hooks see the same values the handler did.
///
/// ```rust,ignore
/// // Route::get("/items/{id}").path::<u64>("id").optional_query::<String>("tag")
/// let id: u64 = args.get(0)?;
/// let tag: Option<String> = args.get_opt(1)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Args {
    entries: Arc<Vec<(Option<String>, Arg)>>,
}

impl Args {
    pub(crate) fn new(entries: Vec<(Option<String>, Arg)>) -> Self {
        Self { entries: Arc::new(entries) }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.entries.iter().map(|(_, arg)| arg)
    }

    /// Borrows the value at `index`.
    pub fn get_ref<T: Any>(&self, index: usize) -> Result<&T, ArgError> {
        let arg = self.arg(index)?;
        if !arg.is_present() {
            return Err(ArgError::Absent { index });
        }
        arg.downcast_ref::<T>().ok_or(ArgError::TypeMismatch {
            index,
            expected: std::any::type_name::<T>(),
            found: arg.type_name(),
        })
    }

    /// Clones the value at `index`.
    pub fn get<T: Any + Clone>(&self, index: usize) -> Result<T, ArgError> {
        self.get_ref::<T>(index).cloned()
    }

    /// Like [`get`](Args::get), but an absent optional value is `Ok(None)`.
    pub fn get_opt<T: Any + Clone>(&self, index: usize) -> Result<Option<T>, ArgError> {
        if !self.arg(index)?.is_present() {
            return Ok(None);
        }
        self.get(index).map(Some)
    }

    /// Clones the value declared under `name` (path, query or header name).
    pub fn named<T: Any + Clone>(&self, name: &str) -> Result<T, ArgError> {
        let index = self.entries.iter()
            .position(|(n, _)| n.as_deref() == Some(name))
            .ok_or_else(|| ArgError::UnknownName(name.to_owned()))?;
        self.get(index)
    }

    /// Deserializes a `json` argument into `T`.
    pub fn json<T: DeserializeOwned>(&self, index: usize) -> Result<T, ArgError> {
        let value = self.get_ref::<serde_json::Value>(index)?;
        T::deserialize(value).map_err(|cause| ArgError::Json { index, cause })
    }

    fn arg(&self, index: usize) -> Result<&Arg, ArgError> {
        self.entries.get(index)
            .map(|(_, arg)| arg)
            .ok_or(ArgError::OutOfRange(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn sample() -> Args {
        Args::new(vec![
            (Some("id".into()), Arg::new(7u64)),
            (Some("tag".into()), Arg::absent()),
            (None, Arg::new(serde_json::json!({"name": "bob"}))),
        ])
    }

    #[derive(Deserialize)]
    struct Body { name: String }

    #[test]
    fn typed_access_by_index_and_name() {
        let args = sample();
        assert_eq!(args.get::<u64>(0).ok(), Some(7));
        assert_eq!(args.named::<u64>("id").ok(), Some(7));
        assert!(matches!(args.get::<i64>(0), Err(ArgError::TypeMismatch { index: 0, .. })));
        assert!(matches!(args.get::<u64>(9), Err(ArgError::OutOfRange(9))));
        assert!(matches!(args.named::<u64>("nope"), Err(ArgError::UnknownName(_))));
    }

    #[test]
    fn absent_values() {
        let args = sample();
        assert_eq!(args.get_opt::<String>(1).ok(), Some(None));
        assert!(matches!(args.get::<String>(1), Err(ArgError::Absent { index: 1 })));
    }

    #[test]
    fn json_deserializes_into_typed_structs() {
        let body: Option<Body> = sample().json(2).ok();
        assert_eq!(body.map(|b| b.name).as_deref(), Some("bob"));
    }
}
