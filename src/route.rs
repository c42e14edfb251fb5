//! Declarative route registration.
//!
//! A [`Controller`] lists its routes once; [`App::scan`](crate::App::scan)
//! binds each of them to the controller instance and publishes them in the
//! handler table. There is no reflection: the list *is* the annotation.
//!
//! ```rust
//! use std::sync::Arc;
//! use spur::{Args, BoxError, Controller, Routes};
//!
//! struct Items;
//!
//! impl Controller for Items {
//!     fn routes(routes: &mut Routes<Self>) {
//!         routes.get("/items/{id}", Self::show).path::<u64>("id");
//!         routes.get("/items", Self::list).optional_query::<String>("tag");
//!     }
//! }
//!
//! impl Items {
//!     async fn show(self: Arc<Self>, args: Args) -> Result<String, BoxError> {
//!         let id: u64 = args.get(0)?;
//!         Ok(format!("item {id}"))
//!     }
//!
//!     async fn list(self: Arc<Self>, args: Args) -> String {
//!         let tag: Option<String> = args.get_opt(0).unwrap_or_default();
//!         format!("items tagged {tag:?}")
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::convert::Param;
use crate::handler::{BoxedOperation, Handler};
use crate::method::Method;

/// An application object whose operations are reachable over HTTP.
pub trait Controller: Send + Sync + Sized + 'static {
    fn routes(routes: &mut Routes<Self>);
}

// ── Parameter declarations ───────────────────────────────────────────────────

/// Where a declared parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSource {
    /// A `{name}` segment of the route pattern.
    Path(String),
    /// A query-string parameter.
    Query(String),
    /// A request header.
    Header(String),
    /// The whole request body.
    Body,
    /// The request itself, as `Arc<Request>`.
    Request,
    /// A [`ResponseHandle`](crate::ResponseHandle) for status and headers.
    Response,
    /// The caller's session, as `Option<Arc<Session>>` via `get_opt`.
    Session,
}

impl ParamSource {
    pub(crate) fn origin(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Query(_) => "query",
            Self::Header(_) => "header",
            Self::Body => "body",
            Self::Request => "request",
            Self::Response => "response",
            Self::Session => "session",
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        match self {
            Self::Path(n) | Self::Query(n) | Self::Header(n) => Some(n),
            _ => None,
        }
    }
}

/// One declared parameter of a route.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub(crate) source: ParamSource,
    /// Input parser name. `None` for values the framework injects.
    pub(crate) parser: Option<String>,
    pub(crate) required: bool,
}

impl ParamSpec {
    pub fn source(&self) -> &ParamSource { &self.source }
    pub fn parser(&self) -> Option<&str> { self.parser.as_deref() }
    pub fn required(&self) -> bool { self.required }
}

// ── RouteDescriptor ──────────────────────────────────────────────────────────

/// Identity of a routed operation, as success hooks see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: String,
    target: &'static str,
}

impl Operation {
    /// Operation name; the handler's path (e.g. `app::Items::show`) unless renamed.
    pub fn name(&self) -> &str { &self.name }
    /// Type name of the controller the operation is bound to.
    pub fn target(&self) -> &'static str { self.target }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A route pattern bound to an operation on a controller instance.
///
/// Immutable once scanned; shared by every table rebuilt afterwards.
pub struct RouteDescriptor {
    pub(crate) method: Method,
    pub(crate) pattern: String,
    pub(crate) operation: Operation,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) produces: Option<String>,
    pub(crate) invoker: BoxedOperation,
}

impl RouteDescriptor {
    pub fn method(&self) -> Method { self.method }
    pub fn pattern(&self) -> &str { &self.pattern }
    pub fn operation(&self) -> &Operation { &self.operation }
    pub fn params(&self) -> &[ParamSpec] { &self.params }
    pub fn produces(&self) -> Option<&str> { self.produces.as_deref() }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("operation", &self.operation)
            .field("params", &self.params)
            .field("produces", &self.produces)
            .finish_non_exhaustive()
    }
}

// ── Routes ───────────────────────────────────────────────────────────────────

/// Collects the routes a [`Controller`] declares, bound to one instance.
pub struct Routes<C> {
    target: Arc<C>,
    routes: Vec<RouteDescriptor>,
}

impl<C: Controller> Routes<C> {
    pub(crate) fn scan(target: Arc<C>) -> Vec<RouteDescriptor> {
        let mut routes = Self { target, routes: Vec::new() };
        C::routes(&mut routes);
        routes.routes
    }

    /// The instance every declared operation is bound to.
    pub fn target(&self) -> &Arc<C> { &self.target }

    /// Declares `handler` for `method` + `pattern`.
    ///
    /// Patterns are URL paths with `{name}` variable segments and an optional
    /// trailing `{*name}` (or `*`) wildcard.
    pub fn route<H: Handler<C>>(&mut self, method: Method, pattern: &str, handler: H) -> RouteBuilder<'_> {
        self.routes.push(RouteDescriptor {
            method,
            pattern: pattern.to_owned(),
            operation: Operation {
                name: std::any::type_name::<H>().to_owned(),
                target: std::any::type_name::<C>(),
            },
            params: Vec::new(),
            produces: None,
            invoker: handler.bind(Arc::clone(&self.target)),
        });
        let last = self.routes.len() - 1;
        RouteBuilder { route: &mut self.routes[last] }
    }

    pub fn get<H: Handler<C>>(&mut self, pattern: &str, handler: H) -> RouteBuilder<'_> {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post<H: Handler<C>>(&mut self, pattern: &str, handler: H) -> RouteBuilder<'_> {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put<H: Handler<C>>(&mut self, pattern: &str, handler: H) -> RouteBuilder<'_> {
        self.route(Method::Put, pattern, handler)
    }

    pub fn patch<H: Handler<C>>(&mut self, pattern: &str, handler: H) -> RouteBuilder<'_> {
        self.route(Method::Patch, pattern, handler)
    }

    pub fn delete<H: Handler<C>>(&mut self, pattern: &str, handler: H) -> RouteBuilder<'_> {
        self.route(Method::Delete, pattern, handler)
    }
}

/// Declares a route's parameters, in the order the handler reads them.
pub struct RouteBuilder<'a> {
    route: &'a mut RouteDescriptor,
}

impl RouteBuilder<'_> {
    fn param(self, source: ParamSource, parser: Option<&str>, required: bool) -> Self {
        self.route.params.push(ParamSpec {
            source,
            parser: parser.map(str::to_owned),
            required,
        });
        self
    }

    /// A `{name}` segment of the pattern.
    pub fn path<T: Param>(self, name: &str) -> Self {
        self.param(ParamSource::Path(name.to_owned()), Some(T::PARSER), true)
    }

    /// A required query parameter.
    pub fn query<T: Param>(self, name: &str) -> Self {
        self.param(ParamSource::Query(name.to_owned()), Some(T::PARSER), true)
    }

    /// A query parameter that may be absent; read it with `get_opt`.
    pub fn optional_query<T: Param>(self, name: &str) -> Self {
        self.param(ParamSource::Query(name.to_owned()), Some(T::PARSER), false)
    }

    /// A required request header.
    pub fn header<T: Param>(self, name: &str) -> Self {
        self.param(ParamSource::Header(name.to_owned()), Some(T::PARSER), true)
    }

    /// A request header that may be absent; read it with `get_opt`.
    pub fn optional_header<T: Param>(self, name: &str) -> Self {
        self.param(ParamSource::Header(name.to_owned()), Some(T::PARSER), false)
    }

    /// The request body, parsed as `T`.
    pub fn body<T: Param>(self) -> Self {
        self.param(ParamSource::Body, Some(T::PARSER), true)
    }

    /// The request body as a `serde_json::Value`; read it with `Args::json`.
    pub fn json_body(self) -> Self {
        self.body::<serde_json::Value>()
    }

    pub fn request(self) -> Self {
        self.param(ParamSource::Request, None, true)
    }

    pub fn response(self) -> Self {
        self.param(ParamSource::Response, None, true)
    }

    pub fn session(self) -> Self {
        self.param(ParamSource::Session, None, false)
    }

    /// Uses the parser registered as `name` for the last declared parameter.
    pub fn parser(self, name: &str) -> Self {
        if let Some(param) = self.route.params.last_mut() {
            if param.parser.is_some() {
                param.parser = Some(name.to_owned());
            }
        }
        self
    }

    /// Renders the reply with the output formatter registered as `name`.
    pub fn produces(self, name: &str) -> Self {
        self.route.produces = Some(name.to_owned());
        self
    }

    /// Overrides the operation name hooks and logs report.
    pub fn named(self, name: &str) -> Self {
        self.route.operation.name = name.to_owned();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;

    struct Api;

    impl Controller for Api {
        fn routes(routes: &mut Routes<Self>) {
            routes.get("/", Self::index);
            routes.post("/items/{id}", Self::index)
                .path::<u64>("id")
                .query::<String>("color").parser("hex")
                .json_body()
                .response()
                .parser("ignored")
                .produces("csv")
                .named("create");
        }
    }

    impl Api {
        async fn index(self: Arc<Self>, _args: Args) -> &'static str { "OK" }
    }

    #[test]
    fn declarations_are_recorded_in_order() {
        let routes = Routes::scan(Arc::new(Api));
        assert_eq!(routes.len(), 2);

        let index = &routes[0];
        assert_eq!(index.method(), Method::Get);
        assert!(index.operation().name().contains("index"));
        assert!(index.operation().target().ends_with("Api"));

        let create = &routes[1];
        assert_eq!(create.operation().name(), "create");
        assert_eq!(create.produces(), Some("csv"));
        let parsers: Vec<_> = create.params().iter().map(ParamSpec::parser).collect();
        assert_eq!(parsers, [Some("u64"), Some("hex"), Some("json"), None]);
        assert_eq!(create.params()[0].source(), &ParamSource::Path("id".into()));
    }
}
