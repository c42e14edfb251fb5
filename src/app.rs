//! The application: registries, handler table, mount point and dispatch.
//!
//! # Dispatch
//!
//! Every request goes through the same states:
//!
//! ```text
//! Matched ──▶ Bound ──▶ Invoked ──▶ Succeeded   (formatted reply, success hooks)
//!    │          │          │
//!    └──────────┴──────────┴─────▶ Failed      (error response, error hooks)
//! ```
//!
//! Exactly one [`Response`] comes out. Nothing a handler does reaches the
//! client before its outcome is known, so a failing handler never leaks a
//! partial body, and a hook can never alter what was decided.
//!
//! # Rebuilds
//!
//! Scanning a controller or adding a parser or formatter rebuilds the whole
//! [`HandlerTable`] under the registry lock and publishes it with a single
//! pointer swap. In-flight requests keep matching against the table they
//! started with.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::args::Args;
use crate::config::{AppConfig, ServerConfig};
use crate::content_type::{ContentTypeProvider, DefaultContentTypeProvider};
use crate::convert::{default_formatters, default_parsers, Arg, InputParser, OutputFormatter};
use crate::error::{BindingError, Error};
use crate::hooks::{panic_message, ErrorHandler, Hooks, SuccessHandler, UnknownPageHandler};
use crate::method::Method;
use crate::reply::Reply;
use crate::request::Request;
use crate::response::{Response, ResponseHandle};
use crate::route::{Controller, ParamSource, ParamSpec, RouteDescriptor, Routes};
use crate::session::{InMemorySessionManager, Session, SessionManager, SESSION_COOKIE};
use crate::table::{CompiledRoute, HandlerTable};

/// Operation name reported when the unknown-page handler fails.
const UNKNOWN_PAGE: &str = "unknown page handler";

/// Where the serving transport is reachable. Set by [`Server`](crate::Server)
/// once it is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

/// Everything a rebuild is computed from. Guarded by one mutex so that
/// rebuilds are serialised.
struct Registry {
    routes: Vec<Arc<RouteDescriptor>>,
    index: HashMap<(Method, String), usize>,
    parsers: HashMap<String, Arc<dyn InputParser>>,
    formatters: HashMap<String, Arc<dyn OutputFormatter>>,
}

/// An HTTP application.
///
/// Configure it (scan controllers, register converters and hooks), then
/// share it with a [`Server`](crate::Server) or call [`dispatch`](App::dispatch)
/// directly. Every configuration method takes `&self` and may also be called
/// while serving.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use spur::{App, Args, Controller, Routes, Server};
///
/// struct Hello;
///
/// impl Controller for Hello {
///     fn routes(routes: &mut Routes<Self>) {
///         routes.get("/", Self::index);
///     }
/// }
///
/// impl Hello {
///     async fn index(self: Arc<Self>, _args: Args) -> &'static str { "OK" }
/// }
///
/// # async fn run() -> Result<(), spur::Error> {
/// let app = Arc::new(App::mounted("/api"));
/// app.scan(Arc::new(Hello));
/// Server::bind(([0, 0, 0, 0], 3000).into()).serve(app).await
/// # }
/// ```
pub struct App {
    root_path: Option<String>,
    debug: bool,
    server_config: ServerConfig,
    server: RwLock<Option<ServerInfo>>,
    registry: Mutex<Registry>,
    table: RwLock<Arc<HandlerTable>>,
    content_types: RwLock<Arc<dyn ContentTypeProvider>>,
    sessions: RwLock<Arc<dyn SessionManager>>,
    unknown_page: RwLock<Option<Arc<dyn UnknownPageHandler>>>,
    hooks: Hooks,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// An app whose routes are all reachable under `root_path`.
    pub fn mounted(root_path: &str) -> Self {
        Self::with_config(AppConfig { root_path: Some(root_path.to_owned()), ..AppConfig::default() })
    }

    pub fn with_config(config: AppConfig) -> Self {
        let registry = Registry {
            routes: Vec::new(),
            index: HashMap::new(),
            parsers: default_parsers(),
            formatters: default_formatters(),
        };
        let table = HandlerTable::build(&registry.routes, &registry.parsers, &registry.formatters);
        Self {
            root_path: normalize_root(config.root_path),
            debug: config.debug,
            server_config: config.server,
            server: RwLock::new(None),
            registry: Mutex::new(registry),
            table: RwLock::new(Arc::new(table)),
            content_types: RwLock::new(Arc::new(DefaultContentTypeProvider::new())),
            sessions: RwLock::new(Arc::new(InMemorySessionManager::new())),
            unknown_page: RwLock::new(None),
            hooks: Hooks::default(),
        }
    }

    // ── Mounting ──────────────────────────────────────────────────────────────

    /// The mount prefix, or `""` when the app is mounted at the root.
    pub fn path(&self) -> &str {
        self.root_path.as_deref().unwrap_or("")
    }

    /// `scheme://host:port` followed by the mount prefix.
    pub fn root_url(&self) -> String {
        let (scheme, host, port) = match &*self.server.read() {
            Some(info) => (info.scheme.clone(), info.host.clone(), info.port),
            None => (
                self.server_config.scheme.clone(),
                self.server_config.host.clone(),
                self.server_config.port,
            ),
        };
        format!("{scheme}://{host}:{port}{}", self.path())
    }

    /// External path of an app-relative `path`.
    pub fn absolute_path(&self, path: &str) -> String {
        match &self.root_path {
            Some(root) => format!("{root}{path}"),
            None => path.to_owned(),
        }
    }

    /// App-relative path of an external `path`; the exact inverse of
    /// [`absolute_path`](App::absolute_path).
    ///
    /// `None` if `path` is not under the mount prefix. The prefix must end
    /// on a segment boundary: `/api` covers `/api/x`, not `/apix`.
    pub fn relative_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let Some(root) = &self.root_path else {
            return Some(path);
        };
        let rest = path.strip_prefix(root.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    pub fn is_debug(&self) -> bool { self.debug }

    pub(crate) fn set_server_info(&self, info: ServerInfo) {
        *self.server.write() = Some(info);
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Registers every route `target` declares, bound to `target`.
    ///
    /// A (method, pattern) pair that is already registered is overwritten in
    /// place: the last registration wins and keeps the first one's position.
    pub fn scan<C: Controller>(&self, target: Arc<C>) -> &Self {
        let scanned = Routes::scan(target);
        let mut guard = self.registry.lock();
        let registry = &mut *guard;
        for descriptor in scanned {
            let key = (descriptor.method, descriptor.pattern.clone());
            match registry.index.get(&key).copied() {
                Some(i) => {
                    let previous = &registry.routes[i].operation;
                    if *previous == descriptor.operation {
                        debug!(method = %key.0, pattern = %key.1, "route re-registered");
                    } else {
                        warn!(
                            method = %key.0,
                            pattern = %key.1,
                            replaced = %previous,
                            by = %descriptor.operation,
                            "route registered twice, last registration wins",
                        );
                    }
                    registry.routes[i] = Arc::new(descriptor);
                }
                None => {
                    registry.index.insert(key, registry.routes.len());
                    registry.routes.push(Arc::new(descriptor));
                }
            }
        }
        self.publish(registry);
        self
    }

    /// Registers `parser` under `name`, replacing any previous one.
    pub fn add_input_parser(&self, name: &str, parser: impl InputParser) -> &Self {
        let mut registry = self.registry.lock();
        registry.parsers.insert(name.to_owned(), Arc::new(parser));
        self.publish(&registry);
        self
    }

    /// Registers `formatter` under `name`, replacing any previous one.
    pub fn add_output_formatter(&self, name: &str, formatter: impl OutputFormatter) -> &Self {
        let mut registry = self.registry.lock();
        registry.formatters.insert(name.to_owned(), Arc::new(formatter));
        self.publish(&registry);
        self
    }

    pub fn input_parser(&self, name: &str) -> Option<Arc<dyn InputParser>> {
        self.registry.lock().parsers.get(name).cloned()
    }

    pub fn output_formatter(&self, name: &str) -> Option<Arc<dyn OutputFormatter>> {
        self.registry.lock().formatters.get(name).cloned()
    }

    pub fn set_content_type_provider(&self, provider: impl ContentTypeProvider) -> &Self {
        *self.content_types.write() = Arc::new(provider);
        self
    }

    pub fn set_session_manager(&self, manager: impl SessionManager) -> &Self {
        *self.sessions.write() = Arc::new(manager);
        self
    }

    pub fn session_manager(&self) -> Arc<dyn SessionManager> {
        Arc::clone(&self.sessions.read())
    }

    /// Adds a hook notified whenever a request is rejected or fails.
    pub fn add_error_handler(&self, hook: impl ErrorHandler) -> &Self {
        self.hooks.add_error(Arc::new(hook));
        self
    }

    /// Adds a hook notified whenever a routed operation succeeds.
    pub fn add_success_handler(&self, hook: impl SuccessHandler) -> &Self {
        self.hooks.add_success(Arc::new(hook));
        self
    }

    /// Answers unmatched requests with `handler` instead of `404`.
    pub fn set_unknown_page_handler(&self, handler: impl UnknownPageHandler) -> &Self {
        *self.unknown_page.write() = Some(Arc::new(handler));
        self
    }

    /// The currently published table.
    pub fn handler_table(&self) -> Arc<HandlerTable> {
        Arc::clone(&self.table.read())
    }

    /// Fails if any registered route is left out of the table.
    pub fn validate(&self) -> Result<(), Error> {
        let table = self.handler_table();
        if table.problems().is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(table.problems().join("; ")))
        }
    }

    fn publish(&self, registry: &Registry) {
        let table = HandlerTable::build(&registry.routes, &registry.parsers, &registry.formatters);
        for problem in table.problems() {
            warn!(%problem, "route left out of the handler table");
        }
        debug!(routes = table.len(), "handler table rebuilt");
        *self.table.write() = Arc::new(table);
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    /// Creates a session and sets its cookie on `response`.
    pub fn open_session(&self, response: &ResponseHandle) -> Arc<Session> {
        let session = self.session_manager().create();
        response.set_cookie(SESSION_COOKIE, session.token(), self.cookie_path());
        session
    }

    /// Destroys the request's session, if any, and expires its cookie.
    pub fn close_session(&self, request: &Request, response: &ResponseHandle) -> bool {
        let Some(token) = request.cookie(SESSION_COOKIE) else {
            return false;
        };
        let existed = self.session_manager().destroy(token);
        response.expire_cookie(SESSION_COOKIE, self.cookie_path());
        existed
    }

    fn cookie_path(&self) -> &str {
        self.root_path.as_deref().unwrap_or("/")
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Routes one request and produces its one response.
    ///
    /// `request.path()` is the external path; the mount prefix is stripped
    /// before matching.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let table = self.handler_table();

        let relative = match self.relative_path(request.path()) {
            Some("") => "/".to_owned(),
            Some(path) => path.to_owned(),
            None => return self.unmatched(&table, request),
        };
        let Some(matched) = table.lookup(request.method(), &relative) else {
            return self.unmatched(&table, request);
        };
        let route = matched.route;
        request.params = matched.params;
        let request = Arc::new(request);
        let handle = ResponseHandle::new();

        let operation = route.descriptor.operation();
        let args = match self.bind(route, &request, &handle) {
            Ok(args) => args,
            Err(err) => return self.fail(&request, err),
        };

        let invoker = Arc::clone(&route.descriptor.invoker);
        let call_args = args.clone();
        let outcome = AssertUnwindSafe(async move { invoker.call(call_args).await })
            .catch_unwind()
            .await;
        let reply = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(cause)) => {
                let err = Error::Invocation { operation: operation.name().to_owned(), cause };
                return self.fail(&request, err);
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(%operation, %message, "operation panicked");
                let err = Error::Panicked { operation: operation.name().to_owned(), message };
                return self.fail(&request, err);
            }
        };

        let rendered = self.render(
            operation.name(),
            &table,
            route.formatter.as_ref(),
            route.descriptor.produces(),
            &reply,
            &handle,
        );
        match rendered {
            Ok(response) => {
                debug!(
                    method = %request.method(),
                    path = %request.path(),
                    %operation,
                    status = %response.status_code(),
                    "request handled",
                );
                self.hooks.fire_success(&request, operation, &args, &reply);
                response
            }
            Err(err) => self.fail(&request, err),
        }
    }

    /// Resolves every declared parameter, or fails before anything is invoked.
    fn bind(
        &self,
        route: &CompiledRoute,
        request: &Arc<Request>,
        handle: &ResponseHandle,
    ) -> Result<Args, Error> {
        let operation = route.descriptor.operation().name();
        let mut values = Vec::with_capacity(route.parsers.len());
        for (param, parser) in route.descriptor.params.iter().zip(&route.parsers) {
            let raw = match &param.source {
                ParamSource::Request => {
                    values.push((None, Arg::new(Arc::clone(request))));
                    continue;
                }
                ParamSource::Response => {
                    values.push((None, Arg::new(handle.clone())));
                    continue;
                }
                ParamSource::Session => {
                    let session = match request.cookie(SESSION_COOKIE) {
                        Some(token) => {
                            let manager = self.session_manager();
                            catch_unwind(AssertUnwindSafe(|| manager.find(token)))
                                .map_err(|panic| contained(operation, "session manager", SESSION_COOKIE, panic))?
                        }
                        None => None,
                    };
                    values.push((None, session.map_or_else(Arg::absent, Arg::new)));
                    continue;
                }
                ParamSource::Path(name) => request.param(name).map(str::as_bytes),
                ParamSource::Query(name) => request.query_param(name).map(str::as_bytes),
                ParamSource::Header(name) => request.header(name).map(str::as_bytes),
                ParamSource::Body => Some(request.body().as_ref()),
            };
            let arg = parse_param(operation, param, parser.as_deref(), raw)?;
            values.push((param.source.name().map(str::to_owned), arg));
        }
        Ok(Args::new(values))
    }

    /// Turns a reply into a response. The handle's status and headers go on top.
    fn render(
        &self,
        operation: &str,
        table: &HandlerTable,
        formatter: Option<&Arc<dyn OutputFormatter>>,
        produces: Option<&str>,
        reply: &Reply,
        handle: &ResponseHandle,
    ) -> Result<Response, Error> {
        let response = match reply {
            Reply::Empty => Response::status(StatusCode::OK),
            Reply::Response(response) => response.clone(),
            _ => {
                let name = produces.or_else(|| reply.default_formatter()).ok_or_else(|| {
                    Error::Configuration(format!("{reply:?} needs a route that names an output formatter"))
                })?;
                let formatter = match formatter {
                    Some(formatter) => Arc::clone(formatter),
                    None => table.formatters.get(name).cloned().ok_or_else(|| {
                        Error::Configuration(format!("no output formatter named `{name}`"))
                    })?,
                };
                let body = catch_unwind(AssertUnwindSafe(|| formatter.format(reply)))
                    .map_err(|panic| contained(operation, "output formatter", name, panic))?
                    .map_err(|cause| Error::Format { formatter: name.to_owned(), cause })?;
                let provider = Arc::clone(&self.content_types.read());
                let content_type = catch_unwind(AssertUnwindSafe(|| provider.resolve(name)))
                    .map_err(|panic| contained(operation, "content type provider", name, panic))?;
                Response::builder().bytes(&content_type, body)
            }
        };
        Ok(handle.apply(response))
    }

    fn unmatched(&self, table: &HandlerTable, request: Request) -> Response {
        let handler = self.unknown_page.read().clone();
        let Some(handler) = handler else {
            let err = Error::RouteNotFound {
                method: request.method().to_string(),
                path: request.path().to_owned(),
            };
            return self.fail(&request, err);
        };

        let reply = match catch_unwind(AssertUnwindSafe(|| handler.handle(&request))) {
            Ok(Ok(reply)) => reply,
            Ok(Err(cause)) => {
                let err = Error::Invocation { operation: UNKNOWN_PAGE.to_owned(), cause };
                return self.fail(&request, err);
            }
            Err(panic) => {
                let err = Error::Panicked {
                    operation: UNKNOWN_PAGE.to_owned(),
                    message: panic_message(panic.as_ref()),
                };
                return self.fail(&request, err);
            }
        };
        match self.render(UNKNOWN_PAGE, table, None, None, &reply, &ResponseHandle::new()) {
            Ok(response) => response,
            Err(err) => self.fail(&request, err),
        }
    }

    /// The failure path: classify, notify error hooks, answer.
    fn fail(&self, request: &Request, err: Error) -> Response {
        let status = err.status();
        if status.is_server_error() {
            warn!(method = %request.method(), path = %request.path(), %status, error = %err, "request failed");
        } else {
            debug!(method = %request.method(), path = %request.path(), %status, error = %err, "request rejected");
        }

        self.hooks.fire_error(status, request, &err);

        let body = if self.debug {
            err.detail()
        } else {
            status.canonical_reason().unwrap_or("Error").to_owned()
        };
        Response::builder().status(status).text(body)
    }
}

impl Default for App {
    fn default() -> Self { Self::new() }
}

fn normalize_root(root: Option<String>) -> Option<String> {
    let root = root?;
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else if trimmed.starts_with('/') {
        Some(trimmed.to_owned())
    } else {
        Some(format!("/{trimmed}"))
    }
}

/// A panic caught in a pluggable converter, reported against `operation`.
fn contained(operation: &str, stage: &str, name: &str, panic: Box<dyn Any + Send>) -> Error {
    let message = panic_message(panic.as_ref());
    error!(%operation, %stage, %name, %message, "converter panicked");
    Error::Panicked { operation: format!("{operation}: {stage} `{name}`"), message }
}

fn parse_param(
    operation: &str,
    param: &ParamSpec,
    parser: Option<&dyn InputParser>,
    raw: Option<&[u8]>,
) -> Result<Arg, Error> {
    let origin = param.source.origin();
    let name = param.source.name().unwrap_or(origin).to_owned();
    let parser_name = param.parser.clone().unwrap_or_default();

    let Some(raw) = raw else {
        return if param.required {
            Err(BindingError::Missing { origin, name }.into())
        } else {
            Ok(Arg::absent())
        };
    };
    let Some(parser) = parser else {
        let cause = format!("no input parser named `{parser_name}`").into();
        return Err(BindingError::Invalid { origin, name, parser: parser_name, cause }.into());
    };
    match catch_unwind(AssertUnwindSafe(|| parser.parse(raw))) {
        Ok(parsed) => parsed
            .map_err(|cause| BindingError::Invalid { origin, name, parser: parser_name, cause }.into()),
        Err(panic) => Err(contained(operation, "input parser", &parser_name, panic)),
    }
}
