//! # spur
//!
//! A small HTTP application core: declare routes on controller objects,
//! bind their arguments through named parsers, format their results through
//! named formatters, and observe every outcome through hooks.
//!
//! ## The contract
//!
//! nginx handles TLS, rate limiting, slow clients, and body-size limits.
//! spur does not. What's left for spur:
//!
//! - Routing: literal routes first, then patterns by specificity, ties in
//!   registration order
//! - Binding: path, query, header and body values through [`InputParser`]s
//! - Formatting: replies through [`OutputFormatter`]s, content types from a
//!   [`ContentTypeProvider`]
//! - Hooks: [`SuccessHandler`]s and [`ErrorHandler`]s, each isolated from
//!   the others
//! - Mounting: one prefix for the whole app
//! - Graceful shutdown: SIGTERM / Ctrl-C, drains in-flight requests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use spur::{App, Args, BoxError, Controller, HttpError, Json, Routes, Server};
//! use http::StatusCode;
//!
//! struct Users;
//!
//! impl Controller for Users {
//!     fn routes(routes: &mut Routes<Self>) {
//!         routes.get("/users/{id}", Self::show).path::<u64>("id");
//!         routes.post("/users", Self::create).json_body();
//!     }
//! }
//!
//! impl Users {
//!     async fn show(self: Arc<Self>, args: Args) -> Result<Json<serde_json::Value>, BoxError> {
//!         let id: u64 = args.get(0)?;
//!         if id == 0 {
//!             return Err(HttpError::new(StatusCode::NOT_FOUND, "no such user").into());
//!         }
//!         Ok(Json(serde_json::json!({ "id": id, "name": "alice" })))
//!     }
//!
//!     async fn create(self: Arc<Self>, args: Args) -> Result<StatusCode, BoxError> {
//!         let user: serde_json::Value = args.json(0)?;
//!         tracing::info!(%user, "created");
//!         Ok(StatusCode::CREATED)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), spur::Error> {
//!     let app = Arc::new(App::mounted("/api"));
//!     app.scan(Arc::new(Users));
//!     Server::bind(([0, 0, 0, 0], 3000).into()).serve(app).await
//! }
//! ```

mod app;
mod args;
mod config;
mod content_type;
mod convert;
mod error;
mod handler;
mod hooks;
mod method;
mod reply;
mod request;
mod response;
mod route;
mod server;
mod session;
mod table;

pub mod health;

pub use app::{App, ServerInfo};
pub use args::{ArgError, Args};
pub use config::{AppConfig, ServerConfig};
pub use content_type::{ContentTypeProvider, DefaultContentTypeProvider};
pub use convert::{Arg, FromStrParser, InputParser, OutputFormatter, Param};
pub use error::{BindingError, BoxError, Error, HttpError};
pub use handler::{ErasedOperation, Handler};
pub use hooks::{ErrorHandler, SuccessHandler, UnknownPageHandler};
pub use method::{Method, UnsupportedMethod};
pub use reply::{IntoReply, Json, Reply};
pub use request::Request;
pub use response::{Response, ResponseBuilder, ResponseHandle};
pub use route::{Controller, Operation, ParamSource, ParamSpec, RouteBuilder, RouteDescriptor, Routes};
pub use server::Server;
pub use session::{InMemorySessionManager, Session, SessionManager, SESSION_COOKIE};
pub use table::{HandlerTable, RouteMatch};
