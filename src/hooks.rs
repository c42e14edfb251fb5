//! Success and error hooks, and the unknown-page fallback.
//!
//! Hooks observe a dispatch after its response is decided. They run
//! synchronously, in registration order, and cannot change the response.
//! A panicking hook is logged and skipped; the others still run.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use http::StatusCode;
use parking_lot::RwLock;
use tracing::error;

use crate::args::Args;
use crate::error::{BoxError, Error};
use crate::reply::Reply;
use crate::request::Request;
use crate::route::Operation;

/// Notified whenever a request is rejected or fails.
pub trait ErrorHandler: Send + Sync + 'static {
    fn on_error(&self, status: StatusCode, request: &Request, cause: &Error);
}

impl<F> ErrorHandler for F
where
    F: Fn(StatusCode, &Request, &Error) + Send + Sync + 'static,
{
    fn on_error(&self, status: StatusCode, request: &Request, cause: &Error) {
        self(status, request, cause)
    }
}

/// Notified whenever a routed operation succeeds.
pub trait SuccessHandler: Send + Sync + 'static {
    fn on_success(&self, request: &Request, operation: &Operation, args: &Args, result: &Reply);
}

impl<F> SuccessHandler for F
where
    F: Fn(&Request, &Operation, &Args, &Reply) + Send + Sync + 'static,
{
    fn on_success(&self, request: &Request, operation: &Operation, args: &Args, result: &Reply) {
        self(request, operation, args, result)
    }
}

/// Answers requests no route matches, instead of a plain `404`.
///
/// The reply is formatted like any handler's; an error takes the failure
/// path with the error's status.
pub trait UnknownPageHandler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Result<Reply, BoxError>;
}

impl<F> UnknownPageHandler for F
where
    F: Fn(&Request) -> Result<Reply, BoxError> + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Result<Reply, BoxError> {
        self(request)
    }
}

/// Append-only hook lists.
///
/// Firing iterates over a snapshot, so a hook registered concurrently (or by
/// a hook) is notified from the next dispatch on.
#[derive(Default)]
pub(crate) struct Hooks {
    errors: RwLock<Vec<Arc<dyn ErrorHandler>>>,
    successes: RwLock<Vec<Arc<dyn SuccessHandler>>>,
}

impl Hooks {
    pub(crate) fn add_error(&self, hook: Arc<dyn ErrorHandler>) {
        self.errors.write().push(hook);
    }

    pub(crate) fn add_success(&self, hook: Arc<dyn SuccessHandler>) {
        self.successes.write().push(hook);
    }

    pub(crate) fn fire_error(&self, status: StatusCode, request: &Request, cause: &Error) {
        let hooks = self.errors.read().clone();
        for hook in hooks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook.on_error(status, request, cause))) {
                error!(%status, panic = %panic_message(panic.as_ref()), "error hook panicked");
            }
        }
    }

    pub(crate) fn fire_success(&self, request: &Request, operation: &Operation, args: &Args, result: &Reply) {
        let hooks = self.successes.read().clone();
        for hook in hooks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook.on_success(request, operation, args, result))) {
                error!(%operation, panic = %panic_message(panic.as_ref()), "success hook panicked");
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
