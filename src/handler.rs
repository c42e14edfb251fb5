//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The handler table holds operations declared on *different* controller
//! types, each with its own future type. Rust collections hold one concrete
//! type, so every operation is bound to its controller instance and hidden
//! behind `dyn ErasedOperation`.
//!
//! ```text
//! async fn show(self: Arc<Self>, args: Args) -> Result<Json<Item>, HttpError>
//!        ↓ routes.get("/items/{id}", Self::show)
//! Self::show.bind(target)                     ← Handler blanket impl
//!        ↓
//! Arc::new(Bound { target, f: Self::show })   ← heap-allocated wrapper
//!        ↓  stored as BoxedOperation = Arc<dyn ErasedOperation>
//! op.call(args) at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { show(target, args).await.into_reply() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::args::Args;
use crate::error::BoxError;
use crate::reply::{IntoReply, Reply};

/// A heap-allocated, type-erased future.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// An operation already bound to the controller instance it was declared on.
#[doc(hidden)]
pub trait ErasedOperation: Send + Sync + 'static {
    fn call(&self, args: Args) -> BoxFuture<Result<Reply, BoxError>>;
}

#[doc(hidden)]
pub type BoxedOperation = Arc<dyn ErasedOperation>;

/// Implemented for every valid route handler of controller `C`.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure shaped like
///
/// ```text
/// async fn name(self: Arc<C>, args: Args) -> impl IntoReply
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler<C>: private::Sealed<C> + Send + Sync + 'static {
    #[doc(hidden)]
    fn bind(self, target: Arc<C>) -> BoxedOperation;
}

mod private {
    pub trait Sealed<C> {}
}

impl<C, F, Fut, R> private::Sealed<C> for F
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply,
{
}

impl<C, F, Fut, R> Handler<C> for F
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply,
{
    fn bind(self, target: Arc<C>) -> BoxedOperation {
        Arc::new(Bound { target, f: self })
    }
}

/// Holds a concrete handler `F` with its target and implements
/// [`ErasedOperation`], bridging the typed world to the trait-object world.
struct Bound<C, F> {
    target: Arc<C>,
    f: F,
}

impl<C, F, Fut, R> ErasedOperation for Bound<C, F>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply,
{
    fn call(&self, args: Args) -> BoxFuture<Result<Reply, BoxError>> {
        let fut = (self.f)(Arc::clone(&self.target), args);
        Box::pin(async move { fut.await.into_reply() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter { greeting: &'static str }

    impl Greeter {
        async fn greet(self: Arc<Self>, _args: Args) -> String {
            format!("{}, world", self.greeting)
        }
    }

    #[tokio::test]
    async fn bound_methods_see_their_target() {
        let op = Greeter::greet.bind(Arc::new(Greeter { greeting: "hello" }));
        match op.call(Args::default()).await {
            Ok(Reply::Text(text)) => assert_eq!(text, "hello, world"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn closures_are_handlers() {
        let op = (|_: Arc<()>, args: Args| async move { args.len().to_string() }).bind(Arc::new(()));
        assert!(matches!(op.call(Args::default()).await, Ok(Reply::Text(t)) if t == "0"));
    }
}
