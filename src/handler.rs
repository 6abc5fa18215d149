//! Route handlers.
//!
//! A handler is any `Fn(Request) -> impl Future<Output = impl IntoResponse>`.
//! Routes of one method live in a single `Vec`, so each handler is erased to a
//! [`BoxedHandler`] at registration and sits at the end of its route's
//! middleware chain (see [`crate::middleware::Next`]).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The future every middleware and endpoint returns.
///
/// Endpoints produce `BoxFuture<'static>`; middleware futures may borrow the
/// route's chain for `'a`.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = Response> + Send + 'a>>;

/// Object-safe form of a handler, as stored in the route table.
#[doc(hidden)]
pub trait Endpoint {
    fn call(&self, req: Request) -> BoxFuture<'static>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn Endpoint + Send + Sync + 'static>;

/// Anything that can answer a routed request.
///
/// Sealed: satisfied automatically by async functions and closures of the
/// form `async fn(Request) -> impl IntoResponse`.
pub trait Handler: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod sealed {
    pub trait Sealed {}
}

impl<F, Fut> sealed::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoResponse,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoResponse,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(AsyncFn(self))
    }
}

struct AsyncFn<F>(F);

impl<F, Fut> Endpoint for AsyncFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future + Send + 'static,
    Fut::Output: IntoResponse,
{
    fn call(&self, req: Request) -> BoxFuture<'static> {
        let pending = (self.0)(req);
        Box::pin(async move { pending.await.into_response() })
    }
}
