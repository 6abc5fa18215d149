//! Middleware layer.
//!
//! A middleware intercepts a request on its way to the handler: it can run
//! logic before calling the rest of the chain, after it returns, or both, and
//! it can short-circuit by returning a response without calling [`Next::run`].
//!
//! Every route owns a chain fixed at registration time:
//!
//! ```text
//! Recovery → Logger → caller middleware… → handler
//! ```
//!
//! The first entry wraps everything after it (onion order): it runs its
//! pre-logic first and its post-logic last. [`Recovery`] is part of the
//! default chain unless the router was built with recovery disabled.
//!
//! ```rust,no_run
//! use hawkwing::{middleware, Method, Request, Router};
//!
//! async fn create_user(_req: Request) -> &'static str { "User created!" }
//!
//! let app = Router::new().add_route(
//!     Method::POST,
//!     "/users",
//!     create_user,
//!     [middleware::auth(), middleware::content_type(["application/json"])],
//! );
//! ```

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;

mod auth;
mod content_type;
mod logger;
mod recovery;

pub use auth::Auth;
pub use content_type::ContentTypeGuard;
pub use logger::Logger;
pub use recovery::Recovery;

/// A request interceptor.
///
/// Implementations return a boxed future so they can be stored as trait
/// objects in a route's chain:
///
/// ```rust
/// use hawkwing::{BoxFuture, Request};
/// use hawkwing::middleware::{Middleware, Next};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
///         Box::pin(async move {
///             let mut res = next.run(req).await;
///             res.set_header("x-powered-by", "hawkwing");
///             res
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a>;
}

/// A middleware shared by every route that lists it.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The remainder of a route's chain, handed to each middleware.
///
/// Walking the chain borrows the route's stored slice; nothing is allocated
/// per hop beyond the middleware's own future.
pub struct Next<'a> {
    chain: &'a [BoxedMiddleware],
    endpoint: &'a BoxedHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [BoxedMiddleware], endpoint: &'a BoxedHandler) -> Self {
        Self { chain, endpoint }
    }

    /// Calls the next middleware, or the route handler once the chain is
    /// exhausted.
    pub fn run(self, req: Request) -> BoxFuture<'a> {
        match self.chain.split_first() {
            Some((head, rest)) => head.handle(req, Next::new(rest, self.endpoint)),
            None => self.endpoint.call(req),
        }
    }
}

/// Adapts a closure into a middleware.
///
/// ```rust
/// use hawkwing::middleware;
///
/// let tag = middleware::from_fn(|req, next| Box::pin(async move {
///     let mut res = next.run(req).await;
///     res.set_header("x-tag", "1");
///     res
/// }));
/// ```
pub fn from_fn<F>(f: F) -> BoxedMiddleware
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a> + Send + Sync + 'static,
{
    Arc::new(FromFn(f))
}

struct FromFn<F>(F);

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        (self.0)(req, next)
    }
}

/// Rejects requests without a non-empty `Authorization` header (`403`).
pub fn auth() -> BoxedMiddleware {
    Arc::new(Auth)
}

/// Rejects requests whose `Content-Type` is not one of `allowed` (`400`).
pub fn content_type<I, S>(allowed: I) -> BoxedMiddleware
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Arc::new(ContentTypeGuard::new(allowed))
}

/// Logs every request and the status it produced.
pub fn logger() -> BoxedMiddleware {
    Arc::new(Logger)
}

/// Converts a panic inside the rest of the chain into a `500` response.
pub fn recovery() -> BoxedMiddleware {
    Arc::new(Recovery)
}
