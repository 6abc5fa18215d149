//! Route table and dispatcher.
//!
//! One ordered list of routes per HTTP method. A request is matched by a
//! linear scan in registration order and the first matching route wins, so
//! registration order is part of the routing contract: register the more
//! specific of two overlapping templates first.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;

use http::Method;
use tracing::debug;

use crate::config::RouterConfig;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{self, BoxedMiddleware, Next};
use crate::pattern::{self, Pattern};
use crate::request::Request;
use crate::response::Response;
use crate::static_files;

/// A registered route. Immutable once built.
struct Route {
    template: String,
    pattern: Pattern,
    chain: Box<[BoxedMiddleware]>,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve),
/// which freezes it for the lifetime of the server. Every registration call
/// returns `self` so routes chain naturally.
///
/// Each route's chain starts with the default middleware, in this order:
///
/// 1. [`Recovery`](middleware::Recovery), unless disabled through
///    [`RouterConfig::recover_panics`]
/// 2. [`Logger`](middleware::Logger)
///
/// followed by the middleware given at registration.
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
    defaults: Vec<BoxedMiddleware>,
}

impl Router {
    /// A router whose routes recover from handler panics.
    pub fn new() -> Self {
        Self::with_config(&RouterConfig::default())
    }

    pub fn with_config(config: &RouterConfig) -> Self {
        let mut defaults = Vec::with_capacity(2);
        if config.recover_panics {
            defaults.push(middleware::recovery());
        }
        defaults.push(middleware::logger());

        Self { routes: HashMap::new(), defaults }
    }

    /// Registers `handler` for `method` + `path`, wrapped by `middlewares`.
    ///
    /// Path parameters use `:name` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use hawkwing::{middleware, Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .add_route(Method::GET,  "/users/:name", get_user,    [])
    ///     .add_route(Method::POST, "/users",       create_user, [middleware::auth()]);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route template. Routes are declared at
    /// startup, so a bad template is a programming error.
    pub fn add_route<I>(self, method: Method, path: &str, handler: impl Handler, middlewares: I) -> Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        let pattern = Pattern::compile(path)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.insert(method, path, pattern, handler.into_boxed_handler(), middlewares)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.add_route(Method::GET, path, handler, [])
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.add_route(Method::POST, path, handler, [])
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.add_route(Method::PUT, path, handler, [])
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.add_route(Method::PATCH, path, handler, [])
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.add_route(Method::DELETE, path, handler, [])
    }

    /// Serves the files under `dir` for `GET` requests to `prefix` and every
    /// path below it: with prefix `/static`, `/static/css/site.css` is read
    /// from `dir/css/site.css`.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` does not start with `/`.
    pub fn load_static(self, prefix: &str, dir: impl Into<PathBuf>) -> Self {
        let pattern = Pattern::prefix(prefix)
            .unwrap_or_else(|e| panic!("invalid static prefix `{prefix}`: {e}"));
        let handler = static_files::serve(prefix, dir).into_boxed_handler();
        self.insert(Method::GET, prefix, pattern, handler, [])
    }

    fn insert<I>(
        mut self,
        method: Method,
        path: &str,
        pattern: Pattern,
        handler: BoxedHandler,
        middlewares: I,
    ) -> Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        let chain: Box<[BoxedMiddleware]> = self.defaults.iter()
            .cloned()
            .chain(middlewares)
            .collect();

        debug!(%method, path, middleware = chain.len(), "route registered");

        self.routes.entry(method).or_default().push(Route {
            template: path.to_owned(),
            pattern,
            chain,
            handler,
        });
        self
    }

    /// Registered `(method, template)` pairs. Order within one method is
    /// match-priority order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter()
            .flat_map(|(method, routes)| routes.iter().map(move |r| (method, r.template.as_str())))
    }

    /// Routes one request and produces one response.
    ///
    /// Unknown methods and unmatched paths yield `404 Not Found`.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let Some(routes) = self.routes.get(&req.method) else {
            debug!(method = %req.method, path = %req.path, "no routes for method");
            return Response::not_found();
        };

        // Match on the decoded path; values that are not UTF-8 once decoded
        // are matched as sent.
        let decoded = urlencoding::decode(&req.path).unwrap_or(Cow::Borrowed(req.path.as_str()));
        let path = pattern::normalize(&decoded);
        let matched = routes.iter()
            .find_map(|route| route.pattern.matches(path).map(|params| (route, params)));

        let Some((route, params)) = matched else {
            debug!(method = %req.method, path = %req.path, "no route matched");
            return Response::not_found();
        };

        if !params.is_empty() {
            req.params = Some(params);
        }

        Next::new(&route.chain, &route.handler).run(req).await
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
