//! Content-Type allow-list.

use http::StatusCode;
use tracing::warn;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Requires the request's `Content-Type` header to equal one of the allowed
/// values exactly. Anything else, including a missing header, gets
/// `400 Bad Request`.
#[derive(Clone, Debug)]
pub struct ContentTypeGuard {
    allowed: Vec<String>,
}

impl ContentTypeGuard {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed: allowed.into_iter().map(Into::into).collect() }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    fn permits(&self, content_type: &str) -> bool {
        self.allowed.iter().any(|ct| ct == content_type)
    }
}

impl Middleware for ContentTypeGuard {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        let content_type = req.header("content-type").unwrap_or_default();
        if self.permits(content_type) {
            return next.run(req);
        }

        warn!(content_type, path = req.path(), "invalid content-type");
        Box::pin(async { Response::error(StatusCode::BAD_REQUEST, "Invalid Content-Type") })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;

    use super::*;
    use crate::handler::Handler;
    use crate::middleware::BoxedMiddleware;

    async fn run(req: Request) -> Response {
        let chain: Vec<BoxedMiddleware> =
            vec![Arc::new(ContentTypeGuard::new(["application/json", "text/plain"]))];
        let endpoint = (|_req: Request| async { "accepted" }).into_boxed_handler();
        Next::new(&chain, &endpoint).run(req).await
    }

    #[tokio::test]
    async fn allowed_type_passes() {
        let req = Request::new(Method::POST, "/users").with_header("Content-Type", "text/plain");
        let res = run(req).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"accepted");
    }

    #[tokio::test]
    async fn other_type_is_rejected() {
        let req = Request::new(Method::POST, "/users").with_header("Content-Type", "text/html");
        let res = run(req).await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(res.body(), b"Invalid Content-Type\n");
    }

    #[tokio::test]
    async fn missing_type_is_rejected() {
        let res = run(Request::new(Method::POST, "/users")).await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn matching_is_exact() {
        let guard = ContentTypeGuard::new(["application/json"]);
        assert!(guard.permits("application/json"));
        assert!(!guard.permits("application/json; charset=utf-8"));
        assert!(!guard.permits(""));
    }
}
