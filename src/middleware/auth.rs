//! Authorization-header gate.

use http::StatusCode;
use tracing::warn;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Requires a non-empty `Authorization` header.
///
/// The header value is not interpreted; validating the token is the
/// handler's job. Requests without one get `403 Forbidden` and never reach the
/// rest of the chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct Auth;

impl Middleware for Auth {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        let authorized = req
            .header("authorization")
            .is_some_and(|token| !token.trim().is_empty());

        if !authorized {
            warn!(method = %req.method(), path = req.path(), "unauthorized request");
            return Box::pin(async { Response::error(StatusCode::FORBIDDEN, "Forbidden") });
        }

        next.run(req)
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
        let chain: Vec<BoxedMiddleware> = vec![Arc::new(Auth)];
        let endpoint = (|_req: Request| async { "secret" }).into_boxed_handler();
        Next::new(&chain, &endpoint).run(req).await
    }

    #[tokio::test]
    async fn missing_header_is_forbidden() {
        let res = run(Request::new(Method::GET, "/admin")).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(res.body(), b"Forbidden\n");
    }

    #[tokio::test]
    async fn blank_header_is_forbidden() {
        let req = Request::new(Method::GET, "/admin").with_header("Authorization", "  ");
        assert_eq!(run(req).await.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn any_token_passes() {
        let req = Request::new(Method::GET, "/admin").with_header("authorization", "Bearer abc");
        let res = run(req).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"secret");
    }
}
