//! Panic recovery.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use futures_util::FutureExt;
use http::StatusCode;
use tracing::error;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Turns a panic raised by the rest of the chain into `500 Internal Server
/// Error`.
///
/// Both phases are guarded: building the inner future (closures that panic
/// before returning one) and polling it. Panics raised anywhere else, such as
/// in middleware placed before `Recovery`, are not caught.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recovery;

impl Middleware for Recovery {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        let method = req.method().clone();
        let path = req.path().to_owned();

        let inner = match panic::catch_unwind(AssertUnwindSafe(|| next.run(req))) {
            Ok(fut) => fut,
            Err(payload) => {
                report(&method, &path, payload.as_ref());
                return Box::pin(async { internal_error() });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(inner).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => {
                    report(&method, &path, payload.as_ref());
                    internal_error()
                }
            }
        })
    }
}

fn report(method: &http::Method, path: &str, payload: &(dyn Any + Send)) {
    error!(%method, path, panic = panic_message(payload), "handler panicked, recovered");
}

fn internal_error() -> Response {
    Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
