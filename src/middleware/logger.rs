//! Request logging.

use std::time::Instant;

use tracing::info;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

/// Logs `method` and `path` when a request enters the chain, then the
/// resulting status and latency once the rest of the chain has answered.
///
/// Sits in every route's default chain, so rejections by later middleware are
/// logged with their status too.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

impl Middleware for Logger {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let method = req.method().clone();
            let path = req.path().to_owned();
            let started = Instant::now();

            info!(%method, %path, "request received");
            let res = next.run(req).await;
            info!(
                %method,
                %path,
                status = res.status_code().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
            res
        })
    }
}
