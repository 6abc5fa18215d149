//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C (or when the future passed to
//! [`Server::serve_with_shutdown`] resolves) the server:
//! 1. Stops `listener.accept()`, so no new connections are made.
//! 2. Asks every open connection to finish its in-flight request and close.
//! 3. Waits up to the shutdown grace period (5 s by default) for them.
//! 4. Aborts whatever is still running and returns.

use std::convert::Infallible;
use std::future::Future;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

const DEFAULT_GRACE: Duration = Duration::from_secs(5);

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
    grace: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`; host names are
    /// resolved) when [`serve`](Server::serve) is called.
    ///
    /// ```rust,no_run
    /// use hawkwing::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        Self { bind: Bind::Addr(addr.to_owned()), grace: DEFAULT_GRACE }
    }

    /// Serves on a listener that is already bound, e.g. to port 0.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener), grace: DEFAULT_GRACE }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::bind(&config.addr).with_shutdown_grace(config.shutdown_grace())
    }

    /// How long in-flight requests may run after shutdown begins.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns after a graceful shutdown triggered by SIGTERM or Ctrl-C.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but shuts down when `signal` resolves.
    pub async fn serve_with_shutdown<S>(self, router: Router, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()> + Send,
    {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr.as_str()).await?,
            Bind::Listener(listener) => listener,
        };
        let local_addr = listener.local_addr()?;
        announce(local_addr);

        // Frozen from here on: connection tasks only ever read it.
        let router = Arc::new(router);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        // `select!` polls the signal by reference on every turn, so it has to
        // stay put in memory.
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Arms are polled top to bottom: a pending shutdown wins over a
                // connection that is waiting to be accepted.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    // Each connection gets its own handle on the router and on
                    // the shutdown flag.
                    let router = Arc::clone(&router);
                    let shutdown_rx = shutdown_rx.clone();
                    tasks.spawn(serve_connection(router, stream, remote_addr, shutdown_rx));
                }

                // Reap finished connections so the set only holds live ones.
                // The guard stops `join_next` on an empty set from resolving
                // to `None` in a tight loop.
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("connection task failed: {e}");
                    }
                }
            }
        }

        drop(listener);
        // Receivers may all be gone already; nothing left to tell then.
        let _ = shutdown_tx.send(true);

        // Connections finish their in-flight request and close; whatever is
        // still running when the grace period ends is aborted.
        let drain = async {
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.grace, drain).await.is_err() {
            warn!(
                remaining = tasks.len(),
                grace_secs = self.grace.as_secs_f64(),
                "grace period elapsed, closing remaining connections"
            );
            tasks.shutdown().await;
        }

        info!("hawkwing stopped");
        Ok(())
    }
}

async fn serve_connection(
    router: Arc<Router>,
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // hyper calls the service once per request on this connection, and each
    // returned future must be 'static, so it takes its own clone of the router.
    let svc = service_fn(move |req| {
        let router = Arc::clone(&router);
        async move { dispatch(router, req).await }
    });

    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    // `graceful_shutdown` must be called once; after that the connection is
    // polled until hyper closes it.
    let mut draining = false;
    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    error!(peer = %remote_addr, "connection error: {e}");
                }
                break;
            }
            _ = shutdown_rx.changed(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Core hot path: routes one request and produces one response.
///
/// The error type is [`Infallible`]: every failure becomes a response, so
/// hyper never sees an error.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = parts.uri.path(), "reading request body: {e}");
            return Ok(Response::error(StatusCode::BAD_REQUEST, "Bad Request").into_http());
        }
    };

    let response = router.dispatch(Request::from_parts(parts, body)).await;
    Ok(response.into_http())
}

fn announce(addr: SocketAddr) {
    info!(%addr, "hawkwing listening");

    if addr.ip().is_unspecified() {
        match outbound_ip() {
            Some(ip) => info!(url = %format!("http://{}", SocketAddr::new(ip, addr.port())), "publicly accessible"),
            None => warn!("could not determine a non-loopback address"),
        }
    }
}

/// The local address the OS would use for outbound traffic. Connecting a UDP
/// socket only selects a route; nothing is sent.
fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
