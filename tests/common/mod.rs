//! Shared helpers for the integration tests: a server on an ephemeral port
//! and a bare HTTP/1.1 client over a raw TCP stream.

use std::net::SocketAddr;
use std::time::Duration;

use hawkwing::{Router, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), hawkwing::Error>>,
}

impl TestServer {
    /// Sends the shutdown signal without waiting for the server to stop.
    pub fn trigger_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Signals shutdown and waits for `serve_with_shutdown` to return.
    pub async fn stop(mut self) -> Result<(), hawkwing::Error> {
        self.trigger_shutdown();
        self.handle.await.unwrap()
    }
}

pub async fn start(router: Router) -> TestServer {
    start_with_grace(router, Duration::from_secs(5)).await
}

/// Like [`start`], with a custom shutdown grace period.
pub async fn start_with_grace(router: Router, grace: Duration) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        Server::from_listener(listener)
            .with_shutdown_grace(grace)
            .serve_with_shutdown(router, async {
                let _ = rx.await;
            })
            .await
    });

    TestServer { addr, shutdown: Some(tx), handle }
}

pub struct RawResponse {
    pub status: u16,
    pub head: String,
    pub body: String,
}

impl RawResponse {
    #[allow(dead_code)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}

/// Sends one request with `Connection: close` and reads until the server
/// closes the stream.
pub async fn send(addr: SocketAddr, method: &str, path: &str, headers: &[(&str, &str)], body: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut request = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    for (name, value) in headers {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    RawResponse { status, head: head.to_owned(), body: body.to_owned() }
}

#[allow(dead_code)]
pub async fn get(addr: SocketAddr, path: &str) -> RawResponse {
    send(addr, "GET", path, &[], "").await
}
