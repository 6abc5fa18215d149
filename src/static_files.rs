//! Static file serving.
//!
//! [`serve`] builds the handler behind [`Router::load_static`](crate::Router::load_static).
//! The request path has the route prefix stripped and is resolved below the
//! served directory; paths that try to climb out of it are refused.
//! [`watch`] optionally logs changes to the directory.

use std::path::{Component, Path, PathBuf};

use http::StatusCode;
use notify::EventKind;
use tracing::{error, info};

use crate::error::Error;
use crate::handler::Handler;
use crate::pattern::normalize;
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::watch::Watch;

/// Returns a handler serving the files under `dir` for requests below
/// `prefix`. A directory request serves its `index.html`.
pub fn serve<D: Into<PathBuf>>(prefix: &str, dir: D) -> impl Handler + use<D> {
    let prefix = normalize(prefix).to_owned();
    let root = dir.into();

    move |req: Request| {
        let file = resolve(&root, &prefix, req.path());
        async move {
            match file {
                Some(path) => read(path).await,
                None => Response::not_found(),
            }
        }
    }
}

/// Maps a request path to a file below `root`, or `None` when the remainder
/// contains `..` or other non-normal components.
fn resolve(root: &Path, prefix: &str, request_path: &str) -> Option<PathBuf> {
    let rest = request_path.strip_prefix(prefix.trim_end_matches('/'))?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let decoded = urlencoding::decode(rest).ok()?;
    let mut path = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

async fn read(mut path: PathBuf) -> Response {
    if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
        path.push("index.html");
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = path.extension()
                .and_then(|ext| ext.to_str())
                .map_or(ContentType::OctetStream, ContentType::from_extension);
            Response::builder().bytes(content_type, bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Response::not_found(),
        Err(e) => {
            error!(path = %path.display(), "static file read failed: {e}");
            Response::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Logs every create, modify and remove event under `dir` until the returned
/// handle is stopped or dropped.
pub fn watch(dir: impl AsRef<Path>) -> Result<Watch, Error> {
    Watch::spawn(
        dir.as_ref(),
        |kind| matches!(kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)),
        |path| info!(path = %path.display(), "static file change detected"),
    )
}
