//! Directory watching for hot reload.
//!
//! A [`Watch`] owns both the OS watcher and the blocking task that reacts to
//! its events. Stopping (or dropping) the handle ends both, so watchers never
//! outlive the server that started them.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::Error;

/// A running directory watch.
pub struct Watch {
    dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl Watch {
    /// Watches `dir` (non-recursively) and calls `on_change` with the path of
    /// every event whose kind passes `filter`.
    ///
    /// `on_change` runs on tokio's blocking pool, so this must be called from
    /// within a runtime.
    pub(crate) fn spawn<F>(dir: &Path, filter: fn(&EventKind) -> bool, mut on_change: F) -> Result<Self, Error>
    where
        F: FnMut(&Path) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if filter(&event.kind) => {
                    for path in event.paths {
                        // The receiver only goes away while the watch is stopping.
                        let _ = tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => error!("watch error: {e}"),
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        // `on_change` may do blocking file I/O, so it gets a blocking thread
        // rather than a runtime worker. The loop ends once the watcher, and
        // with it the sender, is dropped.
        let task = tokio::task::spawn_blocking(move || {
            while let Some(path) = rx.blocking_recv() {
                on_change(&path);
            }
        });

        info!(dir = %dir.display(), "watching directory");
        Ok(Self { dir: dir.to_path_buf(), watcher: Some(watcher), task: Some(task) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stops watching and waits for the event task to finish the events it
    /// already received.
    pub async fn stop(mut self) {
        // Dropping the watcher drops the channel sender, which ends the task.
        drop(self.watcher.take());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(dir = %self.dir.display(), "watch task failed: {e}");
            }
        }
        info!(dir = %self.dir.display(), "stopped watching directory");
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        // Closing the channel lets the task finish on its own; a blocking task
        // cannot be aborted once running.
        drop(self.watcher.take());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn any_change(kind: &EventKind) -> bool {
        matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
    }

    #[tokio::test]
    async fn reports_changes_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let watch = Watch::spawn(dir.path(), any_change, move |path| {
            let _ = tx.send(path.to_path_buf());
        })
        .unwrap();

        std::fs::write(dir.path().join("page.html"), "hello").unwrap();

        let changed = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no change event within 10s")
            .unwrap();
        assert_eq!(changed.file_name().unwrap(), "page.html");

        watch.stop().await;
    }

    #[tokio::test]
    async fn callback_runs_off_the_runtime_thread() {
        let dir = tempfile::tempdir().unwrap();
        let runtime_thread = std::thread::current().id();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let watch = Watch::spawn(dir.path(), any_change, move |_| {
            let _ = tx.send(std::thread::current().id());
        })
        .unwrap();

        std::fs::write(dir.path().join("index.html"), "v2").unwrap();

        let callback_thread = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no change event within 10s")
            .unwrap();
        assert_ne!(callback_thread, runtime_thread);

        watch.stop().await;
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            Watch::spawn(&missing, any_change, |_| {}),
            Err(Error::Watch(_))
        ));
    }
}
