//! Request-scoped working directories
//!
//! A [`WorkingDir`] owns `<download_dir>/<request_id>` for exactly as long as
//! something still needs the file inside it. The guard travels with the
//! response body; when the body is finished or dropped (client went away) the
//! directory is removed. An optional idle reaper removes it earlier if the
//! body stops being read for too long.

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Owner of a temporary download directory
#[derive(Debug)]
pub struct WorkingDir {
    path: PathBuf,
    token: CancellationToken,
    activity: Arc<Notify>,
    reaper_armed: bool,
    removed: bool,
}

impl WorkingDir {
    /// Create the directory (and missing parents)
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        tokio::fs::create_dir_all(&path).await?;
        tracing::debug!(path = %path.display(), "created working directory");
        Ok(Self {
            path,
            token: CancellationToken::new(),
            activity: Arc::new(Notify::new()),
            reaper_armed: false,
            removed: false,
        })
    }

    /// The directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a background task that removes the directory once the guard is
    /// dropped, or earlier if [`touch`](Self::touch) is not called for `idle`
    ///
    /// Must be called inside a tokio runtime. Calling it again is a no-op.
    pub fn arm_idle_reaper(&mut self, idle: Duration) {
        if self.reaper_armed {
            return;
        }
        self.reaper_armed = true;

        let path = self.path.clone();
        let token = self.token.clone();
        let activity = self.activity.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = activity.notified() => continue,
                    _ = tokio::time::sleep(idle) => {
                        tracing::warn!(
                            path = %path.display(),
                            idle_secs = idle.as_secs(),
                            "response idle too long, removing working directory"
                        );
                        break;
                    }
                }
            }
            remove_async(&path).await;
        });
    }

    /// Record that the response made progress; restarts the idle timer
    pub fn touch(&self) {
        self.activity.notify_one();
    }

    /// Remove the directory now
    pub async fn discard(mut self) {
        self.removed = true;
        self.token.cancel();
        if !self.reaper_armed {
            remove_async(&self.path).await;
        }
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        // An armed reaper observes the cancellation and removes the directory.
        self.token.cancel();
        if self.removed || self.reaper_armed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed working directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove working directory"
            ),
        }
    }
}

async fn remove_async(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed working directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove working directory"
        ),
    }
}
