//! Persistent document store
//!
//! Tasks and API keys live in two JSON documents, each a flat object keyed by
//! identifier or name. Every write replaces the whole file. Access is
//! serialized between processes with advisory locks (see [`lock`]):
//!
//! - [`DocumentStore::load`] reads under a shared lock
//! - [`DocumentStore::save`] rewrites under an exclusive lock
//! - [`DocumentStore::update`] holds one exclusive lock across
//!   read → mutate → write, so concurrent writers cannot lose each other's
//!   changes
//!
//! `load` followed by `save` is two separate critical sections; use `update`
//! for any read-modify-write.

use crate::config::StorageConfig;
use crate::error::{Result, StoreError};
use std::path::{Path, PathBuf};

mod file;
pub(crate) mod lock;

/// In-memory form of a document
pub type Mapping = serde_json::Map<String, serde_json::Value>;

/// The named documents managed by the store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Document {
    /// Task records keyed by task id
    Tasks,
    /// Key records keyed by key name
    Keys,
}

impl Document {
    /// Name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Document::Tasks => "tasks",
            Document::Keys => "keys",
        }
    }
}

/// File-backed store for the `tasks` and `keys` documents
#[derive(Clone, Debug)]
pub struct DocumentStore {
    tasks_path: PathBuf,
    keys_path: PathBuf,
}

impl DocumentStore {
    /// Create a store over two document paths (files need not exist yet)
    pub fn new(tasks_path: impl Into<PathBuf>, keys_path: impl Into<PathBuf>) -> Self {
        Self {
            tasks_path: tasks_path.into(),
            keys_path: keys_path.into(),
        }
    }

    /// Create a store from the storage section of the configuration
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.tasks_file.clone(), config.keys_file.clone())
    }

    /// Path of a document on disk
    pub fn path(&self, document: Document) -> &Path {
        match document {
            Document::Tasks => &self.tasks_path,
            Document::Keys => &self.keys_path,
        }
    }

    /// Load a whole document; a document that was never saved is empty
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] when the file holds anything other
    /// than a JSON object.
    pub async fn load(&self, document: Document) -> Result<Mapping> {
        let path = self.path(document).to_path_buf();
        let data = run_blocking(move || file::read(document, &path)).await?;
        tracing::debug!(
            document = document.name(),
            entries = data.len(),
            "loaded document"
        );
        Ok(data)
    }

    /// Replace a whole document
    pub async fn save(&self, document: Document, data: Mapping) -> Result<()> {
        let path = self.path(document).to_path_buf();
        let entries = data.len();
        run_blocking(move || file::write(document, &path, &data)).await?;
        tracing::debug!(document = document.name(), entries, "saved document");
        Ok(())
    }

    /// Run `mutate` against the current document and persist the result,
    /// all under one exclusive lock
    ///
    /// If `mutate` returns an error the document is left untouched.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use media_dl::store::{Document, DocumentStore};
    ///
    /// # async fn example() -> media_dl::Result<()> {
    /// let store = DocumentStore::new("data/tasks.json", "data/keys.json");
    /// let count = store
    ///     .update(Document::Tasks, |tasks| {
    ///         tasks.insert("abc".into(), serde_json::json!({"status": "waiting"}));
    ///         Ok(tasks.len())
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update<F, R>(&self, document: Document, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut Mapping) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let path = self.path(document).to_path_buf();
        let result = run_blocking(move || file::update(document, &path, mutate)).await?;
        tracing::debug!(document = document.name(), "updated document");
        Ok(result)
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
