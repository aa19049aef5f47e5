//! Task registry
//!
//! Records requested work in the `tasks` document. Creating a task only
//! records intent; execution belongs to an external worker that writes status
//! changes back into the same document.

use crate::error::{Error, Result, StoreError};
use crate::store::{Document, DocumentStore, Mapping};
use crate::types::{Caller, Task, TaskParams, TaskStatus, TaskType};
use crate::utils::generate_id;
use chrono::Utc;

/// Video selector recorded when a task does not name one
pub const DEFAULT_VIDEO_FORMAT: &str = "bestvideo";

/// Audio selector recorded when a task does not name one
pub const DEFAULT_AUDIO_FORMAT: &str = "bestaudio";

// Collisions over 62^16 ids are practically impossible; this bound only
// protects against a broken id source.
const MAX_ID_ATTEMPTS: usize = 8;

/// Creates and reads [`Task`] records
#[derive(Clone, Debug)]
pub struct TaskRegistry {
    store: DocumentStore,
}

impl TaskRegistry {
    /// Create a registry over `store`
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Record a new `waiting` task and return its identifier
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] with "URL is required" when `params.url` is
    /// missing or empty. Nothing is persisted in that case.
    pub async fn create(
        &self,
        task_type: TaskType,
        params: TaskParams,
        caller: &Caller,
    ) -> Result<String> {
        self.create_with_ids(task_type, params, caller, generate_id)
            .await
    }

    async fn create_with_ids<G>(
        &self,
        task_type: TaskType,
        params: TaskParams,
        caller: &Caller,
        mut next_id: G,
    ) -> Result<String>
    where
        G: FnMut() -> String + Send + 'static,
    {
        let url = match params.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(Error::Validation("URL is required".into())),
        };

        let mut task = Task {
            task_id: String::new(),
            key_name: caller.name.clone(),
            status: TaskStatus::Waiting,
            task_type,
            url,
            video_format: params
                .video_format
                .unwrap_or_else(|| DEFAULT_VIDEO_FORMAT.to_string()),
            audio_format: params
                .audio_format
                .unwrap_or_else(|| DEFAULT_AUDIO_FORMAT.to_string()),
            start_time: params.start_time,
            end_time: params.end_time,
            force_keyframes: params.force_keyframes.unwrap_or(false),
            start: params.start.unwrap_or(0),
            duration: params.duration,
            output_format: params.output_format,
            created_at: Utc::now(),
            extra: Default::default(),
        };

        let task_id = self
            .store
            .update(Document::Tasks, move |tasks| {
                task.task_id = unused_id(tasks, &mut next_id)?;
                let id = task.task_id.clone();
                tasks.insert(id.clone(), serde_json::to_value(&task)?);
                Ok(id)
            })
            .await?;

        tracing::info!(
            task_id = %task_id,
            key_name = %caller.name,
            task_type = %task_type,
            "task created"
        );
        Ok(task_id)
    }

    /// Fetch a snapshot of one task
    pub async fn get(&self, task_id: &str) -> Result<Task> {
        let mut tasks = self.store.load(Document::Tasks).await?;
        let value = tasks
            .remove(task_id)
            .ok_or_else(|| Error::NotFound(format!("Task {task_id}")))?;
        decode(task_id, value)
    }

    /// Every task, oldest first
    pub async fn list(&self) -> Result<Vec<Task>> {
        let tasks = self.store.load(Document::Tasks).await?;
        let mut decoded = tasks
            .into_iter()
            .map(|(id, value)| decode(&id, value))
            .collect::<Result<Vec<_>>>()?;
        decoded.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(decoded)
    }
}

fn unused_id<G: FnMut() -> String>(tasks: &Mapping, next_id: &mut G) -> Result<String> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = next_id();
        if !tasks.contains_key(&id) {
            return Ok(id);
        }
        tracing::debug!(task_id = %id, "task id collision, regenerating");
    }
    Err(Error::Other(format!(
        "could not allocate a unique task id after {MAX_ID_ATTEMPTS} attempts"
    )))
}

fn decode(task_id: &str, value: serde_json::Value) -> Result<Task> {
    serde_json::from_value(value).map_err(|e| {
        StoreError::Corrupted {
            document: Document::Tasks.name().to_string(),
            reason: format!("task {task_id}: {e}"),
        }
        .into()
    })
}
