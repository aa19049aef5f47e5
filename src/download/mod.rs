//! Quota-gated synchronous downloads
//!
//! [`DownloadOrchestrator::run`] walks one request through
//! estimate → admit → prepare → execute → collect and hands back a
//! [`PreparedDownload`] whose body stream owns the working directory. Any
//! failure before that point removes the directory immediately.

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, Result};
use crate::types::{Caller, Timestamp};
use crate::utils::generate_id;
use axum::body::Bytes;
use futures::Stream;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

pub mod engine;
pub mod quota;
pub mod workdir;
pub mod ytdlp;

pub use engine::{EngineRequest, MediaEngine, MediaKind, TimeRange, format_selector};
pub use quota::{ByteBudgetQuota, QuotaGate, UnlimitedQuota};
pub use workdir::WorkingDir;
pub use ytdlp::YtDlpEngine;

/// Body of `POST /download`
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Media page URL (required)
    #[serde(default)]
    pub url: Option<String>,

    /// `video` (default); any other value means audio
    #[serde(default, rename = "type")]
    pub kind: MediaKind,

    /// Video selector (default `bestvideo[height<=1080]`)
    #[serde(default)]
    pub video_format: Option<String>,

    /// Audio selector (default `bestaudio`). For video, an explicit `null`,
    /// `"none"` or `"null"` downloads video only.
    #[serde(default, deserialize_with = "present_or_null")]
    #[schema(value_type = Option<String>, nullable)]
    pub audio_format: Option<Option<String>>,

    /// Start of the cut (default 0 when only `end_time` is given)
    #[serde(default)]
    pub start_time: Option<Timestamp>,

    /// End of the cut (default 36000 seconds when only `start_time` is given)
    #[serde(default)]
    pub end_time: Option<Timestamp>,

    /// Align cuts to keyframes
    #[serde(default)]
    pub force_keyframes: Option<bool>,

    /// Merge container (video, default `mp4`) or audio codec (audio, default `mp3`)
    #[serde(default)]
    pub output_format: Option<String>,
}

// Distinguishes an explicit `null` (Some(None)) from an absent field (None).
fn present_or_null<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// A finished download waiting to be streamed
#[derive(Debug)]
pub struct PreparedDownload {
    /// Identifier of this request, also the working directory name
    pub request_id: String,
    /// The produced file
    pub file_path: PathBuf,
    /// Its file name, used for `Content-Disposition`
    pub file_name: String,
    /// Its size in bytes
    pub size: u64,
    /// Owner of the directory holding the file
    pub workdir: WorkingDir,
}

impl PreparedDownload {
    /// Open the file as a byte stream that keeps the working directory alive
    ///
    /// Each chunk read counts as activity for the idle reaper. Dropping the
    /// stream removes the directory.
    pub async fn into_stream(self) -> Result<GuardedStream> {
        let file = match tokio::fs::File::open(&self.file_path).await {
            Ok(file) => file,
            Err(e) => {
                self.workdir.discard().await;
                return Err(e.into());
            }
        };
        Ok(GuardedStream {
            inner: ReaderStream::new(file),
            workdir: self.workdir,
        })
    }
}

/// File contents stream owning a [`WorkingDir`]
#[derive(Debug)]
pub struct GuardedStream {
    inner: ReaderStream<tokio::fs::File>,
    workdir: WorkingDir,
}

impl Stream for GuardedStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(_))) = &item {
            this.workdir.touch();
        }
        item
    }
}

/// Runs synchronous downloads against a media engine and a quota gate
pub struct DownloadOrchestrator {
    engine: Arc<dyn MediaEngine>,
    quota: Arc<dyn QuotaGate>,
    download_dir: PathBuf,
    config: DownloadConfig,
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("engine", &self.engine.name())
            .field("quota", &self.quota.name())
            .field("download_dir", &self.download_dir)
            .finish()
    }
}

/// Selectors and output settings derived from one request
#[derive(Debug)]
struct Plan {
    url: String,
    kind: MediaKind,
    video_format: String,
    audio_format: Option<String>,
    output_format: String,
    range: Option<TimeRange>,
}

impl DownloadOrchestrator {
    /// Create an orchestrator writing below `download_dir`
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        quota: Arc<dyn QuotaGate>,
        download_dir: impl Into<PathBuf>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            engine,
            quota,
            download_dir: download_dir.into(),
            config,
        }
    }

    /// Fetch one item for `caller`
    ///
    /// On success the caller must stream or drop the returned
    /// [`PreparedDownload`]; either way its directory is removed afterwards.
    ///
    /// # Errors
    ///
    /// All failures are [`Error::Download`]: `Validation` for a bad request,
    /// `QuotaExceeded` when the gate refuses the estimate, `EngineFailure`
    /// and `NoOutputProduced` from execution.
    pub async fn run(&self, request: DownloadRequest, caller: &Caller) -> Result<PreparedDownload> {
        let plan = self.plan(request)?;
        let request_id = generate_id();

        let estimate = self
            .engine
            .estimate_size(
                &plan.url,
                (plan.kind == MediaKind::Video).then_some(plan.video_format.as_str()),
                plan.audio_format.as_deref(),
            )
            .await
            .map_err(as_engine_failure)?;

        if estimate > 0 {
            self.quota.admit(caller, estimate, &request_id).await?;
        } else if self.config.require_estimate {
            return Err(DownloadError::EngineFailure(
                "Download size could not be estimated".into(),
            )
            .into());
        } else {
            tracing::warn!(
                request_id = %request_id,
                key_name = %caller.name,
                url = %plan.url,
                "size unknown, skipping quota check"
            );
        }

        let mut workdir = WorkingDir::create(self.download_dir.join(&request_id)).await?;

        match self.execute(&plan, workdir.path()).await {
            Ok((file_path, file_name, size)) => {
                workdir.arm_idle_reaper(self.config.cleanup_idle_timeout);
                tracing::info!(
                    request_id = %request_id,
                    key_name = %caller.name,
                    file = %file_name,
                    size,
                    "download complete"
                );
                Ok(PreparedDownload {
                    request_id,
                    file_path,
                    file_name,
                    size,
                    workdir,
                })
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "download failed");
                workdir.discard().await;
                Err(e)
            }
        }
    }

    fn plan(&self, request: DownloadRequest) -> Result<Plan> {
        let url = match request.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(DownloadError::Validation("URL is required".into()).into()),
        };
        let kind = request.kind;

        let video_format = request
            .video_format
            .unwrap_or_else(|| self.config.default_video_format.clone());

        let audio_format = match request.audio_format {
            None => Some(self.config.default_audio_format.clone()),
            Some(None) => None,
            Some(Some(audio)) if is_disabled(&audio) => None,
            Some(Some(audio)) => Some(audio),
        };
        // Audio downloads always need an audio selector.
        let audio_format = match kind {
            MediaKind::Audio => {
                audio_format.or_else(|| Some(self.config.default_audio_format.clone()))
            }
            MediaKind::Video => audio_format,
        };

        let output_format = request
            .output_format
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| kind.default_output_format().to_string());

        let start = seconds(request.start_time.as_ref(), "start_time")?;
        let end = seconds(request.end_time.as_ref(), "end_time")?;
        // Zero bounds do not restrict anything
        let range = if start.unwrap_or(0.0) > 0.0 || end.unwrap_or(0.0) > 0.0 {
            Some(TimeRange {
                start: start.unwrap_or(0.0),
                end: end.unwrap_or(engine::DEFAULT_RANGE_END),
                force_keyframes: request.force_keyframes.unwrap_or(false),
            })
        } else {
            None
        };
        if let Some(range) = &range
            && range.end <= range.start
        {
            return Err(DownloadError::Validation("end_time must be after start_time".into()).into());
        }

        Ok(Plan {
            url,
            kind,
            video_format,
            audio_format,
            output_format,
            range,
        })
    }

    async fn execute(&self, plan: &Plan, dir: &Path) -> Result<(PathBuf, String, u64)> {
        let engine_request = EngineRequest {
            url: plan.url.clone(),
            kind: plan.kind,
            format: format_selector(plan.kind, &plan.video_format, plan.audio_format.as_deref()),
            output_template: dir.join(format!("{}.%(ext)s", plan.kind.file_stem())),
            output_format: plan.output_format.clone(),
            range: plan.range.clone(),
        };

        self.engine
            .download(&engine_request)
            .await
            .map_err(as_engine_failure)?;

        collect_output(dir).await
    }
}

/// The single file the engine left in `dir`
async fn collect_output(dir: &Path) -> Result<(PathBuf, String, u64)> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if metadata.is_file() {
            files.push((entry.file_name().to_string_lossy().into_owned(), metadata.len()));
        }
    }
    files.sort();

    if files.len() > 1 {
        tracing::warn!(
            dir = %dir.display(),
            count = files.len(),
            "engine produced several files, serving the first"
        );
    }
    let (name, size) = files
        .into_iter()
        .next()
        .ok_or(DownloadError::NoOutputProduced)?;
    Ok((dir.join(&name), name, size))
}

fn is_disabled(audio: &str) -> bool {
    audio.eq_ignore_ascii_case("none") || audio.eq_ignore_ascii_case("null")
}

fn seconds(timestamp: Option<&Timestamp>, field: &str) -> Result<Option<f64>> {
    match timestamp {
        None => Ok(None),
        Some(ts) => match ts.to_seconds() {
            Some(s) if s.is_finite() && s >= 0.0 => Ok(Some(s)),
            _ => Err(DownloadError::Validation(format!("Invalid {field}")).into()),
        },
    }
}

// Engine errors that are not already tagged become `EngineFailure`.
fn as_engine_failure(error: Error) -> Error {
    match error {
        Error::Download(_) => error,
        other => DownloadError::EngineFailure(other.to_string()).into(),
    }
}
