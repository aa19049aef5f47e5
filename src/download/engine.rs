//! Media engine contract and format selection

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Range end used when only a start is requested (ten hours)
pub const DEFAULT_RANGE_END: f64 = 36_000.0;

/// What the synchronous download produces
///
/// Deserializes leniently: `video` in any case (or null) is video, any other
/// string is audio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video, merged with audio unless audio is disabled
    #[default]
    Video,
    /// Audio only
    Audio,
}

impl<'de> Deserialize<'de> for MediaKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => MediaKind::Video,
            Some(kind) if kind.eq_ignore_ascii_case("video") => MediaKind::Video,
            Some(_) => MediaKind::Audio,
        })
    }
}

impl MediaKind {
    /// Output file stem; the engine appends the extension
    pub fn file_stem(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Container or codec used when the request does not name one
    pub fn default_output_format(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }
}

/// Cut of the source to download, in seconds
#[derive(Clone, Debug, PartialEq)]
pub struct TimeRange {
    /// Offset of the first kept second
    pub start: f64,
    /// Offset after the last kept second
    pub end: f64,
    /// Re-encode around the cut points so they land on keyframes
    pub force_keyframes: bool,
}

/// Everything an engine needs to fetch one item into a working directory
#[derive(Clone, Debug, PartialEq)]
pub struct EngineRequest {
    /// Media page URL
    pub url: String,
    /// Video or audio
    pub kind: MediaKind,
    /// Format selector with fallback, e.g. `bestvideo+bestaudio/best`
    pub format: String,
    /// Output path template, `%(ext)s` is replaced by the engine
    pub output_template: PathBuf,
    /// Merge container (video) or extracted audio codec (audio)
    pub output_format: String,
    /// Optional cut of the source
    pub range: Option<TimeRange>,
}

/// Format selector for a download
///
/// Video merges with `audio` when one is given and falls back to the best
/// single file; without audio it falls back to the best video-only stream.
/// Audio falls back to the best audio-only stream.
///
/// # Examples
///
/// ```
/// use media_dl::download::{MediaKind, format_selector};
///
/// assert_eq!(
///     format_selector(MediaKind::Video, "bestvideo", Some("bestaudio")),
///     "bestvideo+bestaudio/best"
/// );
/// assert_eq!(format_selector(MediaKind::Video, "137", None), "137/bestvideo");
/// assert_eq!(format_selector(MediaKind::Audio, "", Some("140")), "140/bestaudio");
/// ```
pub fn format_selector(kind: MediaKind, video: &str, audio: Option<&str>) -> String {
    match (kind, audio) {
        (MediaKind::Video, Some(audio)) => format!("{video}+{audio}/best"),
        (MediaKind::Video, None) => format!("{video}/bestvideo"),
        (MediaKind::Audio, audio) => format!("{}/bestaudio", audio.unwrap_or("bestaudio")),
    }
}

/// External media extraction and download engine
///
/// Implementations fetch into the directory named by
/// [`EngineRequest::output_template`] and report failures as
/// [`DownloadError::EngineFailure`](crate::error::DownloadError::EngineFailure).
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Expected size in bytes of the selected formats; `0` when unknown
    async fn estimate_size(
        &self,
        url: &str,
        video_format: Option<&str>,
        audio_format: Option<&str>,
    ) -> crate::Result<u64>;

    /// Fetch the media described by `request`
    async fn download(&self, request: &EngineRequest) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
