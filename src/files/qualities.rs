//! Quality summary of extractor format metadata
//!
//! An `*info.json` document lists every format the extractor found. The
//! projection here keeps the playable ones, splits them into audio-only and
//! video entries keyed by `format_id`, and orders each group from lowest to
//! highest quality.

use crate::store::Mapping;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Format notes that never describe a playable stream
const SKIPPED_NOTES: [&str; 2] = ["unknown", "storyboard"];

/// A parsed metadata document
///
/// `formats` holds the typed entries that could be decoded; `raw` keeps the
/// whole document for field pass-through.
#[derive(Clone, Debug, Default)]
pub struct MediaInfo {
    /// Decoded entries of the `formats` array
    pub formats: Vec<FormatEntry>,
    /// Every top-level field, as found on disk
    pub raw: Mapping,
}

impl MediaInfo {
    /// Build from a parsed document; malformed format entries are skipped
    pub fn from_mapping(raw: Mapping) -> Self {
        let formats = match raw.get("formats") {
            Some(serde_json::Value::Array(entries)) => entries
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| {
                    serde_json::from_value::<FormatEntry>(entry.clone())
                        .map_err(|e| tracing::debug!(index, error = %e, "skipping format entry"))
                        .ok()
                })
                .collect(),
            _ => Vec::new(),
        };
        Self { formats, raw }
    }

    /// Quality summary of [`MediaInfo::formats`]
    pub fn qualities(&self) -> Qualities {
        extract_qualities(&self.formats)
    }
}

/// One entry of the extractor's `formats` array
///
/// Numbers are kept as floats because extractors report whole values as
/// `30.0` as often as `30`.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormatEntry {
    /// Extractor's identifier for the format
    pub format_id: Option<String>,
    /// Human-readable label such as "1080p" or "storyboard"
    pub format_note: Option<String>,
    /// Audio codec, "none" for video-only formats
    pub acodec: Option<String>,
    /// Video codec, "none" for audio-only formats
    pub vcodec: Option<String>,
    /// Average audio bitrate in kbit/s
    pub abr: Option<f64>,
    pub audio_channels: Option<f64>,
    pub language: Option<String>,
    pub height: Option<f64>,
    pub width: Option<f64>,
    pub fps: Option<f64>,
    pub dynamic_range: Option<String>,
    /// Exact size in bytes
    pub filesize: Option<f64>,
    /// Estimated size in bytes
    pub filesize_approx: Option<f64>,
}

impl FormatEntry {
    fn has_codec(codec: &Option<String>) -> bool {
        matches!(codec.as_deref(), Some(c) if c != "none")
    }

    fn is_audio_only(&self) -> bool {
        Self::has_codec(&self.acodec) && !Self::has_codec(&self.vcodec) && nonzero(self.abr)
    }

    fn is_video(&self) -> bool {
        Self::has_codec(&self.vcodec) && nonzero(self.height) && nonzero(self.fps)
    }

    fn size(&self) -> i64 {
        [self.filesize, self.filesize_approx]
            .into_iter()
            .flatten()
            .find(|v| *v != 0.0)
            .map(truncate)
            .unwrap_or(0)
    }
}

/// An audio-only format
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct AudioQuality {
    pub abr: i64,
    pub acodec: String,
    pub audio_channels: i64,
    pub language: Option<String>,
    pub filesize: i64,
}

/// A format carrying video
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct VideoQuality {
    pub height: i64,
    pub width: i64,
    pub fps: i64,
    pub vcodec: String,
    pub format_note: String,
    pub dynamic_range: String,
    pub filesize: i64,
}

/// Audio and video formats keyed by `format_id`, each ascending by quality
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct Qualities {
    /// Audio-only formats, ascending by bitrate
    pub audio: IndexMap<String, AudioQuality>,
    /// Video formats, ascending by height then frame rate
    pub video: IndexMap<String, VideoQuality>,
}

/// Summarize format entries
///
/// Video entries are ordered by `(height, fps)` and audio entries by `abr`.
/// Both sorts are stable, so equal entries keep their input order. A later
/// entry with an already-seen `format_id` replaces the earlier one.
pub fn extract_qualities(formats: &[FormatEntry]) -> Qualities {
    let mut qualities = Qualities::default();

    for format in formats {
        if format
            .format_note
            .as_deref()
            .is_some_and(|note| SKIPPED_NOTES.contains(&note))
        {
            continue;
        }
        let Some(format_id) = format.format_id.clone() else {
            continue;
        };

        if format.is_audio_only() {
            qualities.audio.insert(
                format_id,
                AudioQuality {
                    abr: truncate(format.abr.unwrap_or_default()),
                    acodec: format.acodec.clone().unwrap_or_default(),
                    audio_channels: format.audio_channels.map(truncate).unwrap_or(0),
                    language: format.language.clone(),
                    filesize: format.size(),
                },
            );
        } else if format.is_video() {
            qualities.video.insert(
                format_id,
                VideoQuality {
                    height: truncate(format.height.unwrap_or_default()),
                    width: format.width.map(truncate).unwrap_or(0),
                    fps: truncate(format.fps.unwrap_or_default()),
                    vcodec: format.vcodec.clone().unwrap_or_default(),
                    format_note: format
                        .format_note
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    dynamic_range: format
                        .dynamic_range
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    filesize: format.size(),
                },
            );
        }
    }

    qualities
        .video
        .sort_by(|_, a, _, b| (a.height, a.fps).cmp(&(b.height, b.fps)));
    qualities.audio.sort_by(|_, a, _, b| a.abr.cmp(&b.abr));
    qualities
}

fn nonzero(value: Option<f64>) -> bool {
    value.is_some_and(|v| v != 0.0 && !v.is_nan())
}

fn truncate(value: f64) -> i64 {
    value.trunc() as i64
}
