//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of media retrieval a task asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Download video (merged with audio)
    GetVideo,
    /// Download audio only
    GetAudio,
    /// Fetch metadata only
    GetInfo,
    /// Record a live video stream
    GetLiveVideo,
    /// Record a live audio stream
    GetLiveAudio,
}

impl TaskType {
    /// Every task type, in route order
    pub const ALL: [TaskType; 5] = [
        TaskType::GetVideo,
        TaskType::GetAudio,
        TaskType::GetInfo,
        TaskType::GetLiveVideo,
        TaskType::GetLiveAudio,
    ];

    /// Name used for the route and for the permission guarding it
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::GetVideo => "get_video",
            TaskType::GetAudio => "get_audio",
            TaskType::GetInfo => "get_info",
            TaskType::GetLiveVideo => "get_live_video",
            TaskType::GetLiveAudio => "get_live_audio",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known state of a task
///
/// Tasks are created `waiting`; the other transitions are written by an
/// external worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted, not yet picked up
    Waiting,
    /// Being worked on
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Error,
}

/// A point in a media stream: seconds, or a "[HH:]MM:SS[.fff]" string
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Timestamp {
    /// Offset in seconds
    Seconds(f64),
    /// Clock notation, e.g. "01:02:03.5"
    Clock(String),
}

impl Timestamp {
    /// Offset in seconds, or `None` if the clock notation does not parse
    pub fn to_seconds(&self) -> Option<f64> {
        match self {
            Timestamp::Seconds(s) => Some(*s),
            Timestamp::Clock(text) => crate::utils::parse_clock(text),
        }
    }
}

/// Request parameters shared by every task type
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskParams {
    /// Media page URL (required)
    #[serde(default)]
    pub url: Option<String>,
    /// Video format selector
    #[serde(default)]
    pub video_format: Option<String>,
    /// Audio format selector
    #[serde(default)]
    pub audio_format: Option<String>,
    /// Start of the requested range
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    /// End of the requested range
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    /// Cut at keyframes when a range is requested
    #[serde(default)]
    pub force_keyframes: Option<bool>,
    /// Live recording start offset in seconds
    #[serde(default)]
    pub start: Option<i64>,
    /// Live recording duration in seconds
    #[serde(default)]
    pub duration: Option<i64>,
    /// Container or codec of the result
    #[serde(default)]
    pub output_format: Option<String>,
}

/// A persisted record of requested work
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// 16-character alphanumeric identifier
    pub task_id: String,
    /// Name of the key that created the task
    pub key_name: String,
    /// Last known status
    pub status: TaskStatus,
    /// What to retrieve
    pub task_type: TaskType,
    /// Media page URL
    pub url: String,
    /// Video format selector
    pub video_format: String,
    /// Audio format selector
    pub audio_format: String,
    /// Start of the requested range
    pub start_time: Option<Timestamp>,
    /// End of the requested range
    pub end_time: Option<Timestamp>,
    /// Cut at keyframes when a range is requested
    pub force_keyframes: bool,
    /// Live recording start offset in seconds
    pub start: i64,
    /// Live recording duration in seconds
    pub duration: Option<i64>,
    /// Container or codec of the result
    pub output_format: Option<String>,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Fields written by other processes (results, error text, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Name-to-credential-and-permissions record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// The secret presented in the X-API-Key header
    pub key: String,
    /// Permission names granted to the key
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Fields owned by other tooling
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl KeyRecord {
    /// Whether every permission in `required` is granted
    pub fn grants_all<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|r| self.permissions.iter().any(|p| p == r.as_ref()))
    }
}

/// Identity of the authenticated caller, inserted as a request extension
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    /// Key name
    pub name: String,
    /// The credential that was presented
    pub api_key: String,
}

/// Permission names understood by the API
pub mod permissions {
    /// Create video download tasks, and run synchronous downloads
    pub const GET_VIDEO: &str = "get_video";
    /// Create audio download tasks
    pub const GET_AUDIO: &str = "get_audio";
    /// Create metadata tasks
    pub const GET_INFO: &str = "get_info";
    /// Create live video tasks
    pub const GET_LIVE_VIDEO: &str = "get_live_video";
    /// Create live audio tasks
    pub const GET_LIVE_AUDIO: &str = "get_live_audio";
    /// Create keys
    pub const CREATE_KEY: &str = "create_key";
    /// Delete keys
    pub const DELETE_KEY: &str = "delete_key";
    /// Read one key
    pub const GET_KEY: &str = "get_key";
    /// Read every key
    pub const GET_KEYS: &str = "get_keys";

    /// Every permission, granted to the bootstrap admin key
    pub const ALL: [&str; 9] = [
        GET_VIDEO,
        GET_AUDIO,
        GET_INFO,
        GET_LIVE_VIDEO,
        GET_LIVE_AUDIO,
        CREATE_KEY,
        DELETE_KEY,
        GET_KEY,
        GET_KEYS,
    ];
}
