//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Locations of the persisted documents and the served download root
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Tasks document (default: "./data/tasks.json")
    #[serde(default = "default_tasks_file")]
    pub tasks_file: PathBuf,

    /// API keys document (default: "./data/keys.json")
    #[serde(default = "default_keys_file")]
    pub keys_file: PathBuf,

    /// Root directory served under /files and used for download working directories
    /// (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tasks_file: default_tasks_file(),
            keys_file: default_keys_file(),
            download_dir: default_download_dir(),
        }
    }
}

/// Synchronous download behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Video selector used when a request does not name one
    /// (default: "bestvideo[height<=1080]")
    #[serde(default = "default_video_format")]
    pub default_video_format: String,

    /// Audio selector used when a request does not name one (default: "bestaudio")
    #[serde(default = "default_audio_format")]
    pub default_audio_format: String,

    /// Remove a served working directory if its response stream has been idle
    /// this long (default: 3600 seconds). The timer restarts on every chunk read.
    #[serde(default = "default_cleanup_idle_timeout", with = "duration_serde")]
    pub cleanup_idle_timeout: Duration,

    /// Refuse downloads whose size cannot be estimated instead of skipping the
    /// quota check (default: false)
    #[serde(default)]
    pub require_estimate: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_video_format: default_video_format(),
            default_audio_format: default_audio_format(),
            cleanup_idle_timeout: default_cleanup_idle_timeout(),
            require_estimate: false,
        }
    }
}

/// External media engine (yt-dlp) settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Extra arguments appended to every yt-dlp invocation
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            search_path: true,
            extra_args: Vec::new(),
        }
    }
}

/// Credential bootstrap
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Key installed as "admin" with every permission at startup
    #[serde(default)]
    pub admin_key: Option<String>,
}

/// Quota gate selection
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Byte budget per key for synchronous downloads (None = unlimited)
    #[serde(default)]
    pub max_bytes_per_key: Option<u64>,
}

/// API and external server integration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerIntegrationConfig {
    /// REST API server configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for the media service
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Document and download directory locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Synchronous download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Media engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Credential bootstrap
    #[serde(default)]
    pub auth: AuthConfig,

    /// Quota gate selection
    #[serde(default)]
    pub quota: QuotaConfig,

    /// API server settings
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|e| Error::Config {
            message: format!("invalid configuration in {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        if self.download.default_video_format.trim().is_empty() {
            return Err(Error::Config {
                message: "default video format must not be empty".into(),
                key: Some("download.default_video_format".into()),
            });
        }
        if self.download.default_audio_format.trim().is_empty() {
            return Err(Error::Config {
                message: "default audio format must not be empty".into(),
                key: Some("download.default_audio_format".into()),
            });
        }
        if self.storage.tasks_file == self.storage.keys_file {
            return Err(Error::Config {
                message: "tasks and keys must be stored in different files".into(),
                key: Some("storage.keys_file".into()),
            });
        }
        if let Some(key) = &self.auth.admin_key
            && key.is_empty()
        {
            return Err(Error::Config {
                message: "admin key must not be empty".into(),
                key: Some("auth.admin_key".into()),
            });
        }
        Ok(())
    }

    /// Download root directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.storage.download_dir
    }
}

fn default_tasks_file() -> PathBuf {
    PathBuf::from("./data/tasks.json")
}

fn default_keys_file() -> PathBuf {
    PathBuf::from("./data/keys.json")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_video_format() -> String {
    "bestvideo[height<=1080]".to_string()
}

fn default_audio_format() -> String {
    "bestaudio".to_string()
}

fn default_cleanup_idle_timeout() -> Duration {
    Duration::from_secs(3600)
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
