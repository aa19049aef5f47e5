//! yt-dlp command-line engine

use super::engine::{EngineRequest, MediaEngine, MediaKind};
use crate::config::EngineConfig;
use crate::error::{DownloadError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

const BINARY_NAME: &str = "yt-dlp";

/// Arguments passed on every invocation
const BASE_ARGS: [&str; 4] = [
    "--extractor-args",
    "youtube:player_client=default,-tv_simply",
    "--quiet",
    "--no-warnings",
];

/// [`MediaEngine`] backed by the external `yt-dlp` binary
///
/// The child process is killed if the calling future is dropped, so an
/// abandoned request does not leave a download running.
///
/// # Examples
///
/// ```no_run
/// use media_dl::download::{MediaEngine, YtDlpEngine};
///
/// # async fn example() -> media_dl::Result<()> {
/// let engine = YtDlpEngine::from_path().expect("yt-dlp not found in PATH");
/// let bytes = engine
///     .estimate_size("https://example.com/watch?v=1", Some("bestvideo"), Some("bestaudio"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct YtDlpEngine {
    binary_path: PathBuf,
    extra_args: Vec<String>,
}

impl YtDlpEngine {
    /// Engine using an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            extra_args: Vec::new(),
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which(BINARY_NAME).ok().map(Self::new)
    }

    /// Engine from configuration
    ///
    /// An explicit `ytdlp_path` wins; otherwise PATH is searched if allowed.
    /// When nothing is found the bare binary name is used, so a later install
    /// is picked up, and a warning is logged.
    pub fn from_config(config: &EngineConfig) -> Self {
        let binary_path = match &config.ytdlp_path {
            Some(path) => path.clone(),
            None => {
                let found = config
                    .search_path
                    .then(|| which::which(BINARY_NAME).ok())
                    .flatten();
                found.unwrap_or_else(|| {
                    tracing::warn!(
                        "yt-dlp not found, synchronous downloads fail until it is installed"
                    );
                    PathBuf::from(BINARY_NAME)
                })
            }
        };

        Self {
            binary_path,
            extra_args: config.extra_args.clone(),
        }
    }

    /// Path of the binary that will be executed
    pub fn binary_path(&self) -> &std::path::Path {
        &self.binary_path
    }

    fn common_args(&self) -> Vec<OsString> {
        BASE_ARGS
            .iter()
            .map(OsString::from)
            .chain(self.extra_args.iter().map(OsString::from))
            .collect()
    }

    fn estimate_args(&self, url: &str, selector: &str) -> Vec<OsString> {
        let mut args = self.common_args();
        args.extend(
            ["--dump-json", "--no-playlist", "--skip-download", "-f", selector, "--", url]
                .map(OsString::from),
        );
        args
    }

    fn download_args(&self, request: &EngineRequest) -> Vec<OsString> {
        let mut args = self.common_args();
        args.push("--no-playlist".into());
        args.push("-f".into());
        args.push(request.format.clone().into());
        args.push("-o".into());
        args.push(request.output_template.clone().into());

        match request.kind {
            MediaKind::Video => {
                args.push("--merge-output-format".into());
                args.push(request.output_format.clone().into());
            }
            MediaKind::Audio => {
                args.push("--extract-audio".into());
                args.push("--audio-format".into());
                args.push(request.output_format.clone().into());
            }
        }

        if let Some(range) = &request.range {
            args.push("--download-sections".into());
            args.push(format!("*{}-{}", range.start, range.end).into());
            if range.force_keyframes {
                args.push("--force-keyframes-at-cuts".into());
            }
        }

        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }

    async fn run(&self, args: Vec<OsString>) -> Result<Vec<u8>> {
        let output = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                tracing::error!(
                    binary = %self.binary_path.display(),
                    error = %e,
                    "failed to start yt-dlp"
                );
                DownloadError::EngineFailure("Failed to execute yt-dlp".into())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| line.trim().to_string())
                .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status));
            return Err(DownloadError::EngineFailure(message).into());
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    async fn estimate_size(
        &self,
        url: &str,
        video_format: Option<&str>,
        audio_format: Option<&str>,
    ) -> Result<u64> {
        let selector = match (video_format, audio_format) {
            (Some(video), Some(audio)) => format!("{video}+{audio}"),
            (Some(video), None) => video.to_string(),
            (None, audio) => audio.unwrap_or("bestaudio").to_string(),
        };

        let stdout = self.run(self.estimate_args(url, &selector)).await?;
        let info: serde_json::Value = serde_json::from_slice(&stdout)
            .map_err(|e| DownloadError::EngineFailure(format!("unreadable yt-dlp output: {e}")))?;
        Ok(estimate_from_info(&info))
    }

    async fn download(&self, request: &EngineRequest) -> Result<()> {
        tracing::debug!(
            url = %request.url,
            format = %request.format,
            "running yt-dlp"
        );
        self.run(self.download_args(request)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Bytes expected for the formats selected in a `--dump-json` document
///
/// Merged selections list their parts in `requested_formats`; single formats
/// carry the size at the top level. Exact sizes are preferred over
/// approximations; anything unknown counts as zero.
fn estimate_from_info(info: &serde_json::Value) -> u64 {
    fn size_of(value: &serde_json::Value) -> u64 {
        ["filesize", "filesize_approx"]
            .iter()
            .filter_map(|field| value.get(field).and_then(serde_json::Value::as_f64))
            .find(|size| *size > 0.0)
            .map(|size| size as u64)
            .unwrap_or(0)
    }

    match info.get("requested_formats").and_then(|f| f.as_array()) {
        Some(parts) if !parts.is_empty() => parts.iter().map(size_of).sum(),
        _ => size_of(info),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::engine::TimeRange;
    use serde_json::json;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn request(kind: MediaKind, range: Option<TimeRange>) -> EngineRequest {
        EngineRequest {
            url: "https://example.com/watch?v=1".into(),
            kind,
            format: "bestvideo+bestaudio/best".into(),
            output_template: PathBuf::from("/tmp/req/video.%(ext)s"),
            output_format: kind.default_output_format().into(),
            range,
        }
    }

    #[test]
    fn video_download_merges_into_container() {
        let engine = YtDlpEngine::new(PathBuf::from("yt-dlp"));
        let args = strings(&engine.download_args(&request(MediaKind::Video, None)));

        assert_eq!(&args[..4], BASE_ARGS);
        let joined = args.join(" ");
        assert!(joined.contains("-f bestvideo+bestaudio/best"));
        assert!(joined.contains("-o /tmp/req/video.%(ext)s"));
        assert!(joined.contains("--merge-output-format mp4"));
        assert!(!joined.contains("--extract-audio"));
        assert!(!joined.contains("--download-sections"));
        assert_eq!(args[args.len() - 2..], ["--", "https://example.com/watch?v=1"]);
    }

    #[test]
    fn audio_download_extracts_codec() {
        let engine = YtDlpEngine::new(PathBuf::from("yt-dlp"));
        let args = strings(&engine.download_args(&request(MediaKind::Audio, None))).join(" ");

        assert!(args.contains("--extract-audio --audio-format mp3"));
        assert!(!args.contains("--merge-output-format"));
    }

    #[test]
    fn time_range_becomes_download_section() {
        let engine = YtDlpEngine::new(PathBuf::from("yt-dlp"));
        let range = TimeRange {
            start: 30.0,
            end: 36_000.0,
            force_keyframes: true,
        };
        let args = strings(&engine.download_args(&request(MediaKind::Video, Some(range)))).join(" ");

        assert!(args.contains("--download-sections *30-36000"));
        assert!(args.contains("--force-keyframes-at-cuts"));
    }

    #[test]
    fn extra_args_follow_base_args() {
        let engine = YtDlpEngine::from_config(&EngineConfig {
            ytdlp_path: Some(PathBuf::from("/opt/yt-dlp")),
            search_path: false,
            extra_args: vec!["--proxy".into(), "socks5://127.0.0.1:9050".into()],
        });

        assert_eq!(engine.binary_path(), std::path::Path::new("/opt/yt-dlp"));
        let args = strings(&engine.estimate_args("u", "18"));
        assert_eq!(args[4..6], ["--proxy", "socks5://127.0.0.1:9050"]);
        assert!(args.join(" ").ends_with("--dump-json --no-playlist --skip-download -f 18 -- u"));
    }

    #[test]
    fn estimate_sums_requested_formats() {
        let info = json!({
            "filesize": 1,
            "requested_formats": [
                {"format_id": "137", "filesize": 1000},
                {"format_id": "140", "filesize": null, "filesize_approx": 250.9}
            ]
        });
        assert_eq!(estimate_from_info(&info), 1250);
    }

    #[test]
    fn estimate_falls_back_to_top_level_and_zero() {
        assert_eq!(estimate_from_info(&json!({"filesize_approx": 42})), 42);
        assert_eq!(estimate_from_info(&json!({"filesize": 0, "filesize_approx": 7})), 7);
        assert_eq!(estimate_from_info(&json!({"title": "live"})), 0);
    }

    #[tokio::test]
    async fn missing_binary_is_engine_failure() {
        let engine = YtDlpEngine::new(PathBuf::from("/nonexistent/yt-dlp-binary"));
        let err = engine
            .estimate_size("https://example.com", Some("best"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Download(DownloadError::EngineFailure(_))
        ));
        assert_eq!(err.to_string(), "Failed to execute yt-dlp");
    }

    #[cfg(feature = "live-tests")]
    #[tokio::test]
    async fn live_estimate_reports_a_size() {
        let engine = YtDlpEngine::from_path().expect("yt-dlp must be installed for live tests");
        let size = engine
            .estimate_size(
                "https://www.youtube.com/watch?v=jNQXAC9IVRw",
                Some("bestvideo[height<=360]"),
                Some("bestaudio"),
            )
            .await
            .unwrap();
        assert!(size > 0);
    }
}
