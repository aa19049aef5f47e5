//! Secure access to the download directory
//!
//! Every request path is checked twice before anything is read: first
//! lexically, so `..` tricks are refused without probing the filesystem, then
//! after canonicalization, so a symlink cannot lead outside the root either.

use crate::error::{Error, Result};
use crate::store::Mapping;
use axum::body::Body;
use axum::http::{HeaderValue, Request, header};
use axum::response::Response;
use std::path::{Component, Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;

pub mod qualities;

pub use qualities::{MediaInfo, Qualities};

/// Suffix identifying extractor metadata documents
pub const METADATA_SUFFIX: &str = "info.json";

/// Query parameter that adds the quality summary to a metadata response
pub const QUALITIES_PARAM: &str = "qualities";

const CACHE_CONTROL: &str = "public, max-age=3600";

/// How a browser should present a served file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Display in the browser
    Inline,
    /// Save to disk
    Attachment,
}

/// `Content-Disposition` value naming `file_name`
///
/// Characters that cannot appear inside a quoted header parameter are
/// replaced with `_`.
pub fn content_disposition(disposition: Disposition, file_name: &str) -> HeaderValue {
    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let safe: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!("{kind}; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Serves files and metadata below one root directory
#[derive(Clone, Debug)]
pub struct FileGateway {
    root: PathBuf,
}

impl FileGateway {
    /// Create a gateway rooted at `root` (which need not exist yet)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The served root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path to a regular file inside the root
    ///
    /// # Errors
    ///
    /// - [`Error::Forbidden`] if the path leaves the root, lexically or
    ///   through a symlink. The lexical check happens first, so escaping
    ///   paths are refused whether or not the target exists.
    /// - [`Error::NotFound`] if nothing exists there, it is a directory, or
    ///   a component below the root is not a directory.
    pub async fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let Some(normalized) = normalize(relative) else {
            tracing::warn!(path = %relative, "refusing path outside download root");
            return Err(access_denied());
        };

        let joined = self.root.join(&normalized);
        let canonical = match tokio::fs::canonicalize(&joined).await {
            Ok(path) => path,
            Err(e) if is_missing(&e) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let canonical_root = match tokio::fs::canonicalize(&self.root).await {
            Ok(path) => path,
            Err(e) if is_missing(&e) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        if !canonical.starts_with(&canonical_root) {
            tracing::warn!(path = %relative, "refusing symlink outside download root");
            return Err(access_denied());
        }
        if !tokio::fs::metadata(&canonical).await?.is_file() {
            return Err(not_found());
        }
        Ok(canonical)
    }

    /// Whether `path` names an extractor metadata document
    pub fn is_metadata(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(METADATA_SUFFIX))
    }

    /// Answer a metadata query
    ///
    /// With no parameters the document is returned verbatim. Otherwise
    /// `qualities` adds the quality summary and every other parameter name
    /// copies the top-level field of the same name, in request order.
    ///
    /// # Errors
    ///
    /// [`Error::NoMatch`] if parameters were given but none matched.
    pub async fn serve_metadata(
        &self,
        path: &Path,
        params: &[(String, String)],
    ) -> Result<serde_json::Value> {
        let contents = tokio::fs::read_to_string(path).await?;
        let raw: Mapping = serde_json::from_str(&contents)?;
        metadata_view(MediaInfo::from_mapping(raw), params)
    }

    /// Stream a file with range support and caching headers
    ///
    /// `request` supplies the method and the `Range`/conditional headers.
    pub async fn serve_raw(
        &self,
        path: &Path,
        disposition: Disposition,
        request: Request<Body>,
    ) -> Result<Response> {
        let response = match ServeFile::new(path).oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let mut response = response.map(Body::new);

        let headers = response.headers_mut();
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));

        if response.status().is_success() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, content_disposition(disposition, &name));
        }

        tracing::debug!(path = %path.display(), status = %response.status(), "served file");
        Ok(response)
    }
}

fn metadata_view(info: MediaInfo, params: &[(String, String)]) -> Result<serde_json::Value> {
    if params.is_empty() {
        return Ok(serde_json::Value::Object(info.raw));
    }

    let mut view = Mapping::new();
    if params.iter().any(|(name, _)| name == QUALITIES_PARAM) {
        view.insert(
            QUALITIES_PARAM.to_string(),
            serde_json::to_value(info.qualities())?,
        );
    }
    for (name, _) in params {
        if name == QUALITIES_PARAM {
            continue;
        }
        if let Some(value) = info.raw.get(name) {
            view.insert(name.clone(), value.clone());
        }
    }

    if view.is_empty() {
        return Err(Error::NoMatch);
    }
    Ok(serde_json::Value::Object(view))
}

/// Fold `.` and `..` without touching the filesystem; `None` if the path
/// climbs above its starting point or is absolute
fn normalize(relative: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}

fn access_denied() -> Error {
    Error::Forbidden("Access denied".into())
}

fn not_found() -> Error {
    Error::NotFound("File".into())
}

// Lookups that fail because the path cannot name an existing file
fn is_missing(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        error.kind(),
        ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::InvalidFilename
    )
}
