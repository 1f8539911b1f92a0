use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::config::ReadinessPolicy;
use crate::credentials::CredentialGate;
use crate::error::ChatError;
use crate::gateway::{FileUpload, Part, RemoteFile, RemoteFileState};

pub const SUPPORTED_MEDIA_TYPES: [&str; 8] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
    "text/tab-separated-values",
];

const SNIFF_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed,
}

/// A local file uploaded to the service and usable as a message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub path: PathBuf,
    pub display_name: String,
    pub media_type: String,
    /// Remote resource name, used for status checks and deletion.
    pub name: String,
    pub uri: String,
    pub readiness: Readiness,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&FilePart> for Part {
    fn from(file: &FilePart) -> Self {
        Part::File {
            uri: file.uri.clone(),
            media_type: file.media_type.clone(),
        }
    }
}

pub struct FilePartPreparer<'g, 'a> {
    gate: &'g CredentialGate<'a>,
    readiness: ReadinessPolicy,
}

impl<'g, 'a> FilePartPreparer<'g, 'a> {
    pub fn new(gate: &'g CredentialGate<'a>, readiness: ReadinessPolicy) -> Self {
        Self { gate, readiness }
    }

    /// Validates, uploads, and waits for `path` to become usable.
    ///
    /// Unsupported files are rejected before any request is made.
    pub async fn prepare(&self, path: impl AsRef<Path>) -> Result<FilePart, ChatError> {
        let path = path.as_ref();
        let is_file = tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ChatError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        let head = read_head(path)
            .await
            .map_err(|err| ChatError::upload_failed(path, err))?;
        let media_type = resolve_media_type(path, &head);
        let media_type = match media_type {
            Some(media_type) if SUPPORTED_MEDIA_TYPES.contains(&media_type) => media_type,
            other => {
                debug!(path = %path.display(), media_type = ?other, "rejecting unsupported file");
                return Err(ChatError::UnsupportedMediaType {
                    path: path.to_path_buf(),
                    media_type: other.map(str::to_string),
                });
            }
        };

        self.gate.ensure_configured()?;

        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))
            .map_err(|err| ChatError::upload_failed(path, err))?;

        info!(
            path = %path.display(),
            media_type,
            size_bytes = bytes.len(),
            "uploading file"
        );
        let remote = self
            .gate
            .api()
            .upload_file(FileUpload {
                display_name: display_name.clone(),
                media_type: media_type.to_string(),
                bytes,
            })
            .await
            .map_err(|err| ChatError::upload_failed(path, err))?;

        let name = remote.name.clone();
        let remote = match self.wait_until_ready(path, remote).await {
            Ok(remote) => remote,
            Err(err) => {
                self.delete_remote(&name).await;
                return Err(err);
            }
        };
        info!(name = %remote.name, uri = %remote.uri, "file ready");

        Ok(FilePart {
            path: path.to_path_buf(),
            display_name,
            media_type: media_type.to_string(),
            name: remote.name,
            uri: remote.uri,
            readiness: Readiness::Ready,
            expires_at: remote.expires_at,
        })
    }

    async fn wait_until_ready(
        &self,
        path: &Path,
        mut remote: RemoteFile,
    ) -> Result<RemoteFile, ChatError> {
        let api = self.gate.api();
        let mut attempts = 0;

        loop {
            match remote.state {
                RemoteFileState::Active => return Ok(remote),
                RemoteFileState::Failed => {
                    return Err(ChatError::upload_failed(
                        path,
                        anyhow!("service reported processing failure for '{}'", remote.name),
                    ));
                }
                RemoteFileState::Processing | RemoteFileState::Unknown => {}
            }

            if attempts >= self.readiness.max_attempts {
                warn!(name = %remote.name, attempts, "file did not become ready");
                return Err(ChatError::UploadNotReady {
                    name: remote.name,
                    waited: self.readiness.poll_interval * attempts,
                });
            }

            tokio::time::sleep(self.readiness.poll_interval).await;
            attempts += 1;
            debug!(name = %remote.name, attempt = attempts, "polling file state");
            remote = api
                .get_file(&remote.name)
                .await
                .map_err(|err| ChatError::upload_failed(path, err))?;
        }
    }

    /// Deletes the remote copy of `file`. Failures are logged and reported
    /// as `false`.
    pub async fn best_effort_delete(&self, file: &FilePart) -> bool {
        self.delete_remote(&file.name).await
    }

    async fn delete_remote(&self, name: &str) -> bool {
        match self.gate.api().delete_file(name).await {
            Ok(()) => {
                info!(name, "deleted uploaded file");
                true
            }
            Err(err) => {
                warn!(
                    name,
                    error = %format!("{err:#}"),
                    "failed to delete uploaded file"
                );
                false
            }
        }
    }
}

async fn read_head(path: &Path) -> anyhow::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open '{}'", path.display()))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    Ok(head)
}

/// Extension guess first, then content signature, then the fixed fallback
/// table. The table only matters when the `mime_guess` database in use lacks
/// one of its extensions.
pub fn resolve_media_type(path: &Path, head: &[u8]) -> Option<&'static str> {
    mime_guess::from_path(path)
        .first_raw()
        .or_else(|| sniff_media_type(head))
        .or_else(|| fallback_media_type(path))
}

fn sniff_media_type(head: &[u8]) -> Option<&'static str> {
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"WEBP" {
        Some("image/webp")
    } else if head.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else {
        None
    }
}

fn fallback_media_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "csv" => Some("text/csv"),
        "txt" => Some("text/plain"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}
