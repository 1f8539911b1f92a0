use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures a caller of the chat components is expected to tell apart.
///
/// Transport and provider details are carried as an `anyhow::Error` cause and
/// rendered with their full context chain.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no API key found: set {searched} in the environment or a local .env file")]
    MissingCredential { searched: String },

    #[error("the API client rejected the credential: {cause:#}")]
    CredentialRejected { cause: anyhow::Error },

    #[error("failed to create model '{model}': {cause:#}")]
    ModelCreation {
        model: String,
        cause: anyhow::Error,
    },

    #[error("'{}' is not a regular file", path.display())]
    NotAFile { path: PathBuf },

    #[error(
        "unsupported media type {} for '{}'",
        media_type.as_deref().unwrap_or("(unknown)"),
        path.display()
    )]
    UnsupportedMediaType {
        path: PathBuf,
        media_type: Option<String>,
    },

    #[error("failed to upload '{}': {cause:#}", path.display())]
    UploadFailed {
        path: PathBuf,
        cause: anyhow::Error,
    },

    #[error("uploaded file '{name}' was not ready after {}ms", waited.as_millis())]
    UploadNotReady { name: String, waited: Duration },

    #[error("nothing to send: enter a message or a file path")]
    NoInitialContent,

    #[error("invalid selection '{input}': enter a number between 1 and {max} or 'q'")]
    InvalidSelection { input: String, max: usize },

    #[error("no runnable chat sessions are configured")]
    NoRunnersAvailable,
}

impl ChatError {
    pub(crate) fn model_creation(model: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::ModelCreation {
            model: model.into(),
            cause,
        }
    }

    pub(crate) fn upload_failed(path: impl Into<PathBuf>, cause: anyhow::Error) -> Self {
        Self::UploadFailed {
            path: path.into(),
            cause,
        }
    }
}
