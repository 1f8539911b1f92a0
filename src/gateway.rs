//! The boundary between the chat components and the hosted generative API.
//!
//! Everything above this module talks to [`GenerativeApi`]; the Gemini REST
//! client in `providers::gemini` is the production implementation and tests
//! substitute recording stubs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

use crate::credentials::Credential;
use crate::model::GenerationParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    File { uri: String, media_type: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// One side of a conversation exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model_id: String,
    pub params: GenerationParams,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub display_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFileState {
    Processing,
    Active,
    Failed,
    Unknown,
}

/// File metadata as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    pub media_type: String,
    pub state: RemoteFileState,
    pub expires_at: Option<DateTime<Utc>>,
}

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a>>;

pub trait GenerativeApi {
    /// Applies the credential to the client. Callers go through
    /// `CredentialGate`, which invokes this at most once.
    fn configure(&self, credential: &Credential) -> Result<()>;

    fn describe_model<'a>(&'a self, model_id: &'a str) -> ApiFuture<'a, ModelInfo>;

    /// Sends the full conversation and returns the generated text.
    fn generate<'a>(&'a self, request: GenerateRequest) -> ApiFuture<'a, String>;

    fn upload_file<'a>(&'a self, upload: FileUpload) -> ApiFuture<'a, RemoteFile>;

    fn get_file<'a>(&'a self, name: &'a str) -> ApiFuture<'a, RemoteFile>;

    fn delete_file<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;
}
