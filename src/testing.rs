//! Recording stand-ins for the API and console seams.

use anyhow::{Result, anyhow};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::console::Console;
use crate::credentials::{Credential, CredentialGate};
use crate::gateway::{
    ApiFuture, FileUpload, GenerateRequest, GenerativeApi, ModelInfo, RemoteFile, RemoteFileState,
};

#[derive(Debug)]
pub struct StubApi {
    pub reject_configure: Cell<bool>,
    pub reject_models: Cell<bool>,
    pub fail_uploads: Cell<bool>,
    pub fail_deletes: Cell<bool>,
    pub upload_state: Cell<RemoteFileState>,
    configured: RefCell<Vec<String>>,
    described: RefCell<Vec<String>>,
    replies: RefCell<VecDeque<Result<String, String>>>,
    requests: RefCell<Vec<GenerateRequest>>,
    uploads: RefCell<Vec<FileUpload>>,
    file_states: RefCell<VecDeque<RemoteFileState>>,
    get_file_calls: Cell<usize>,
    deleted: RefCell<Vec<String>>,
}

impl Default for StubApi {
    fn default() -> Self {
        Self {
            reject_configure: Cell::new(false),
            reject_models: Cell::new(false),
            fail_uploads: Cell::new(false),
            fail_deletes: Cell::new(false),
            upload_state: Cell::new(RemoteFileState::Active),
            configured: RefCell::new(Vec::new()),
            described: RefCell::new(Vec::new()),
            replies: RefCell::new(VecDeque::new()),
            requests: RefCell::new(Vec::new()),
            uploads: RefCell::new(Vec::new()),
            file_states: RefCell::new(VecDeque::new()),
            get_file_calls: Cell::new(0),
            deleted: RefCell::new(Vec::new()),
        }
    }
}

impl StubApi {
    /// Queues the outcome of the next `generate` call. Unqueued calls answer
    /// `"ok"`.
    pub fn push_reply(&self, reply: Result<&str, &str>) {
        self.replies
            .borrow_mut()
            .push_back(reply.map(str::to_string).map_err(str::to_string));
    }

    pub fn push_file_state(&self, state: RemoteFileState) {
        self.file_states.borrow_mut().push_back(state);
    }

    pub fn configure_calls(&self) -> usize {
        self.configured.borrow().len()
    }

    pub fn configured_with(&self) -> Option<String> {
        self.configured.borrow().last().cloned()
    }

    pub fn described_models(&self) -> Vec<String> {
        self.described.borrow().clone()
    }

    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.requests.borrow().clone()
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.borrow().len()
    }

    pub fn uploads(&self) -> Vec<FileUpload> {
        self.uploads.borrow().clone()
    }

    pub fn get_file_calls(&self) -> usize {
        self.get_file_calls.get()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    fn remote_file(&self, name: &str, state: RemoteFileState) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            uri: format!("https://files.test/{name}"),
            media_type: "application/octet-stream".to_string(),
            state,
            expires_at: None,
        }
    }
}

impl GenerativeApi for StubApi {
    fn configure(&self, credential: &Credential) -> Result<()> {
        self.configured
            .borrow_mut()
            .push(credential.expose().to_string());
        if self.reject_configure.get() {
            return Err(anyhow!("credential rejected"));
        }
        Ok(())
    }

    fn describe_model<'a>(&'a self, model_id: &'a str) -> ApiFuture<'a, ModelInfo> {
        self.described.borrow_mut().push(model_id.to_string());
        let result = if self.reject_models.get() {
            Err(anyhow!("model '{model_id}' not found"))
        } else {
            Ok(ModelInfo {
                name: format!("models/{model_id}"),
                display_name: None,
            })
        };
        Box::pin(async move { result })
    }

    fn generate<'a>(&'a self, request: GenerateRequest) -> ApiFuture<'a, String> {
        self.requests.borrow_mut().push(request);
        let result = match self.replies.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok("ok".to_string()),
        };
        Box::pin(async move { result })
    }

    fn upload_file<'a>(&'a self, upload: FileUpload) -> ApiFuture<'a, RemoteFile> {
        let name = format!("files/upload-{}", self.uploads.borrow().len() + 1);
        self.uploads.borrow_mut().push(upload);
        let result = if self.fail_uploads.get() {
            Err(anyhow!("upload rejected"))
        } else {
            Ok(self.remote_file(&name, self.upload_state.get()))
        };
        Box::pin(async move { result })
    }

    fn get_file<'a>(&'a self, name: &'a str) -> ApiFuture<'a, RemoteFile> {
        self.get_file_calls.set(self.get_file_calls.get() + 1);
        let state = self
            .file_states
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.upload_state.get());
        let result = Ok(self.remote_file(name, state));
        Box::pin(async move { result })
    }

    fn delete_file<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        self.deleted.borrow_mut().push(name.to_string());
        let result = if self.fail_deletes.get() {
            Err(anyhow!("delete rejected"))
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }
}

pub fn gate_with_key(api: &StubApi) -> CredentialGate<'_> {
    CredentialGate::with_lookup(api, |key| {
        (key == "GEMINI_API_KEY").then(|| "test-key".to_string())
    })
}

/// Feeds scripted input lines and records everything shown.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    inputs: VecDeque<String>,
    pub prompts: Vec<String>,
    pub output: Vec<String>,
    pub errors: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(|line| (*line).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn errors_containing(&self, needle: &str) -> usize {
        self.errors
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.inputs.pop_front())
    }

    fn say(&mut self, line: &str) {
        self.output.push(line.to_string());
    }

    fn report_error(&mut self, line: &str) {
        self.errors.push(line.to_string());
    }
}
