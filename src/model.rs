use anyhow::{Result, anyhow};
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

use crate::credentials::CredentialGate;
use crate::error::ChatError;
use crate::gateway::{Content, GenerateRequest, GenerativeApi, ModelInfo, Part, Role};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;

    fn validate(&self) -> Result<()> {
        if !Self::TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(anyhow!(
                "temperature {} is outside the supported range 0.0..=2.0",
                self.temperature
            ));
        }
        if self.max_output_tokens == 0 {
            return Err(anyhow!("max output tokens must be greater than zero"));
        }
        Ok(())
    }
}

/// A remote model bound to one set of generation parameters.
pub struct ModelHandle<'a> {
    api: &'a dyn GenerativeApi,
    model_id: String,
    params: GenerationParams,
    info: ModelInfo,
}

impl<'a> ModelHandle<'a> {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn params(&self) -> GenerationParams {
        self.params
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    /// Starts a conversation with empty history.
    pub fn start_conversation(&self) -> Conversation<'_, 'a> {
        debug!(model = %self.model_id, "starting conversation");
        Conversation {
            model: self,
            history: Vec::new(),
        }
    }
}

pub struct ModelFactory<'g, 'a> {
    gate: &'g CredentialGate<'a>,
}

impl<'g, 'a> ModelFactory<'g, 'a> {
    pub fn new(gate: &'g CredentialGate<'a>) -> Self {
        Self { gate }
    }

    /// Configures the credential if needed, then checks the model id and
    /// parameters with the service. Every call returns a fresh handle.
    pub async fn create_model(
        &self,
        model_id: &str,
        params: GenerationParams,
    ) -> Result<ModelHandle<'a>, ChatError> {
        self.gate.ensure_configured()?;

        let model_id = model_id.trim();
        if model_id.is_empty() {
            return Err(ChatError::model_creation(
                model_id,
                anyhow!("model id must not be empty"),
            ));
        }
        params
            .validate()
            .map_err(|err| ChatError::model_creation(model_id, err))?;

        let api = self.gate.api();
        let info = api.describe_model(model_id).await.map_err(|err| {
            warn!(model = %model_id, error = %format!("{err:#}"), "model lookup failed");
            ChatError::model_creation(model_id, err)
        })?;

        info!(
            model = %model_id,
            temperature = params.temperature,
            max_output_tokens = params.max_output_tokens,
            "created model handle"
        );
        Ok(ModelHandle {
            api,
            model_id: model_id.to_string(),
            params,
            info,
        })
    }
}

/// Ordered parts sent together as one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTurn {
    parts: Vec<Part>,
}

impl MessageTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
        }
    }

    pub fn push(&mut self, part: impl Into<Part>) {
        self.parts.push(part.into());
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// A conversation with one model. Turns only enter the history once the
/// service has answered them.
pub struct Conversation<'m, 'a> {
    model: &'m ModelHandle<'a>,
    history: Vec<Content>,
}

impl<'m, 'a> Conversation<'m, 'a> {
    pub fn history(&self) -> &[Content] {
        &self.history
    }

    pub async fn send(&mut self, turn: MessageTurn) -> Result<String> {
        if turn.is_empty() {
            return Err(anyhow!("cannot send an empty message"));
        }

        let user = Content {
            role: Role::User,
            parts: turn.parts,
        };
        let mut contents = self.history.clone();
        contents.push(user.clone());

        debug!(
            model = %self.model.model_id,
            history_len = self.history.len(),
            part_count = user.parts.len(),
            "sending message turn"
        );
        let reply = self
            .model
            .api
            .generate(GenerateRequest {
                model_id: self.model.model_id.clone(),
                params: self.model.params,
                contents,
            })
            .await?;

        self.history.push(user);
        self.history.push(Content {
            role: Role::Model,
            parts: vec![Part::text(reply.clone())],
        });
        Ok(reply)
    }
}
