use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{ModelProfile, ReadinessPolicy};
use crate::console::Console;
use crate::credentials::CredentialGate;
use crate::error::ChatError;
use crate::files::{FilePart, FilePartPreparer};
use crate::gateway::Part;
use crate::menu::{RunnerFuture, SessionRunner};
use crate::model::{MessageTurn, ModelFactory, ModelHandle};

use super::{EXIT_KEYWORD, SessionState, converse, is_exit, print_reply};

/// Chat whose first message may carry one uploaded file.
pub struct MultimodalChatRunner<'g, 'a> {
    gate: &'g CredentialGate<'a>,
    profile: ModelProfile,
    readiness: ReadinessPolicy,
}

struct InitialInput {
    text: String,
    file: Option<FilePart>,
}

impl<'g, 'a> MultimodalChatRunner<'g, 'a> {
    pub fn new(
        gate: &'g CredentialGate<'a>,
        profile: ModelProfile,
        readiness: ReadinessPolicy,
    ) -> Self {
        Self {
            gate,
            profile,
            readiness,
        }
    }

    /// `AwaitingInitialInput`. Returns `None` when the operator quits at the
    /// first prompt.
    async fn collect_initial_input(
        &self,
        preparer: &FilePartPreparer<'_, '_>,
        console: &mut dyn Console,
    ) -> Result<Option<InitialInput>> {
        debug!(state = ?SessionState::AwaitingInitialInput, "session state change");
        let Some(text) = console.read_line("You (Text): ")? else {
            return Ok(None);
        };
        if is_exit(&text) {
            return Ok(None);
        }

        let path = console
            .read_line("Enter file path (or press Enter to skip): ")?
            .unwrap_or_default();
        let path = path.trim();

        let file = if path.is_empty() {
            None
        } else {
            console.say(&format!("Uploading file: {path}..."));
            match preparer.prepare(path).await {
                Ok(file) => {
                    console.say(&format!("Uploaded file: {}", file.uri));
                    if let Some(expires_at) = file.expires_at {
                        console.say(&format!("(available until {})", expires_at.to_rfc3339()));
                    }
                    Some(file)
                }
                Err(err) => {
                    warn!(path, error = %err, "file attachment abandoned");
                    console.report_error(&format!("Error preparing file: {err}"));
                    None
                }
            }
        };

        Ok(Some(InitialInput {
            text: text.trim().to_string(),
            file,
        }))
    }

    /// `AwaitingFirstResponse` followed by `Conversing`.
    async fn chat(
        &self,
        model: &ModelHandle<'a>,
        initial: &InitialInput,
        console: &mut dyn Console,
    ) -> Result<()> {
        let mut turn = MessageTurn::default();
        if let Some(file) = &initial.file {
            turn.push(file);
        }
        if !initial.text.is_empty() {
            turn.push(Part::text(initial.text.as_str()));
        }

        let mut conversation = model.start_conversation();
        let reply = conversation
            .send(turn)
            .await
            .context("first message was not answered; session abandoned")?;
        print_reply(console, &reply);

        debug!(state = ?SessionState::Conversing, "session state change");
        converse(&mut conversation, console).await?;
        Ok(())
    }

    /// `Ended`: always try to remove the uploaded file.
    async fn clean_up(
        &self,
        preparer: &FilePartPreparer<'_, '_>,
        file: &FilePart,
        console: &mut dyn Console,
    ) {
        if preparer.best_effort_delete(file).await {
            console.say(&format!("Cleaned up uploaded file: {}", file.display_name));
        } else {
            console.say(&format!(
                "Note: could not delete uploaded file {}; the service will expire it.",
                file.display_name
            ));
        }
    }
}

impl<'g, 'a> SessionRunner for MultimodalChatRunner<'g, 'a> {
    fn name(&self) -> &str {
        "Multimodal Chat Session"
    }

    fn run<'r>(&'r self, console: &'r mut dyn Console) -> RunnerFuture<'r> {
        Box::pin(async move {
            let model = ModelFactory::new(self.gate)
                .create_model(&self.profile.model_id, self.profile.params)
                .await?;
            let preparer = FilePartPreparer::new(self.gate, self.readiness);

            console.say(&format!(
                "Multimodal chat started with {}. Type '{EXIT_KEYWORD}' to exit.",
                model.model_id()
            ));
            console.say("Enter a text prompt, then optionally a file path.");

            let Some(initial) = self.collect_initial_input(&preparer, console).await? else {
                debug!(state = ?SessionState::Ended, "session state change");
                return Ok(());
            };
            if initial.text.is_empty() && initial.file.is_none() {
                debug!(state = ?SessionState::Ended, "session state change");
                return Err(ChatError::NoInitialContent.into());
            }
            debug!(state = ?SessionState::AwaitingFirstResponse, "session state change");

            let outcome = self.chat(&model, &initial, console).await;

            debug!(state = ?SessionState::Ended, "session state change");
            if let Some(file) = &initial.file {
                self.clean_up(&preparer, file, console).await;
            }
            if outcome.is_ok() {
                info!(model = %model.model_id(), "multimodal session ended");
            }
            outcome
        })
    }
}
