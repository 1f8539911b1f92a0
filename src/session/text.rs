use tracing::debug;

use crate::config::ModelProfile;
use crate::console::Console;
use crate::credentials::CredentialGate;
use crate::menu::{RunnerFuture, SessionRunner};
use crate::model::ModelFactory;

use super::{EXIT_KEYWORD, SessionState, converse};

/// Text-only chat: model setup, then straight into the conversation loop.
pub struct TextChatRunner<'g, 'a> {
    gate: &'g CredentialGate<'a>,
    profile: ModelProfile,
}

impl<'g, 'a> TextChatRunner<'g, 'a> {
    pub fn new(gate: &'g CredentialGate<'a>, profile: ModelProfile) -> Self {
        Self { gate, profile }
    }
}

impl<'g, 'a> SessionRunner for TextChatRunner<'g, 'a> {
    fn name(&self) -> &str {
        "Text Chat Session"
    }

    fn run<'r>(&'r self, console: &'r mut dyn Console) -> RunnerFuture<'r> {
        Box::pin(async move {
            let model = ModelFactory::new(self.gate)
                .create_model(&self.profile.model_id, self.profile.params)
                .await?;
            console.say(&format!("Text model loaded: {}", model.model_id()));

            debug!(state = ?SessionState::Conversing, "session state change");
            let mut conversation = model.start_conversation();
            console.say(&format!("Start chatting! Type '{EXIT_KEYWORD}' to end."));
            converse(&mut conversation, console).await?;

            debug!(state = ?SessionState::Ended, "session state change");
            Ok(())
        })
    }
}
