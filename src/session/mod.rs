mod multimodal;
mod text;

pub use multimodal::MultimodalChatRunner;
pub use text::TextChatRunner;

use anyhow::Result;
use tracing::warn;

use crate::console::Console;
use crate::model::{Conversation, MessageTurn};

/// Keyword that ends a chat loop, matched case-insensitively.
pub const EXIT_KEYWORD: &str = "quit";

/// Runner phases, recorded in debug logs at each boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInitialInput,
    AwaitingFirstResponse,
    Conversing,
    Ended,
}

fn is_exit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_KEYWORD)
}

fn print_reply(console: &mut dyn Console, reply: &str) {
    console.say(&format!("Gemini: {}", reply.trim()));
}

/// Runs the `Conversing` state until the exit keyword or end of input.
/// Failed turns are reported and the loop keeps going.
async fn converse(conversation: &mut Conversation<'_, '_>, console: &mut dyn Console) -> Result<()> {
    loop {
        let Some(input) = console.read_line("You: ")? else {
            break;
        };
        let prompt = input.trim();
        if is_exit(prompt) {
            break;
        }
        if prompt.is_empty() {
            console.say(&format!(
                "Please enter a message, or '{EXIT_KEYWORD}' to end the chat."
            ));
            continue;
        }

        match conversation.send(MessageTurn::text(prompt)).await {
            Ok(reply) => print_reply(console, &reply),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "message turn failed");
                console.report_error(&format!("Error sending message: {err:#}"));
            }
        }
    }

    Ok(())
}
