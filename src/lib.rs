pub mod config;
pub mod console;
pub mod credentials;
pub mod error;
pub mod files;
pub mod gateway;
pub mod logging;
pub mod menu;
pub mod model;
pub mod providers;
pub mod session;

#[cfg(test)]
mod testing;

use anyhow::Result;
use tracing::{info, warn};

use config::Config;
use console::{Console, StdConsole};
use credentials::CredentialGate;
use menu::SessionMenu;
use providers::gemini::GeminiApi;
use session::{MultimodalChatRunner, TextChatRunner};

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env();
    info!(
        api_base_url = %cfg.api_base_url,
        text_model = cfg.text_profile.as_ref().map(|p| p.model_id.as_str()),
        multimodal_model = cfg.multimodal_profile.as_ref().map(|p| p.model_id.as_str()),
        "loaded runtime configuration"
    );

    let api = GeminiApi::new(&cfg)?;
    let gate = CredentialGate::from_env(&api);
    let menu = build_menu(&gate, &cfg);

    let mut console = StdConsole;
    console.say("Welcome to the Gemini chat runner!");
    menu.run(&mut console).await
}

/// Registers a runner for every model profile the configuration enables.
pub fn build_menu<'g, 'a>(gate: &'g CredentialGate<'a>, cfg: &Config) -> SessionMenu<'g> {
    let mut menu = SessionMenu::new();

    match &cfg.text_profile {
        Some(profile) => menu.register(TextChatRunner::new(gate, profile.clone())),
        None => warn!("text chat disabled: TEXT_MODEL is empty"),
    }
    match &cfg.multimodal_profile {
        Some(profile) => menu.register(MultimodalChatRunner::new(
            gate,
            profile.clone(),
            cfg.readiness,
        )),
        None => warn!("multimodal chat disabled: MULTIMODAL_MODEL is empty"),
    }

    info!(runner_count = menu.len(), "session menu ready");
    menu
}
