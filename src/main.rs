use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = gemini_chat::logging::init();
    gemini_chat::run().await
}
