use std::sync::Arc;

use anyhow::Result;

use intelliapply::browser::CdpSessionFactory;
use intelliapply::clients::OpenAiClient;
use intelliapply::services::LogSink;
use intelliapply::{Config, Engine, GenerativeClient, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    intelliapply::utils::logging::init();

    let config = Config::from_env();

    // Standalone runs use the bundled in-memory store; a deployment wires a
    // relational store behind the same trait.
    let store = Arc::new(MemoryStore::new());
    let sessions = Arc::new(CdpSessionFactory::new(&config));
    let generative: Option<Arc<dyn GenerativeClient>> = if config.llm_api_key.is_empty() {
        None
    } else {
        Some(Arc::new(OpenAiClient::new(&config)))
    };

    let handle = Engine::start(config, store, sessions, generative, Arc::new(LogSink));

    tokio::signal::ctrl_c().await?;
    handle.stop().await;

    Ok(())
}
