//! Main Entrypoint for the Tutor Agent
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Constructing the model relay for the configured provider.
//! 4. Connecting to the room and running the agent loop until shutdown.

use std::sync::Arc;

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use tracing::info;
use tutor_agent::{
    config::{Config, Provider},
    room,
};
use tutor_core::{ModelRelay, OpenAICompatibleRelay};

/// Listens for the `Ctrl+C` signal to gracefully shut down the agent.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing agent...");

    // --- 3. Initialize the Model Relay ---
    let openai_config = match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .as_ref()
                .context("OPENAI_API_KEY not found")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://api.openai.com/v1/")
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let api_key = config
                .gemini_api_key
                .as_ref()
                .context("GEMINI_API_KEY not found")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai")
        }
    };
    let relay: Arc<dyn ModelRelay> = Arc::new(OpenAICompatibleRelay::new(
        openai_config,
        config.chat_model.clone(),
        config.persona.system_prompt(),
        config.relay_timeout,
    ));

    // --- 4. Run the Agent ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        persona = ?config.persona,
        room = %config.room_name,
        "Agent configured. Connecting..."
    );
    tokio::select! {
        result = room::run(Arc::new(config), relay) => result,
        _ = shutdown_signal() => Ok(()),
    }
}
