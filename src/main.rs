use std::sync::Arc;

use anyhow::Context as _;
use plugcord::{config::Config, console, dispatch::Dispatcher, loader::DirectorySource, Data};
use serenity::all::{Client, GatewayIntents};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();
    info!("Loading definitions from {}", config.definitions_root.display());

    let source = Arc::new(DirectorySource::from_config(&config));
    let data = Arc::new(Data::new(config, source));

    // Remote sync waits for the gateway; this only fills the registry.
    let report = data
        .reconciler
        .reconcile_all(false)
        .await
        .context("Failed to load definitions")?;
    info!("Initial load: {}", report);
    if data.registry.read().is_empty() {
        warn!("No definitions loaded, check the configured directories");
    }

    if data.config.console_enabled {
        tokio::spawn(console::run(data.clone()));
    }

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGES;

    let mut client = Client::builder(&discord_token, intents)
        .event_handler(Dispatcher::new(data))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
