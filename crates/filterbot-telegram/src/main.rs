//! filterbot-telegram — long-polling Telegram frontend for filterbot-core.

mod gateway;
mod handler;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use teloxide::prelude::*;
use tracing::info;

use filterbot_core::bot::FilterBot;
use filterbot_core::config::Config;
use filterbot_core::store::FilterStore;

use gateway::TelegramGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Config path: first argument, else ./config.yaml
    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir()
            .context("Failed to resolve working directory")?
            .join("config.yaml"),
    };
    let config = Config::load_or_default(&config_path)?;
    config.ensure_dirs()?;

    let Some(token) = config.bot_token.clone() else {
        anyhow::bail!("No bot token: set TELOXIDE_TOKEN or bot_token in {}", config_path.display());
    };

    let store = Arc::new(FilterStore::open(config.filters_path()).await);
    info!(
        chats = store.chat_count(),
        path = %store.path().display(),
        "Filters loaded"
    );

    let bot = Bot::new(token);
    let engine = Arc::new(FilterBot::new(
        &config,
        store,
        Arc::new(TelegramGateway::new(bot.clone())),
    ));

    let handler = Update::filter_message().endpoint(handler::on_message);

    info!("Bot is running");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}
