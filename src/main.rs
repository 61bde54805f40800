use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scenario_bot::bot;
use scenario_bot::config::{BotConfig, LogFormat};
use scenario_bot::db::{self, PgSessionStore};
use scenario_bot::dialogue::DialogueEngine;
use scenario_bot::localization::LocalizationManager;
use scenario_bot::session::{InMemorySessionStore, SessionStore};
use scenario_bot::state_store::StateStore;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid bot configuration")?;
    init_tracing(config.log_format);

    info!("Starting Scenario Telegram Bot");

    let l10n = Arc::new(LocalizationManager::new().context("Failed to load localization bundles")?);

    let states = Arc::new(StateStore::new());
    states
        .load_files(&config.state_files)
        .context("Failed to load state documents")?;
    info!(states = states.len(), files = ?config.state_files, "State documents loaded");
    if !states.contains(&config.dialogue.entry_state) {
        warn!(entry_state = %config.dialogue.entry_state, "Entry state is not defined in any document");
    }

    let sessions: Arc<dyn SessionStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to PostgreSQL session store");
            let pool = db::connect(database_url).await?;
            db::init_database_schema(&pool).await?;
            Arc::new(PgSessionStore::with_entry_state(
                pool,
                config.dialogue.entry_state.clone(),
            ))
        }
        None => {
            warn!("DATABASE_URL not set, sessions are kept in memory and lost on restart");
            Arc::new(InMemorySessionStore::new(config.dialogue.entry_state.clone()))
        }
    };

    let engine = Arc::new(DialogueEngine::from_config(&config, states, sessions, l10n));

    // Initialize the bot
    let bot = Bot::new(config.telegram_token.clone());

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
