//! Rental Listings Bot - Main Entry Point
//!
//! A Telegram bot that lets users post rental-housing listings through
//! a short step-by-step form and browse existing listings by city.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use rental_listings_bot::commands::{CallbackAction, Router};
use rental_listings_bot::config::{BotSettings, TelegramConfig};
use rental_listings_bot::storage::ListingStore;
use rental_listings_bot::telegram::{
    extract_events, BotEvent, RawUpdates, RentalBot, TelegramConversation,
};

/// Telegram bot for rental housing listings.
#[derive(Parser, Debug)]
#[command(name = "rental_bot")]
#[command(about = "Post and browse rental housing listings on Telegram")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Path to the listings data file (overrides DATA_PATH).
    #[arg(short, long)]
    data_file: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let mut settings = BotSettings::from_env_with_defaults();
    if let Some(data_file) = args.data_file {
        settings.data_path = data_file.into();
    }

    // Open the store; a fresh deployment starts with an empty data file
    let store = Arc::new(ListingStore::new(
        settings.data_path.clone(),
        settings.backup_keep,
    ));
    let listings = store
        .load()
        .await
        .context("Failed to open the listings data file")?;
    info!(
        "Loaded {} listings from {} (keeping {} backups)",
        listings.len(),
        settings.data_path.display(),
        settings.backup_keep
    );

    // Connect to Telegram
    let (bot, mut updates) = RentalBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    if !bot.is_authorized().await.context("Failed to check authorization")? {
        bot.sign_in_bot(&tg_config)
            .await
            .context("Bot authorization failed")?;
    }

    let bot = Arc::new(bot);
    let router = Router::new(Arc::clone(&store));

    info!("Bot is running. Use Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            maybe_updates = updates.recv() => {
                match maybe_updates {
                    Some(container) => handle_updates(&bot, &router, &container).await,
                    None => {
                        warn!("Updates stream closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    bot.disconnect();

    Ok(())
}

/// Dispatches every event found in one raw update container.
async fn handle_updates(bot: &Arc<RentalBot>, router: &Router, container: &RawUpdates) {
    let (events, peers) = extract_events(container);
    bot.note_peers(&peers).await;

    for event in events {
        match event {
            BotEvent::Message(message) => {
                let is_start = message.text.as_deref().is_some_and(is_start_command);
                let convo = TelegramConversation::from_message(Arc::clone(bot), message);

                let result = if is_start {
                    router.handle_start(&convo).await
                } else {
                    router.handle_message(&convo).await
                };
                if let Err(e) = result {
                    error!("Failed to handle message: {e:#}");
                }
            }
            BotEvent::Callback(callback) => {
                let convo = TelegramConversation::from_callback(Arc::clone(bot), callback.user_id);

                match CallbackAction::parse(&callback.data) {
                    Some(action) => {
                        if let Err(e) = router.handle_callback(&convo, &action).await {
                            error!("Failed to handle callback {}: {e:#}", callback.data);
                        }
                    }
                    None => debug!("Unknown callback data: {}", callback.data),
                }

                // Acknowledge even unknown taps so the client stops its spinner
                if let Err(e) = bot.answer_callback(callback.query_id).await {
                    warn!("Failed to answer callback query: {}", e);
                }
            }
        }
    }
}

/// Recognizes `/start`, including the `/start@botname` form.
fn is_start_command(text: &str) -> bool {
    let first = text.split_whitespace().next().unwrap_or("");
    matches!(first.split('@').next(), Some("/start"))
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
