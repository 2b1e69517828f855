//! Configuration module for the rental bot.
//!
//! Handles loading of Telegram API credentials and bot settings
//! from environment variables.

mod settings;

pub use settings::{BotSettings, ConfigError, TelegramConfig};
