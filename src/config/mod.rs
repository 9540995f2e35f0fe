//! Configuration module for Herald.
//!
//! Engine settings live in [`DispatchConfig`] and can be built directly.
//! The bot binary loads everything else from environment variables.

use std::env;

use anyhow::{Context, bail};
use serde::Deserialize;

/// Engine-level matching settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Compare command words and prefixes without case folding.
    pub case_sensitive: bool,
    /// Ignore messages that do not start with a known prefix.
    pub require_prefix: bool,
}

impl DispatchConfig {
    /// Read `COMMAND_CASE_SENSITIVE` and `COMMAND_REQUIRE_PREFIX`.
    pub fn from_env() -> Self {
        Self {
            case_sensitive: env_flag("COMMAND_CASE_SENSITIVE"),
            require_prefix: env_flag("COMMAND_REQUIRE_PREFIX"),
        }
    }
}

/// Bot running mode
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Owner user IDs (comma-separated)
    /// These users pass every role check.
    pub owner_ids: Vec<u64>,

    pub dispatch: DispatchConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let bot_mode = match env::var("BOT_MODE")
            .unwrap_or_else(|_| "polling".to_string())
            .to_lowercase()
            .as_str()
        {
            "webhook" => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = env::var("WEBHOOK_URL").ok().filter(|s| !s.is_empty());
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            bail!("WEBHOOK_URL must be set when BOT_MODE is webhook");
        }

        let webhook_port = match env::var("WEBHOOK_PORT") {
            Ok(port) => port.trim().parse().context("WEBHOOK_PORT must be a port number")?,
            Err(_) => 8443,
        };

        Ok(Self {
            bot_token: env::var("BOT_TOKEN").context("BOT_TOKEN must be set")?,
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            owner_ids: parse_owner_ids(&env::var("OWNER_IDS").unwrap_or_default()),
            dispatch: DispatchConfig::from_env(),
        })
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).is_ok_and(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Parse a comma-separated list of user IDs, skipping junk.
fn parse_owner_ids(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect()
}
