//! Farming settings and Telegram configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DEFAULT_GAME_API_BASE, FALLBACK_REF_ID};

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Directory holding one `<name>.session` file per account.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String) -> Self {
        Self {
            api_id,
            api_hash,
            sessions_dir: default_sessions_dir(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID` and `TG_API_HASH` to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let sessions_dir = std::env::var("TG_SESSIONS_DIR")
            .map_or_else(|_| default_sessions_dir(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            sessions_dir,
        })
    }

    /// Path of the session file for the named account.
    #[must_use]
    pub fn session_path(&self, name: &str) -> PathBuf {
        self.sessions_dir.join(format!("{name}.session"))
    }

    /// Lists the account names that have a session file, sorted.
    pub fn session_names(&self) -> std::io::Result<Vec<String>> {
        list_sessions(&self.sessions_dir)
    }
}

fn list_sessions(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "session"))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_owned))
        .collect();
    names.sort();
    Ok(names)
}

/// Per-run farming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmSettings {
    /// Referral code sent with the launch request and the login.
    #[serde(default = "default_ref_id")]
    pub ref_id: String,

    /// Claim the star bonus when its window is open.
    pub auto_claim_stars: bool,

    /// Claim the hidden combo when its window is open.
    pub auto_claim_combo: bool,

    /// Claim the daily reward every cycle.
    pub auto_daily_reward: bool,

    /// Spend play passes on the mini-game.
    pub auto_play_game: bool,

    /// Run the task catalog.
    pub auto_task: bool,

    /// Sleep a random delay before an account starts.
    pub use_random_delay: bool,

    /// Bounds (seconds, inclusive) of the random startup delay.
    pub random_delay_secs: (u64, u64),

    /// Base URL of the game API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Log the outbound IP before the first login.
    pub check_ip: bool,
}

fn default_ref_id() -> String {
    FALLBACK_REF_ID.to_owned()
}

fn default_api_base() -> String {
    DEFAULT_GAME_API_BASE.to_owned()
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            ref_id: default_ref_id(),
            auto_claim_stars: true,
            auto_claim_combo: true,
            auto_daily_reward: true,
            auto_play_game: true,
            auto_task: true,
            use_random_delay: true,
            random_delay_secs: (5, 30),
            api_base: default_api_base(),
            check_ip: false,
        }
    }
}

impl FarmSettings {
    /// Creates farm settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        let defaults = Self::default();
        Self {
            ref_id: std::env::var("REF_ID")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.ref_id),
            auto_claim_stars: env_flag("AUTO_CLAIM_STARS", defaults.auto_claim_stars),
            auto_claim_combo: env_flag("AUTO_CLAIM_COMBO", defaults.auto_claim_combo),
            auto_daily_reward: env_flag("AUTO_DAILY_REWARD", defaults.auto_daily_reward),
            auto_play_game: env_flag("AUTO_PLAY_GAME", defaults.auto_play_game),
            auto_task: env_flag("AUTO_TASK", defaults.auto_task),
            use_random_delay: env_flag("USE_RANDOM_DELAY_IN_RUN", defaults.use_random_delay),
            random_delay_secs: std::env::var("RANDOM_DELAY_IN_RUN")
                .ok()
                .and_then(|s| parse_bounds(&s))
                .unwrap_or(defaults.random_delay_secs),
            api_base: std::env::var("GAME_API_BASE").unwrap_or(defaults.api_base),
            check_ip: env_flag("CHECK_IP", defaults.check_ip),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|s| parse_flag(&s))
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses `min,max` (brackets tolerated), swapping reversed bounds.
fn parse_bounds(value: &str) -> Option<(u64, u64)> {
    let trimmed = value.trim().trim_start_matches('[').trim_end_matches(']');
    let (min, max) = trimmed.split_once(',')?;
    let min: u64 = min.trim().parse().ok()?;
    let max: u64 = max.trim().parse().ok()?;
    Some(if min <= max { (min, max) } else { (max, min) })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,
}
