//! Configuration module for the farmer.
//!
//! Handles loading Telegram API credentials and the per-run farming
//! settings (referral code, feature toggles, startup jitter).

mod settings;

pub use settings::{ConfigError, FarmSettings, TelegramConfig};

/// Production base URL of the game API.
pub const DEFAULT_GAME_API_BASE: &str = "https://api-web.tomarket.ai/tomarket-game/v1";

/// Referral code used when the configured one is not picked.
pub const FALLBACK_REF_ID: &str = "00005UEJ";
