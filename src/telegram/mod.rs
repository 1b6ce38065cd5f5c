//! Telegram client wrapper module.
//!
//! Provides the account session used to open the game's mini-app and the
//! decoding of the launch payload it returns.

mod client;
mod launch;

pub use client::{LoginToken, PasswordToken, TelegramBot, TelegramError};
pub use launch::{LaunchData, LaunchDataError, WebAppUser};

/// Username of the game bot.
pub const GAME_BOT_USERNAME: &str = "Tomarket_ai_bot";

/// Short name of the game's mini-app.
pub const GAME_APP_SHORT_NAME: &str = "app";
