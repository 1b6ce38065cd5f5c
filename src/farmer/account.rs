//! Bootstrap and run of one account.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::rules;
use super::runner::{FarmError, Farmer};
use super::state::pause;
use crate::api::{ApiError, GameApi};
use crate::config::{FarmSettings, TelegramConfig};
use crate::telegram::{
    GAME_APP_SHORT_NAME, GAME_BOT_USERNAME, LaunchData, LaunchDataError, TelegramBot,
    TelegramError,
};

/// Errors that end an account's run.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error("Could not extract launch data: {0}")]
    LaunchData(#[from] LaunchDataError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Farm(#[from] FarmError),
}

impl AccountError {
    /// Returns `true` when the Telegram session itself is unusable.
    #[must_use]
    pub const fn is_invalid_session(&self) -> bool {
        matches!(self, Self::Telegram(TelegramError::InvalidSession))
    }
}

/// Runs one account until its loop ends.
///
/// Launch data is fetched once per run; a failure there ends the run.
pub async fn run_account(
    name: &str,
    telegram: &TelegramConfig,
    settings: &FarmSettings,
) -> Result<(), AccountError> {
    if settings.use_random_delay {
        let delay = rules::start_delay(settings.random_delay_secs, &mut rand::rng());
        info!("Bot will start in {}s", delay);
        pause(Duration::from_secs(delay)).await;
    }

    let api = GameApi::new(settings.api_base.as_str())?;

    if settings.check_ip {
        match api.public_ip().await {
            Ok(Some(ip)) => info!("Outbound IP: {}", ip),
            Ok(None) => warn!("IP echo returned no address"),
            Err(e) => warn!("check_ip error: {}", e),
        }
    }

    let ref_id = rules::pick_ref_id(&settings.ref_id, &mut rand::rng()).to_owned();
    let launch = fetch_launch_data(name, telegram, &ref_id).await?;
    info!("Launch data ready for Telegram user {}", launch.user().id);

    let mut farmer = Farmer::new(api, launch.init_data(&ref_id), ref_id, settings.clone());
    farmer.run().await?;
    Ok(())
}

/// Opens the game's mini-app with the account's session and decodes the launch data.
async fn fetch_launch_data(
    name: &str,
    telegram: &TelegramConfig,
    ref_id: &str,
) -> Result<LaunchData, AccountError> {
    let bot = TelegramBot::connect(telegram, name, &telegram.session_path(name)).await?;

    let result = async {
        bot.ensure_authorized().await?;
        let url = bot
            .request_app_url(GAME_BOT_USERNAME, GAME_APP_SHORT_NAME, ref_id)
            .await?;
        Ok::<_, AccountError>(LaunchData::from_launch_url(&url)?)
    }
    .await;

    bot.disconnect();
    result
}
