//! Tomarket Farmer - Main Entry Point
//!
//! Runs the game loop for every Telegram session found in the sessions
//! directory, one task per account.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use dialoguer::{Input, Password};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span};
use tracing_subscriber::EnvFilter;

use tomarket_farmer::config::{FarmSettings, TelegramConfig};
use tomarket_farmer::farmer::run_account;
use tomarket_farmer::telegram::{TelegramBot, TelegramError};

/// Telegram userbot that plays the Tomarket mini-app game.
#[derive(Parser, Debug)]
#[command(name = "tomarket_farmer")]
#[command(about = "Automate farming, bonuses, games and tasks in the Tomarket mini-app")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Sign in a new Telegram session with this name and exit.
    #[arg(long, value_name = "NAME")]
    add_session: Option<String>,
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

    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    if let Some(name) = args.add_session {
        return add_session(&tg_config, &name).await;
    }

    let settings = FarmSettings::from_env_with_defaults();

    let names = tg_config.session_names().with_context(|| {
        format!(
            "Failed to list sessions in {}",
            tg_config.sessions_dir.display()
        )
    })?;
    if names.is_empty() {
        bail!(
            "No sessions found in {}. Create one with --add-session <NAME>",
            tg_config.sessions_dir.display()
        );
    }

    info!("Starting {} account(s): {}", names.len(), names.join(", "));

    let tg_config = Arc::new(tg_config);
    let settings = Arc::new(settings);
    let mut accounts = JoinSet::new();

    for name in names {
        let tg_config = Arc::clone(&tg_config);
        let settings = Arc::clone(&settings);
        let span = info_span!("account", session = %name);

        accounts.spawn(
            async move {
                match run_account(&name, &tg_config, &settings).await {
                    Ok(()) => info!("Run finished"),
                    Err(e) if e.is_invalid_session() => error!("Invalid Session"),
                    Err(e) => error!("Run stopped: {}", e),
                }
            }
            .instrument(span),
        );
    }

    tokio::select! {
        () = drain(&mut accounts) => {
            info!("All accounts finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            accounts.shutdown().await;
        }
    }

    Ok(())
}

/// Waits for every account task, logging the ones that panicked.
async fn drain(accounts: &mut JoinSet<()>) {
    while let Some(joined) = accounts.join_next().await {
        if let Err(e) = joined {
            error!("Account task failed: {}", e);
        }
    }
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Signs in a new session interactively.
async fn add_session(config: &TelegramConfig, name: &str) -> Result<()> {
    std::fs::create_dir_all(&config.sessions_dir).with_context(|| {
        format!(
            "Failed to create sessions directory {}",
            config.sessions_dir.display()
        )
    })?;

    let bot = TelegramBot::connect(config, name, &config.session_path(name))
        .await
        .context("Failed to connect to Telegram")?;

    let result = authenticate(&bot, config).await;
    bot.disconnect();
    result?;

    println!(
        "✓ Session saved to: {}",
        config.session_path(name).display()
    );
    Ok(())
}

/// Handles Telegram authentication.
async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    if bot
        .is_authorized()
        .await
        .context("Failed to check authorization")?
    {
        info!("Session is already authorized");
        return Ok(());
    }

    let phone: String = Input::new()
        .with_prompt("Enter your phone number (with country code)")
        .interact_text()?;

    let token = bot
        .request_login_code(&phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => Ok(()),
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint");
            info!("Password hint: {}", hint);

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            bot.check_password(password_token, &password)
                .await
                .context("2FA authentication failed")?;
            Ok(())
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}
