//! Standalone inspector for mini-app launch URLs.
//!
//! Decodes the launch payload out of a web view URL and prints the login
//! payload the farmer would send, to debug extraction failures offline.

use std::process::ExitCode;

use clap::Parser;

use tomarket_farmer::config::FALLBACK_REF_ID;
use tomarket_farmer::telegram::LaunchData;

/// Launch URL inspector.
#[derive(Parser, Debug)]
#[command(name = "inspect_launch")]
#[command(about = "Decodes a Telegram mini-app launch URL into the game's login payload")]
#[command(version)]
struct Args {
    /// The web view URL (with its #tgWebAppData=... fragment).
    url: String,

    /// Referral code to embed as start_param.
    #[arg(short, long, default_value = FALLBACK_REF_ID)]
    start_param: String,

    /// Treat the argument as a bare tgWebAppData value instead of a URL.
    #[arg(long)]
    raw: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let decoded = if args.raw {
        LaunchData::from_web_app_data(&args.url)
    } else {
        LaunchData::from_launch_url(&args.url)
    };

    match decoded {
        Ok(launch) => {
            let user = launch.user();
            println!("✓ Launch data is valid");
            println!(
                "  Telegram user: {} ({})",
                user.id,
                user.username.as_deref().unwrap_or("no username")
            );
            println!("\nInit data:\n{}", launch.init_data(&args.start_param));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}
