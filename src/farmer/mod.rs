//! Game automation module.
//!
//! Runs the per-account loop against the game API and bootstraps each
//! account from its Telegram session.

mod account;
pub mod rules;
mod runner;
mod state;

pub use account::{AccountError, run_account};
pub use runner::{CycleOutcome, FarmError, Farmer};
pub use state::{FARMING_GRACE_SECS, FarmState, Pacing, now_unix, parse_server_time};
