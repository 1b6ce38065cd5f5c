//! Tomarket Farmer Library
//!
//! A Telegram userbot that plays the Tomarket mini-app game on a schedule.
//!
//! This crate provides the core functionality for:
//! - Opening the game's mini-app from a Telegram session and decoding its launch data
//! - Talking to the game's HTTP/JSON API
//! - Running the per-account farming, bonus, game and task loop

pub mod api;
pub mod config;
pub mod farmer;
pub mod telegram;
