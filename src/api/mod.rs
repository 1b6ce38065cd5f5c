//! Game API module.
//!
//! A thin HTTP/JSON client over the game backend plus the response types
//! the automation loop reads.

mod client;
mod error;
mod types;

pub use client::{GameApi, Route};
pub use error::ApiError;
pub use types::{
    ApiResponse, Balance, ComboTask, DailyClaim, FarmClaim, Farming, GameClaim, LoginData,
    StarsReward, StarsTask, Task, flatten_catalog,
};
