//! Game API errors.

use thiserror::Error;

/// Errors returned by [`super::GameApi`].
///
/// Everything except [`ApiError::Unauthorized`] is transient: the caller may
/// skip the step and carry on with the next one.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Game API rejected the credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("Game API responded with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Returns `true` when the account cannot continue with its current credentials.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
