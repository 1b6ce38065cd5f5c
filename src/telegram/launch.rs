//! Mini-app launch data extraction.
//!
//! The web view URL returned by Telegram carries the signed launch payload in
//! its `tgWebAppData` parameter. The payload is itself a query string; the game
//! backend wants five of its fields re-emitted in a fixed order together with
//! the referral code.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use url::{Url, form_urlencoded};

/// Name of the URL parameter holding the launch payload.
const WEB_APP_DATA_PARAM: &str = "tgWebAppData";

/// Errors that can occur while decoding launch data.
#[derive(Debug, Error)]
pub enum LaunchDataError {
    #[error("Launch URL could not be parsed: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Launch URL carries no tgWebAppData parameter")]
    MissingWebAppData,

    #[error("Launch data is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("Launch data field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// The Telegram user embedded in the launch payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Decoded launch payload.
///
/// `user` keeps its percent-encoded form so it can be re-emitted exactly as
/// Telegram signed it.
#[derive(Debug, Clone)]
pub struct LaunchData {
    user: String,
    chat_instance: String,
    chat_type: String,
    auth_date: String,
    hash: String,
    web_app_user: WebAppUser,
}

impl LaunchData {
    /// Decodes the launch payload out of a web view URL.
    pub fn from_launch_url(launch_url: &str) -> Result<Self, LaunchDataError> {
        let url = Url::parse(launch_url)?;

        let data = url
            .fragment()
            .into_iter()
            .chain(url.query())
            .flat_map(|part| form_urlencoded::parse(part.as_bytes()))
            .find(|(key, _)| key == WEB_APP_DATA_PARAM)
            .map(|(_, value)| value.into_owned())
            .ok_or(LaunchDataError::MissingWebAppData)?;

        Self::from_web_app_data(&data)
    }

    /// Decodes an already extracted `tgWebAppData` value.
    pub fn from_web_app_data(data: &str) -> Result<Self, LaunchDataError> {
        let raw: HashMap<&str, &str> = data
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .collect();
        let decoded: HashMap<String, String> = form_urlencoded::parse(data.as_bytes())
            .into_owned()
            .collect();

        let field = |name: &'static str| -> Result<String, LaunchDataError> {
            raw.get(name)
                .filter(|value| !value.is_empty())
                .map(|value| (*value).to_owned())
                .ok_or(LaunchDataError::MissingField(name))
        };

        let user = field("user")?;
        let chat_instance = field("chat_instance")?;
        let chat_type = field("chat_type")?;
        let auth_date = field("auth_date")?;
        let hash = field("hash")?;

        if auth_date.parse::<u64>().is_err() {
            return Err(LaunchDataError::InvalidField {
                field: "auth_date",
                reason: format!("expected a unix timestamp, got {auth_date:?}"),
            });
        }

        let user_json = decoded
            .get("user")
            .ok_or(LaunchDataError::MissingField("user"))?;
        let web_app_user: WebAppUser =
            serde_json::from_str(user_json).map_err(|e| LaunchDataError::InvalidField {
                field: "user",
                reason: e.to_string(),
            })?;

        Ok(Self {
            user,
            chat_instance,
            chat_type,
            auth_date,
            hash,
            web_app_user,
        })
    }

    /// Composes the login payload in the order the game backend expects.
    #[must_use]
    pub fn init_data(&self, start_param: &str) -> String {
        format!(
            "user={}&chat_instance={}&chat_type={}&start_param={}&auth_date={}&hash={}",
            self.user, self.chat_instance, self.chat_type, start_param, self.auth_date, self.hash
        )
    }

    /// The Telegram user the payload was issued for.
    #[must_use]
    pub fn user(&self) -> &WebAppUser {
        &self.web_app_user
    }
}
