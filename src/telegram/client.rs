//! Telegram client wrapper for mini-app launches.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::{Client, InvocationError, SenderPool, SignInError, sender};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;

/// Extra seconds slept on top of a flood wait before retrying.
const FLOOD_WAIT_MARGIN_SECS: u64 = 3;

/// RPC error names that mean the session can no longer be used.
const REVOKED_SESSION_ERRORS: &[&str] = &[
    "AUTH_KEY_UNREGISTERED",
    "SESSION_REVOKED",
    "SESSION_EXPIRED",
    "USER_DEACTIVATED",
    "USER_DEACTIVATED_BAN",
];

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Session is not authorized or has been revoked")]
    InvalidSession,

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Could not resolve bot @{0}")]
    BotNotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        if let InvocationError::Rpc(rpc) = &err
            && let Some(mapped) = classify_rpc(rpc.code, &rpc.name, rpc.value)
        {
            return mapped;
        }

        let err_str = err.to_string();
        if let Some(seconds) = extract_flood_wait_seconds(&err_str) {
            return Self::FloodWait(seconds);
        }

        Self::Invocation(err_str)
    }
}

/// Maps an RPC error onto the variants the caller acts on.
fn classify_rpc(code: i32, name: &str, value: Option<u32>) -> Option<TelegramError> {
    if name == "FLOOD_WAIT" {
        return Some(TelegramError::FloodWait(value.unwrap_or(0)));
    }
    if code == 401 || REVOKED_SESSION_ERRORS.contains(&name) {
        return Some(TelegramError::InvalidSession);
    }
    None
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["flood_wait_", "flood wait "];
    // ASCII lowering keeps byte offsets aligned with the searched string.
    let lowered = err_msg.to_ascii_lowercase();

    for pattern in patterns {
        if let Some(idx) = lowered.find(pattern) {
            let start = idx + pattern.len();
            let num_str: String = lowered[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// A Telegram account session used to open the game's mini-app.
pub struct TelegramBot {
    /// Session name, used in logs.
    name: String,

    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram using the given session file.
    pub async fn connect(
        config: &TelegramConfig,
        name: &str,
        session_path: &Path,
    ) -> Result<Self, TelegramError> {
        debug!("Connecting session {} to Telegram...", name);

        let session = Arc::new(
            SqliteSession::open(session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            name: name.to_owned(),
            client,
            handle: handle.thin,
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Fails with [`TelegramError::InvalidSession`] unless the session is signed in.
    pub async fn ensure_authorized(&self) -> Result<(), TelegramError> {
        if self.is_authorized().await? {
            Ok(())
        } else {
            Err(TelegramError::InvalidSession)
        }
    }

    /// Requests a login code to be sent to the phone number.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Session {} signed in", self.name);
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!("2FA password required, hint: {:?}", password_token.hint());
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Session {} signed in with 2FA", self.name);
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Opens the bot's mini-app and returns the web view URL.
    ///
    /// Flood waits are honored for as long as Telegram keeps issuing them.
    pub async fn request_app_url(
        &self,
        bot_username: &str,
        app_short_name: &str,
        start_param: &str,
    ) -> Result<String, TelegramError> {
        let (input_peer, input_user) = self.resolve_bot(bot_username).await?;

        let request = tl::functions::messages::RequestAppWebView {
            write_allowed: true,
            compact: false,
            fullscreen: false,
            peer: input_peer,
            app: tl::enums::InputBotApp::ShortName(tl::types::InputBotAppShortName {
                bot_id: input_user,
                short_name: app_short_name.to_owned(),
            }),
            start_param: Some(start_param.to_owned()),
            theme_params: None,
            platform: "android".to_owned(),
        };

        let tl::enums::WebViewResult::Url(web_view) = self.invoke_with_flood_retry(&request).await?;
        debug!("Session {} received web view URL", self.name);
        Ok(web_view.url)
    }

    /// Resolves a bot username into the input peer and user needed by web view calls.
    async fn resolve_bot(
        &self,
        bot_username: &str,
    ) -> Result<(tl::enums::InputPeer, tl::enums::InputUser), TelegramError> {
        let request = tl::functions::contacts::ResolveUsername {
            username: bot_username.to_owned(),
            referer: None,
        };

        let tl::enums::contacts::ResolvedPeer::Peer(resolved) =
            self.invoke_with_flood_retry(&request).await?;

        let tl::enums::Peer::User(peer) = resolved.peer else {
            return Err(TelegramError::BotNotFound(bot_username.to_owned()));
        };

        let access_hash = resolved
            .users
            .into_iter()
            .find_map(|user| match user {
                tl::enums::User::User(user) if user.id == peer.user_id => user.access_hash,
                _ => None,
            })
            .ok_or_else(|| TelegramError::BotNotFound(bot_username.to_owned()))?;

        Ok((
            tl::enums::InputPeer::User(tl::types::InputPeerUser {
                user_id: peer.user_id,
                access_hash,
            }),
            tl::enums::InputUser::User(tl::types::InputUser {
                user_id: peer.user_id,
                access_hash,
            }),
        ))
    }

    /// Invokes a raw request, sleeping through flood waits and retrying.
    async fn invoke_with_flood_retry<R: tl::RemoteCall>(
        &self,
        request: &R,
    ) -> Result<R::Return, TelegramError> {
        loop {
            match self.client.invoke(request).await {
                Ok(response) => return Ok(response),
                Err(e) => match TelegramError::from(e) {
                    TelegramError::FloodWait(seconds) => {
                        let wait = u64::from(seconds) + FLOOD_WAIT_MARGIN_SECS;
                        warn!("FloodWait {}s", seconds);
                        info!("Sleep {}s", wait);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                    }
                    other => return Err(other),
                },
            }
        }
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        debug!("Disconnecting session {} from Telegram...", self.name);
        self.handle.quit();
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}
