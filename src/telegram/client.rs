//! Telegram client wrapper for the rental bot.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use grammers_client::{sender, Client, InvocationError, SenderPool};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::media::PhotoRef;
use super::updates::{IncomingMessage, PeerInfo};
use crate::commands::{Conversation, Keyboard};
use crate::config::TelegramConfig;

/// Receiver for raw TL update containers surfaced by the sender pool.
pub type RawUpdatesReceiver = tokio::sync::mpsc::UnboundedReceiver<tl::enums::Updates>;

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Bot sign in failed: {0}")]
    SignInFailed(String),

    #[error("No access hash known for user {0}")]
    UnknownPeer(i64),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str)
        {
            return Self::FloodWait(seconds);
        }

        Self::Invocation(err_str)
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        if let Some(idx) = err_msg.to_lowercase().find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = err_msg[start..]
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

/// High-level Telegram client wrapper.
pub struct RentalBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Access hashes by user id, learned from update containers.
    peers: RwLock<HashMap<i64, i64>>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl RentalBot {
    /// Connects to Telegram with the given configuration.
    ///
    /// Returns the bot together with the raw updates receiver the
    /// dispatch loop consumes.
    ///
    /// # Errors
    ///
    /// Returns an error if connection fails.
    pub async fn connect(
        config: &TelegramConfig,
    ) -> Result<(Self, RawUpdatesReceiver), TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok((
            Self {
                client,
                handle: handle.thin,
                peers: RwLock::new(HashMap::new()),
                _pool_task: pool_task,
            },
            updates,
        ))
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Signs in as a bot using the configured token.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in_bot(&self, config: &TelegramConfig) -> Result<(), TelegramError> {
        info!("Signing in with bot token...");

        let request = tl::functions::auth::ImportBotAuthorization {
            flags: 0,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            bot_auth_token: config.bot_token.clone(),
        };

        self.client
            .invoke(&request)
            .await
            .map(|_authorization| {
                info!("Successfully signed in as bot");
            })
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Records access hashes learned from an update container.
    pub async fn note_peers(&self, new_peers: &[PeerInfo]) {
        if new_peers.is_empty() {
            return;
        }
        let mut peers = self.peers.write().await;
        for peer in new_peers {
            peers.insert(peer.user_id, peer.access_hash);
        }
    }

    /// Sends a text message to a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user's access hash is unknown or the
    /// API call fails.
    pub async fn send_message(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TelegramError> {
        let peer = self.input_peer(user_id).await?;

        debug!("Sending message to {}: \"{}\"", user_id, truncate_for_log(text, 30));

        let request = tl::functions::messages::SendMessage {
            no_webpage: true,
            silent: false,
            background: false,
            clear_draft: false,
            noforwards: false,
            update_stickersets_order: false,
            invert_media: false,
            allow_paid_floodskip: false,
            peer,
            reply_to: None,
            message: text.to_owned(),
            random_id: next_random_id(),
            reply_markup: keyboard.map(to_reply_markup),
            entities: None,
            schedule_date: None,
            schedule_repeat_period: None,
            send_as: None,
            quick_reply_shortcut: None,
            effect: None,
            allow_paid_stars: None,
            suggested_post: None,
            rich_message: None,
        };

        self.invoke_send(&request).await
    }

    /// Sends a previously received photo back to a user with a caption.
    ///
    /// # Errors
    ///
    /// Returns an error if the user's access hash is unknown or the
    /// API call fails.
    pub async fn send_photo(
        &self,
        user_id: i64,
        photo: &PhotoRef,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TelegramError> {
        let peer = self.input_peer(user_id).await?;

        debug!("Sending photo {} to {}", photo.id, user_id);

        let request = tl::functions::messages::SendMedia {
            silent: false,
            background: false,
            clear_draft: false,
            noforwards: false,
            update_stickersets_order: false,
            invert_media: false,
            allow_paid_floodskip: false,
            peer,
            reply_to: None,
            media: photo.to_input_media(),
            message: caption.to_owned(),
            random_id: next_random_id(),
            reply_markup: keyboard.map(to_reply_markup),
            entities: None,
            schedule_date: None,
            schedule_repeat_period: None,
            send_as: None,
            quick_reply_shortcut: None,
            effect: None,
            allow_paid_stars: None,
            suggested_post: None,
        };

        match self.client.invoke(&request).await {
            Ok(_updates) => Ok(()),
            Err(e) => Err(self.log_send_error(e.into())),
        }
    }

    /// Acknowledges a callback query so the client stops its spinner.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn answer_callback(&self, query_id: i64) -> Result<(), TelegramError> {
        let request = tl::functions::messages::SetBotCallbackAnswer {
            alert: false,
            query_id,
            message: None,
            url: None,
            cache_time: 0,
        };

        self.client
            .invoke(&request)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }

    /// Builds an `InputPeer` for a user seen in an update container.
    async fn input_peer(&self, user_id: i64) -> Result<tl::enums::InputPeer, TelegramError> {
        let peers = self.peers.read().await;
        let access_hash = peers
            .get(&user_id)
            .copied()
            .ok_or(TelegramError::UnknownPeer(user_id))?;

        Ok(tl::enums::InputPeer::User(tl::types::InputPeerUser {
            user_id,
            access_hash,
        }))
    }

    async fn invoke_send(
        &self,
        request: &tl::functions::messages::SendMessage,
    ) -> Result<(), TelegramError> {
        match self.client.invoke(request).await {
            Ok(_updates) => Ok(()),
            Err(e) => Err(self.log_send_error(e.into())),
        }
    }

    fn log_send_error(&self, err: TelegramError) -> TelegramError {
        if let TelegramError::FloodWait(seconds) = &err {
            warn!("Flood wait from Telegram: {} seconds", seconds);
        }
        err
    }
}

impl std::fmt::Debug for RentalBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RentalBot").finish_non_exhaustive()
    }
}

/// Maps the transport-neutral keyboard onto TL inline-button rows.
fn to_reply_markup(keyboard: &Keyboard) -> tl::enums::ReplyMarkup {
    let rows = keyboard
        .rows
        .iter()
        .map(|row| {
            tl::enums::KeyboardButtonRow::Row(tl::types::KeyboardButtonRow {
                buttons: row
                    .iter()
                    .map(|button| {
                        tl::enums::KeyboardButton::Callback(tl::types::KeyboardButtonCallback {
                            requires_password: false,
                            style: None,
                            text: button.label.clone(),
                            data: button.data.clone().into_bytes(),
                        })
                    })
                    .collect(),
            })
        })
        .collect();

    tl::enums::ReplyMarkup::ReplyInlineMarkup(tl::types::ReplyInlineMarkup { rows })
}

/// Client-side random id required by send requests.
fn next_random_id() -> i64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    i64::try_from(nanos & u128::from(u64::MAX >> 1)).unwrap_or(i64::MAX)
}

/// Truncates a string for logging.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}

/// One incoming update bound to the bot, exposed to the dispatcher
/// through the narrow [`Conversation`] interface.
pub struct TelegramConversation {
    bot: Arc<RentalBot>,
    user_id: i64,
    text: Option<String>,
    photo: Option<String>,
}

impl TelegramConversation {
    /// Wraps an incoming private message.
    #[must_use]
    pub fn from_message(bot: Arc<RentalBot>, message: IncomingMessage) -> Self {
        Self {
            bot,
            user_id: message.user_id,
            text: message.text,
            photo: message.photo.map(|p| p.to_string()),
        }
    }

    /// Wraps a callback query (no text or photo payload).
    #[must_use]
    pub fn from_callback(bot: Arc<RentalBot>, user_id: i64) -> Self {
        Self {
            bot,
            user_id,
            text: None,
            photo: None,
        }
    }
}

#[async_trait]
impl Conversation for TelegramConversation {
    fn user_id(&self) -> i64 {
        self.user_id
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn photo_ref(&self) -> Option<&str> {
        self.photo.as_deref()
    }

    async fn send_text(&self, text: &str, keyboard: Option<Keyboard>) -> anyhow::Result<()> {
        self.bot
            .send_message(self.user_id, text, keyboard.as_ref())
            .await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        photo: &str,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> anyhow::Result<()> {
        let photo = PhotoRef::from_str(photo)?;
        self.bot
            .send_photo(self.user_id, &photo, caption, keyboard.as_ref())
            .await?;
        Ok(())
    }
}
