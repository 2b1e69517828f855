//! Chat surface types: button actions, keyboards and the transport seam.

use std::fmt;

use async_trait::async_trait;

/// Inline-button actions the bot understands.
///
/// The string identifiers are the wire-level callback data attached to
/// the buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// «Сдать квартиру» — show the owner menu.
    RentOut,

    /// «Добавить объявление» — start the posting form.
    AddAd,

    /// «Снять квартиру» — start a city search.
    Rent,

    /// «Мои объявления» — list the caller's own listings.
    MyAdvertisements,

    /// «Удалить» on one of the caller's listings.
    Delete(String),
}

impl CallbackAction {
    /// Parses callback data from a button tap.
    ///
    /// Returns `None` for unknown identifiers.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix("delete_") {
            return (!id.is_empty()).then(|| Self::Delete(id.to_owned()));
        }

        match data {
            "rent_out" => Some(Self::RentOut),
            "add_ad" => Some(Self::AddAd),
            "rent" => Some(Self::Rent),
            "my_advertisements" => Some(Self::MyAdvertisements),
            _ => None,
        }
    }

    /// Returns the wire-level callback data for this action.
    #[must_use]
    pub fn data(&self) -> String {
        match self {
            Self::RentOut => "rent_out".to_owned(),
            Self::AddAd => "add_ad".to_owned(),
            Self::Rent => "rent".to_owned(),
            Self::MyAdvertisements => "my_advertisements".to_owned(),
            Self::Delete(id) => format!("delete_{id}"),
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data())
    }
}

/// One inline button: a visible label plus the callback data it sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    /// Creates a button firing the given action.
    #[must_use]
    pub fn new(label: impl Into<String>, action: &CallbackAction) -> Self {
        Self {
            label: label.into(),
            data: action.data(),
        }
    }
}

/// Transport-neutral inline keyboard: rows of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Creates a keyboard with a single row.
    #[must_use]
    pub fn single_row(buttons: Vec<Button>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }
}

/// Narrow capability interface over one incoming chat message.
///
/// The dispatcher sees only this: who wrote, what they wrote, and a way
/// to reply. The real implementation adapts the Telegram client; tests
/// use an in-memory mock.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Stable per-conversation user identifier.
    fn user_id(&self) -> i64;

    /// Message text, if any.
    fn text(&self) -> Option<&str>;

    /// Opaque photo reference, if the message carried a photo.
    fn photo_ref(&self) -> Option<&str>;

    /// Sends a text message back, optionally with an inline keyboard.
    async fn send_text(&self, text: &str, keyboard: Option<Keyboard>) -> anyhow::Result<()>;

    /// Sends a photo with a caption, optionally with an inline keyboard.
    async fn send_photo(
        &self,
        photo: &str,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> anyhow::Result<()>;
}
