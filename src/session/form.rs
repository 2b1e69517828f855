//! Posting form state machine.
//!
//! A linear five-step form: price → district → photo → city → address.
//! Each step either accepts its input and advances, or rejects it and
//! stays put. The transition function is pure over `(form, input)` and
//! knows nothing about the chat transport.

use crate::storage::ListingDraft;

/// Prompt sent when the posting flow starts.
pub const PRICE_PROMPT: &str = "💰 Введите цену:";

const DISTRICT_PROMPT: &str = "📍 Введите район:";
const PHOTO_PROMPT: &str = "📷 Отправьте фото квартиры:";
const CITY_PROMPT: &str = "📍 Введите город:";
const ADDRESS_PROMPT: &str = "🏠 Введите адрес квартиры:";

const PRICE_INVALID: &str = "❌ Цена должна быть числом. Попробуйте еще раз.";
const DISTRICT_INVALID: &str = "❌ Район не может быть пустым. Попробуйте еще раз.";
const PHOTO_INVALID: &str = "❌ Пожалуйста, отправьте фото.";
const CITY_INVALID: &str = "❌ Город не может быть пустым. Попробуйте еще раз.";
const ADDRESS_INVALID: &str = "❌ Адрес не может быть пустым. Попробуйте еще раз.";

/// The field the form is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingStep {
    Price,
    District,
    Photo,
    City,
    Address,
}

/// One incoming message, reduced to what the form cares about.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormInput<'a> {
    /// Message text, if any.
    pub text: Option<&'a str>,

    /// Opaque photo reference, if the message carried a photo.
    pub photo: Option<&'a str>,
}

/// Result of feeding one input into the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    /// Input accepted; prompt for the next field.
    Next(&'static str),

    /// Input rejected; re-prompt and stay in the same step.
    Reprompt(&'static str),

    /// All five fields collected. The draft still lacks `user_id`;
    /// the caller attaches it and submits to the store.
    Ready(ListingDraft),
}

/// In-progress posting form for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingForm {
    step: PostingStep,
    price: Option<String>,
    district: Option<String>,
    photo: Option<String>,
    city: Option<String>,
}

impl Default for PostingForm {
    fn default() -> Self {
        Self::new()
    }
}

impl PostingForm {
    /// Creates a form waiting for the price.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            step: PostingStep::Price,
            price: None,
            district: None,
            photo: None,
            city: None,
        }
    }

    /// Returns the step the form is currently waiting on.
    #[must_use]
    pub const fn step(&self) -> PostingStep {
        self.step
    }

    /// Feeds one message into the form and advances it if the input
    /// is valid for the current step.
    pub fn apply(&mut self, input: FormInput<'_>) -> FormOutcome {
        match self.step {
            PostingStep::Price => match input.text.filter(|t| is_numeric(t)) {
                Some(price) => {
                    self.price = Some(price.to_owned());
                    self.step = PostingStep::District;
                    FormOutcome::Next(DISTRICT_PROMPT)
                }
                None => FormOutcome::Reprompt(PRICE_INVALID),
            },
            PostingStep::District => match non_empty(input.text) {
                Some(district) => {
                    self.district = Some(district.to_owned());
                    self.step = PostingStep::Photo;
                    FormOutcome::Next(PHOTO_PROMPT)
                }
                None => FormOutcome::Reprompt(DISTRICT_INVALID),
            },
            PostingStep::Photo => match input.photo {
                Some(photo) => {
                    self.photo = Some(photo.to_owned());
                    self.step = PostingStep::City;
                    FormOutcome::Next(CITY_PROMPT)
                }
                None => FormOutcome::Reprompt(PHOTO_INVALID),
            },
            PostingStep::City => match non_empty(input.text) {
                Some(city) => {
                    self.city = Some(city.to_owned());
                    self.step = PostingStep::Address;
                    FormOutcome::Next(ADDRESS_PROMPT)
                }
                None => FormOutcome::Reprompt(CITY_INVALID),
            },
            PostingStep::Address => match non_empty(input.text) {
                Some(address) => FormOutcome::Ready(ListingDraft {
                    price: self.price.clone(),
                    district: self.district.clone(),
                    photo: self.photo.clone(),
                    city: self.city.clone(),
                    address: Some(address.to_owned()),
                    user_id: None,
                }),
                None => FormOutcome::Reprompt(ADDRESS_INVALID),
            },
        }
    }
}

/// Digits-only check, matching how the original flow validated prices.
fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}
