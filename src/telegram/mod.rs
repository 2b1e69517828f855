//! Telegram transport module.
//!
//! Wraps the MTProto client behind a small bot-shaped surface:
//! connecting, bot-token sign-in, sending messages and photos with
//! inline keyboards, and flattening raw update containers into the
//! events the dispatcher consumes.

mod client;
mod media;
mod updates;

pub use client::{RawUpdatesReceiver, RentalBot, TelegramConversation, TelegramError};
pub use grammers_tl_types::enums::Updates as RawUpdates;
pub use media::{ParsePhotoRefError, PhotoRef};
pub use updates::{extract_events, BotEvent, CallbackEvent, IncomingMessage, PeerInfo};
