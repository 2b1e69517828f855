//! Raw update flattening.
//!
//! The sender pool surfaces TL update containers as they arrive. This
//! module digs the events the bot cares about out of them: incoming
//! private messages (text and/or photo) and inline-button callback
//! queries, plus the user access hashes needed to address replies.

use grammers_tl_types as tl;
use tracing::debug;

use super::media::PhotoRef;

/// An incoming private message, reduced to what the bot cares about.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Sender's user id.
    pub user_id: i64,

    /// Message text, if non-empty.
    pub text: Option<String>,

    /// Photo attachment, if any.
    pub photo: Option<PhotoRef>,
}

/// An inline-button tap.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    /// User who tapped the button.
    pub user_id: i64,

    /// Query id to acknowledge.
    pub query_id: i64,

    /// Callback data attached to the button.
    pub data: String,
}

/// One event extracted from an update container.
#[derive(Debug, Clone)]
pub enum BotEvent {
    Message(IncomingMessage),
    Callback(CallbackEvent),
}

/// A user id together with its access hash, learned from an update
/// container.
#[derive(Debug, Clone, Copy)]
pub struct PeerInfo {
    pub user_id: i64,
    pub access_hash: i64,
}

/// Flattens one TL update container into bot events and peer info.
#[must_use]
pub fn extract_events(updates: &tl::enums::Updates) -> (Vec<BotEvent>, Vec<PeerInfo>) {
    let mut events = Vec::new();
    let mut peers = Vec::new();

    match updates {
        tl::enums::Updates::Updates(container) => {
            collect_peers(&container.users, &mut peers);
            for update in &container.updates {
                collect_event(update, &mut events);
            }
        }
        tl::enums::Updates::Combined(container) => {
            collect_peers(&container.users, &mut peers);
            for update in &container.updates {
                collect_event(update, &mut events);
            }
        }
        other => {
            debug!("Ignoring update container: {:?}", update_kind(other));
        }
    }

    (events, peers)
}

/// Extracts one event from a single update, if it is one we handle.
fn collect_event(update: &tl::enums::Update, events: &mut Vec<BotEvent>) {
    match update {
        tl::enums::Update::NewMessage(new_message) => {
            if let tl::enums::Message::Message(message) = &new_message.message
                && let Some(incoming) = flatten_message(message)
            {
                events.push(BotEvent::Message(incoming));
            }
        }
        tl::enums::Update::BotCallbackQuery(query) => {
            let Some(data) = &query.data else {
                return;
            };
            events.push(BotEvent::Callback(CallbackEvent {
                user_id: query.user_id,
                query_id: query.query_id,
                data: String::from_utf8_lossy(data).into_owned(),
            }));
        }
        _ => {}
    }
}

/// Reduces a full TL message to sender + text + photo.
///
/// Only private messages (peer is a user) are of interest; everything
/// the bot does is one-on-one.
fn flatten_message(message: &tl::types::Message) -> Option<IncomingMessage> {
    if message.out {
        return None;
    }

    let tl::enums::Peer::User(peer) = &message.peer_id else {
        return None;
    };

    let text = (!message.message.is_empty()).then(|| message.message.clone());
    let photo = message.media.as_ref().and_then(extract_photo);

    Some(IncomingMessage {
        user_id: peer.user_id,
        text,
        photo,
    })
}

/// Pulls a usable photo reference out of message media, if present.
fn extract_photo(media: &tl::enums::MessageMedia) -> Option<PhotoRef> {
    let tl::enums::MessageMedia::Photo(media_photo) = media else {
        return None;
    };
    let tl::enums::Photo::Photo(photo) = media_photo.photo.as_ref()? else {
        return None;
    };
    Some(PhotoRef::from_photo(photo))
}

/// Collects user access hashes from an update container's user list.
fn collect_peers(users: &[tl::enums::User], peers: &mut Vec<PeerInfo>) {
    for user in users {
        if let tl::enums::User::User(user) = user
            && let Some(access_hash) = user.access_hash
        {
            peers.push(PeerInfo {
                user_id: user.id,
                access_hash,
            });
        }
    }
}

/// Short label for unhandled container kinds, for debug logging.
const fn update_kind(updates: &tl::enums::Updates) -> &'static str {
    match updates {
        tl::enums::Updates::TooLong => "too-long",
        tl::enums::Updates::Updates(_) => "updates",
        tl::enums::Updates::Combined(_) => "combined",
        _ => "short",
    }
}
