//! Update dispatcher.
//!
//! Routes the `/start` command, button taps and plain messages to the
//! store and the per-user session state. All chat I/O goes through the
//! narrow [`Conversation`] interface, so the dispatcher is testable
//! without any Telegram plumbing.

use std::sync::Arc;

use tracing::{debug, warn};

use super::types::{Button, CallbackAction, Conversation, Keyboard};
use crate::session::{FormInput, FormOutcome, PostingForm, SessionMap, SessionState, PRICE_PROMPT};
use crate::storage::{Listing, ListingStore};

const GREETING: &str = "🏠 Добро пожаловать в бота для аренды жилья!\n\nВыберите действие:";
const RENT_OUT_MENU: &str = "🏠 Вы выбрали «Сдать квартиру».\n\nВыберите следующее действие:";
const SEARCH_PROMPT: &str = "🔍 Введите город для поиска:";
const ADDED_OK: &str = "✅ Объявление успешно добавлено!";
const DELETED_OK: &str = "✅ Объявление удалено.";
const NO_LISTINGS_IN_CITY: &str = "❌ Нет объявлений в этом городе.";
const NO_OWN_LISTINGS: &str = "❌ У вас нет объявлений.";
const DELETE_LABEL: &str = "🗑️ Удалить";

/// Main menu shown on `/start`.
fn main_keyboard() -> Keyboard {
    Keyboard::single_row(vec![
        Button::new("🏠 Сдать квартиру", &CallbackAction::RentOut),
        Button::new("🔍 Снять квартиру", &CallbackAction::Rent),
    ])
}

/// Owner menu shown after «Сдать квартиру».
fn owner_keyboard() -> Keyboard {
    Keyboard::single_row(vec![
        Button::new("➕ Добавить объявление", &CallbackAction::AddAd),
        Button::new("📋 Мои объявления", &CallbackAction::MyAdvertisements),
    ])
}

/// Caption shown under a listing photo.
fn format_caption(listing: &Listing, own: bool) -> String {
    let title = if own {
        "🏠 Ваше объявление:"
    } else {
        "🏠 Объявление:"
    };
    format!(
        "{title}\n\n\
         💰 Цена: {}\n\
         📍 Район: {}\n\
         🌆 Город: {}\n\
         🏡 Адрес: {}",
        listing.price, listing.district, listing.city, listing.address
    )
}

/// Routes incoming updates to the store and session state.
pub struct Router {
    /// Listing persistence.
    store: Arc<ListingStore>,

    /// Per-user conversation state.
    sessions: SessionMap,
}

impl Router {
    /// Creates a router over the given store.
    #[must_use]
    pub fn new(store: Arc<ListingStore>) -> Self {
        Self {
            store,
            sessions: SessionMap::new(),
        }
    }

    /// Handles the `/start` command.
    pub async fn handle_start(&self, convo: &dyn Conversation) -> anyhow::Result<()> {
        convo.send_text(GREETING, Some(main_keyboard())).await
    }

    /// Handles a button tap.
    pub async fn handle_callback(
        &self,
        convo: &dyn Conversation,
        action: &CallbackAction,
    ) -> anyhow::Result<()> {
        debug!("Callback {} from user {}", action, convo.user_id());

        match action {
            CallbackAction::RentOut => {
                convo.send_text(RENT_OUT_MENU, Some(owner_keyboard())).await
            }
            CallbackAction::AddAd => {
                self.sessions.begin_posting(convo.user_id()).await;
                convo.send_text(PRICE_PROMPT, None).await
            }
            CallbackAction::Rent => {
                self.sessions.begin_search(convo.user_id()).await;
                convo.send_text(SEARCH_PROMPT, None).await
            }
            CallbackAction::MyAdvertisements => self.list_own(convo).await,
            CallbackAction::Delete(id) => {
                self.store.delete(id).await?;
                convo.send_text(DELETED_OK, None).await
            }
        }
    }

    /// Handles a plain message according to the user's session state.
    ///
    /// Messages from users with no active session are ignored.
    pub async fn handle_message(&self, convo: &dyn Conversation) -> anyhow::Result<()> {
        let user_id = convo.user_id();

        match self.sessions.take(user_id).await {
            None => {
                debug!("Message from user {} outside any flow, ignoring", user_id);
                Ok(())
            }
            Some(SessionState::Posting(form)) => self.advance_form(convo, form).await,
            Some(SessionState::AwaitingSearchCity) => self.search_city(convo).await,
        }
    }

    /// Feeds one message into the user's posting form.
    ///
    /// The caller has already removed the state from the map; it is put
    /// back unless the form reached its terminal step, so the state is
    /// always cleared after the submit attempt, success or failure.
    async fn advance_form(
        &self,
        convo: &dyn Conversation,
        mut form: PostingForm,
    ) -> anyhow::Result<()> {
        let input = FormInput {
            text: convo.text(),
            photo: convo.photo_ref(),
        };

        match form.apply(input) {
            FormOutcome::Next(prompt) | FormOutcome::Reprompt(prompt) => {
                self.sessions
                    .put(convo.user_id(), SessionState::Posting(form))
                    .await;
                convo.send_text(prompt, None).await
            }
            FormOutcome::Ready(mut draft) => {
                draft.user_id = Some(convo.user_id());
                match self.store.add(draft).await {
                    Ok(listing) => {
                        debug!("User {} posted listing {}", convo.user_id(), listing.id);
                        convo.send_text(ADDED_OK, None).await
                    }
                    Err(e) => {
                        warn!("Failed to add listing for user {}: {}", convo.user_id(), e);
                        convo.send_text(&format!("❌ Ошибка: {e}"), None).await
                    }
                }
            }
        }
    }

    /// Runs the single-shot city search.
    async fn search_city(&self, convo: &dyn Conversation) -> anyhow::Result<()> {
        let city = convo.text().unwrap_or_default();
        let listings = self.store.by_city(city).await?;

        if listings.is_empty() {
            return convo.send_text(NO_LISTINGS_IN_CITY, None).await;
        }

        for listing in &listings {
            convo
                .send_photo(&listing.photo, &format_caption(listing, false), None)
                .await?;
        }
        Ok(())
    }

    /// Lists the caller's own listings with a delete button per item.
    async fn list_own(&self, convo: &dyn Conversation) -> anyhow::Result<()> {
        let listings = self.store.by_user(convo.user_id()).await?;

        if listings.is_empty() {
            return convo.send_text(NO_OWN_LISTINGS, None).await;
        }

        for listing in &listings {
            let keyboard = Keyboard::single_row(vec![Button::new(
                DELETE_LABEL,
                &CallbackAction::Delete(listing.id.clone()),
            )]);
            convo
                .send_photo(&listing.photo, &format_caption(listing, true), Some(keyboard))
                .await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text {
            text: String,
            keyboard: Option<Keyboard>,
        },
        Photo {
            photo: String,
            caption: String,
            keyboard: Option<Keyboard>,
        },
    }

    /// In-memory [`Conversation`] that records every reply.
    struct MockConvo {
        user_id: i64,
        text: Option<String>,
        photo: Option<String>,
        sent: Mutex<Vec<Sent>>,
    }

    impl MockConvo {
        fn text_message(user_id: i64, text: &str) -> Self {
            Self {
                user_id,
                text: Some(text.to_owned()),
                photo: None,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn photo_message(user_id: i64, photo: &str) -> Self {
            Self {
                user_id,
                text: None,
                photo: Some(photo.to_owned()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn tap(user_id: i64) -> Self {
            Self {
                user_id,
                text: None,
                photo: None,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Conversation for MockConvo {
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
            self.sent.lock().unwrap().push(Sent::Text {
                text: text.to_owned(),
                keyboard,
            });
            Ok(())
        }

        async fn send_photo(
            &self,
            photo: &str,
            caption: &str,
            keyboard: Option<Keyboard>,
        ) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(Sent::Photo {
                photo: photo.to_owned(),
                caption: caption.to_owned(),
                keyboard,
            });
            Ok(())
        }
    }

    fn router() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ListingStore::new(dir.path().join("data.json"), 10));
        (Router::new(store), dir)
    }

    /// Drives the full posting flow for the given user.
    async fn post_listing(router: &Router, user_id: i64, city: &str) {
        let tap = MockConvo::tap(user_id);
        router
            .handle_callback(&tap, &CallbackAction::AddAd)
            .await
            .unwrap();

        for step in [
            MockConvo::text_message(user_id, "1000"),
            MockConvo::text_message(user_id, "Центр"),
            MockConvo::photo_message(user_id, "photo-ref-1"),
            MockConvo::text_message(user_id, city),
            MockConvo::text_message(user_id, "ул. 1"),
        ] {
            router.handle_message(&step).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_start_shows_main_menu() {
        let (router, _dir) = router();
        let convo = MockConvo::text_message(1, "/start");

        router.handle_start(&convo).await.unwrap();

        let sent = convo.sent();
        assert_eq!(sent.len(), 1);
        let Sent::Text { text, keyboard } = &sent[0] else {
            panic!("expected text");
        };
        assert!(text.contains("Добро пожаловать"));
        let keyboard = keyboard.as_ref().unwrap();
        assert_eq!(keyboard.rows[0].len(), 2);
        assert_eq!(keyboard.rows[0][0].data, "rent_out");
        assert_eq!(keyboard.rows[0][1].data, "rent");
    }

    #[tokio::test]
    async fn test_rent_out_shows_owner_menu() {
        let (router, _dir) = router();
        let convo = MockConvo::tap(5);

        router
            .handle_callback(&convo, &CallbackAction::RentOut)
            .await
            .unwrap();

        let sent = convo.sent();
        let Sent::Text { keyboard, .. } = &sent[0] else {
            panic!("expected text");
        };
        let keyboard = keyboard.as_ref().unwrap();
        assert_eq!(keyboard.rows[0][0].data, "add_ad");
        assert_eq!(keyboard.rows[0][1].data, "my_advertisements");
    }

    #[tokio::test]
    async fn test_full_posting_flow_persists_listing() {
        let (router, _dir) = router();

        post_listing(&router, 42, "Москва").await;

        let mine = router.store.by_user(42).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].price, "1000");
        assert_eq!(mine[0].photo, "photo-ref-1");
        assert_eq!(mine[0].user_id, 42);
        assert!(!mine[0].id.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_price_reprompts_and_stays() {
        let (router, _dir) = router();
        let tap = MockConvo::tap(1);
        router
            .handle_callback(&tap, &CallbackAction::AddAd)
            .await
            .unwrap();

        let bad = MockConvo::text_message(1, "abc");
        router.handle_message(&bad).await.unwrap();
        let Sent::Text { text, .. } = &bad.sent()[0] else {
            panic!("expected text");
        };
        assert!(text.contains("числом"));

        // Still at the price step: a valid price advances to the district.
        let good = MockConvo::text_message(1, "1000");
        router.handle_message(&good).await.unwrap();
        let Sent::Text { text, .. } = &good.sent()[0] else {
            panic!("expected text");
        };
        assert!(text.contains("район"));
    }

    #[tokio::test]
    async fn test_message_outside_any_flow_is_ignored() {
        let (router, _dir) = router();
        let convo = MockConvo::text_message(9, "привет");

        router.handle_message(&convo).await.unwrap();

        assert!(convo.sent().is_empty());
    }

    #[tokio::test]
    async fn test_search_finds_listing_case_insensitively() {
        let (router, _dir) = router();
        post_listing(&router, 1, "москва").await;

        let tap = MockConvo::tap(2);
        router
            .handle_callback(&tap, &CallbackAction::Rent)
            .await
            .unwrap();

        let query = MockConvo::text_message(2, "Москва");
        router.handle_message(&query).await.unwrap();

        let sent = query.sent();
        assert_eq!(sent.len(), 1);
        let Sent::Photo { photo, caption, keyboard } = &sent[0] else {
            panic!("expected photo");
        };
        assert_eq!(photo, "photo-ref-1");
        assert!(caption.contains("Цена: 1000"));
        assert!(caption.contains("Адрес: ул. 1"));
        assert!(keyboard.is_none());
    }

    #[tokio::test]
    async fn test_search_with_no_matches_reports_and_clears() {
        let (router, _dir) = router();
        let tap = MockConvo::tap(2);
        router
            .handle_callback(&tap, &CallbackAction::Rent)
            .await
            .unwrap();

        let query = MockConvo::text_message(2, "Тверь");
        router.handle_message(&query).await.unwrap();
        let Sent::Text { text, .. } = &query.sent()[0] else {
            panic!("expected text");
        };
        assert!(text.contains("Нет объявлений"));

        // Single-shot: the next message is outside any flow.
        let followup = MockConvo::text_message(2, "Москва");
        router.handle_message(&followup).await.unwrap();
        assert!(followup.sent().is_empty());
    }

    #[tokio::test]
    async fn test_my_advertisements_attaches_delete_button() {
        let (router, _dir) = router();
        post_listing(&router, 7, "Москва").await;
        let id = router.store.by_user(7).await.unwrap()[0].id.clone();

        let convo = MockConvo::tap(7);
        router
            .handle_callback(&convo, &CallbackAction::MyAdvertisements)
            .await
            .unwrap();

        let sent = convo.sent();
        assert_eq!(sent.len(), 1);
        let Sent::Photo { caption, keyboard, .. } = &sent[0] else {
            panic!("expected photo");
        };
        assert!(caption.contains("Ваше объявление"));
        let keyboard = keyboard.as_ref().unwrap();
        assert_eq!(keyboard.rows[0][0].data, format!("delete_{id}"));
    }

    #[tokio::test]
    async fn test_my_advertisements_empty() {
        let (router, _dir) = router();
        let convo = MockConvo::tap(7);

        router
            .handle_callback(&convo, &CallbackAction::MyAdvertisements)
            .await
            .unwrap();

        assert_eq!(
            convo.sent(),
            vec![Sent::Text {
                text: NO_OWN_LISTINGS.to_owned(),
                keyboard: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_callback_removes_listing() {
        let (router, _dir) = router();
        post_listing(&router, 7, "Москва").await;
        let id = router.store.by_user(7).await.unwrap()[0].id.clone();

        let convo = MockConvo::tap(7);
        router
            .handle_callback(&convo, &CallbackAction::Delete(id))
            .await
            .unwrap();

        assert!(router.store.by_user(7).await.unwrap().is_empty());
        let Sent::Text { text, .. } = &convo.sent()[0] else {
            panic!("expected text");
        };
        assert!(text.contains("удалено"));
    }
}
