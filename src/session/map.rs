//! Per-user conversation state.
//!
//! Session state is an explicit map keyed by user id, mutated only by
//! the handler processing that user's turn. There is no expiry: an
//! abandoned mid-form session stays pending until the user acts again
//! or the process restarts.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::form::PostingForm;

/// What the bot is currently waiting for from one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Mid-way through the posting form.
    Posting(PostingForm),

    /// Waiting for a city name to search listings (single-shot).
    AwaitingSearchCity,
}

/// Conversation state for all users, keyed by user id.
#[derive(Debug, Default)]
pub struct SessionMap {
    inner: RwLock<HashMap<i64, SessionState>>,
}

impl SessionMap {
    /// Creates an empty session map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the posting form for the user, replacing any previous
    /// state.
    pub async fn begin_posting(&self, user_id: i64) {
        let mut inner = self.inner.write().await;
        inner.insert(user_id, SessionState::Posting(PostingForm::new()));
    }

    /// Puts the user into the search-city state, replacing any
    /// previous state.
    pub async fn begin_search(&self, user_id: i64) {
        let mut inner = self.inner.write().await;
        inner.insert(user_id, SessionState::AwaitingSearchCity);
    }

    /// Removes and returns the user's current state, if any.
    pub async fn take(&self, user_id: i64) -> Option<SessionState> {
        let mut inner = self.inner.write().await;
        inner.remove(&user_id)
    }

    /// Stores the given state for the user.
    pub async fn put(&self, user_id: i64, state: SessionState) {
        let mut inner = self.inner.write().await;
        inner.insert(user_id, state);
    }

    /// Drops the user's state, if any.
    pub async fn clear(&self, user_id: i64) {
        let mut inner = self.inner.write().await;
        inner.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_begin_posting_starts_at_price() {
        let sessions = SessionMap::new();
        sessions.begin_posting(1).await;

        match sessions.take(1).await {
            Some(SessionState::Posting(form)) => {
                assert_eq!(form.step(), crate::session::PostingStep::Price);
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_take_removes_state() {
        let sessions = SessionMap::new();
        sessions.begin_search(1).await;

        assert_eq!(sessions.take(1).await, Some(SessionState::AwaitingSearchCity));
        assert_eq!(sessions.take(1).await, None);
    }

    #[tokio::test]
    async fn test_states_are_per_user() {
        let sessions = SessionMap::new();
        sessions.begin_posting(1).await;
        sessions.begin_search(2).await;

        assert!(matches!(
            sessions.take(1).await,
            Some(SessionState::Posting(_))
        ));
        assert_eq!(sessions.take(2).await, Some(SessionState::AwaitingSearchCity));
    }

    #[tokio::test]
    async fn test_begin_replaces_previous_state() {
        let sessions = SessionMap::new();
        sessions.begin_posting(1).await;
        sessions.begin_search(1).await;

        assert_eq!(sessions.take(1).await, Some(SessionState::AwaitingSearchCity));
    }
}
