use crate::{
    CardEvent, CardId, CoreError, DeckCardEvents, DeckId, EventId, LearningSession, SessionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

/// Append-only log of review events.
#[async_trait]
pub trait CardEventStore: Send + Sync {
    /// Latest event per card, at most one per distinct id in `card_ids`.
    async fn latest_events(
        &self,
        user_id: &str,
        card_ids: &[CardId],
    ) -> Result<Vec<CardEvent>, CoreError>;

    /// `CoreError::NotFound` when the user never reviewed the card.
    async fn latest_event(&self, user_id: &str, card_id: &str) -> Result<CardEvent, CoreError>;

    async fn create_card_event(&self, event: &CardEvent) -> Result<EventId, CoreError>;

    /// Every event of the pair, oldest first.
    async fn card_history(&self, user_id: &str, card_id: &str)
        -> Result<Vec<CardEvent>, CoreError>;

    /// Latest event per card of each deck in `deck_ids`. Decks without any
    /// event are absent from the result.
    async fn latest_events_by_decks(
        &self,
        user_id: &str,
        deck_ids: &[DeckId],
    ) -> Result<Vec<DeckCardEvents>, CoreError>;
}

#[async_trait]
pub trait LearningSessionStore: Send + Sync {
    async fn create_session(&self, session: &LearningSession) -> Result<SessionId, CoreError>;

    /// Marks the session finished. Only a session owned by `user_id` matches.
    async fn update_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    /// Earliest session of (user, deck) started inside `[start, end)`.
    async fn session_by_day(
        &self,
        user_id: &str,
        deck_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LearningSession, CoreError>;

    async fn get_session(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<LearningSession, CoreError>;
}
