#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use spacey_core::store::memory::MemoryStore;
use spacey_core::{
    CardEvent, CardEventReq, CardEventStore, CardId, CoreError, DeckCardEvents, DeckId, EventId,
    LearningSession, LearningSessionStore, SessionId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;
use uuid::Uuid;

pub const USER: &str = "user-1";
pub const DECK: &str = "deck-1";

pub fn event(card_id: &str, half_life: f64, created_at: DateTime<Utc>) -> CardEvent {
    CardEvent {
        id: Uuid::new_v4(),
        user_id: USER.into(),
        deck_id: DECK.into(),
        card_id: card_id.into(),
        learning_session_id: Uuid::new_v4(),
        memory_half_life: half_life,
        number_practiced: 1,
        number_correct: 1,
        number_incorrect: 0,
        number_practiced_last_session: 1,
        number_correct_last_session: 1,
        number_incorrect_last_session: 0,
        created_at,
        started_at: created_at - Duration::seconds(5),
        finished_at: created_at,
    }
}

pub fn review(card_id: &str, session: SessionId, correct: bool) -> CardEventReq {
    let finished_at = Utc::now();
    CardEventReq {
        deck_id: DECK.into(),
        card_id: card_id.into(),
        learning_session_id: session,
        started_at: finished_at - Duration::seconds(3),
        finished_at,
        correct,
    }
}

/// Half-life that yields `p` after exactly one day.
pub fn half_life_for(p: f64) -> f64 {
    1.0 / (1.0 / p).log2()
}

/// Delegates to a memory store and counts event store calls.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CardEventStore for CountingStore {
    async fn latest_events(
        &self,
        user_id: &str,
        card_ids: &[CardId],
    ) -> Result<Vec<CardEvent>, CoreError> {
        self.hit();
        self.inner.latest_events(user_id, card_ids).await
    }
    async fn latest_event(&self, user_id: &str, card_id: &str) -> Result<CardEvent, CoreError> {
        self.hit();
        self.inner.latest_event(user_id, card_id).await
    }
    async fn create_card_event(&self, event: &CardEvent) -> Result<EventId, CoreError> {
        self.hit();
        self.inner.create_card_event(event).await
    }
    async fn card_history(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Vec<CardEvent>, CoreError> {
        self.hit();
        self.inner.card_history(user_id, card_id).await
    }
    async fn latest_events_by_decks(
        &self,
        user_id: &str,
        deck_ids: &[DeckId],
    ) -> Result<Vec<DeckCardEvents>, CoreError> {
        self.hit();
        self.inner.latest_events_by_decks(user_id, deck_ids).await
    }
}

/// Reads succeed through the memory store, writes fail. `lookup_error`
/// replaces the result of `latest_event` when set.
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub lookup_error: Option<CoreError>,
}

#[async_trait]
impl CardEventStore for FailingStore {
    async fn latest_events(&self, _: &str, _: &[CardId]) -> Result<Vec<CardEvent>, CoreError> {
        Err(CoreError::Storage("read events"))
    }
    async fn latest_event(&self, user_id: &str, card_id: &str) -> Result<CardEvent, CoreError> {
        match &self.lookup_error {
            Some(e) => Err(e.clone()),
            None => self.inner.latest_event(user_id, card_id).await,
        }
    }
    async fn create_card_event(&self, _: &CardEvent) -> Result<EventId, CoreError> {
        Err(CoreError::Storage("insert card event"))
    }
    async fn card_history(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Vec<CardEvent>, CoreError> {
        self.inner.card_history(user_id, card_id).await
    }
    async fn latest_events_by_decks(
        &self,
        _: &str,
        _: &[DeckId],
    ) -> Result<Vec<DeckCardEvents>, CoreError> {
        Err(CoreError::Storage("read events"))
    }
}

#[async_trait]
impl LearningSessionStore for FailingStore {
    async fn create_session(&self, _: &LearningSession) -> Result<SessionId, CoreError> {
        Err(CoreError::Storage("insert session"))
    }
    async fn update_session(
        &self,
        _: &str,
        _: SessionId,
        _: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        Err(CoreError::Storage("update session"))
    }
    async fn session_by_day(
        &self,
        user_id: &str,
        deck_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LearningSession, CoreError> {
        match &self.lookup_error {
            Some(e) => Err(e.clone()),
            None => self.inner.session_by_day(user_id, deck_id, start, end).await,
        }
    }
    async fn get_session(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<LearningSession, CoreError> {
        self.inner.get_session(user_id, session_id).await
    }
}

/// Every call sleeps before answering.
pub struct SlowStore {
    pub inner: MemoryStore,
    pub delay: std::time::Duration,
}

#[async_trait]
impl CardEventStore for SlowStore {
    async fn latest_events(
        &self,
        user_id: &str,
        card_ids: &[CardId],
    ) -> Result<Vec<CardEvent>, CoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.latest_events(user_id, card_ids).await
    }
    async fn latest_event(&self, user_id: &str, card_id: &str) -> Result<CardEvent, CoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.latest_event(user_id, card_id).await
    }
    async fn create_card_event(&self, event: &CardEvent) -> Result<EventId, CoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_card_event(event).await
    }
    async fn card_history(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Vec<CardEvent>, CoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.card_history(user_id, card_id).await
    }
    async fn latest_events_by_decks(
        &self,
        user_id: &str,
        deck_ids: &[DeckId],
    ) -> Result<Vec<DeckCardEvents>, CoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.latest_events_by_decks(user_id, deck_ids).await
    }
}

/// Holds every lookup (`latest_event`, `session_by_day`) at a barrier after
/// reading, so concurrent callers all observe the state before any write.
/// Without a barrier it yields instead, inviting interleaving.
pub struct GatedStore {
    pub inner: MemoryStore,
    pub gate: Option<Arc<Barrier>>,
}

impl GatedStore {
    pub fn gated(parties: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            gate: Some(Arc::new(Barrier::new(parties))),
        }
    }

    pub fn yielding() -> Self {
        Self {
            inner: MemoryStore::new(),
            gate: None,
        }
    }

    async fn pause(&self) {
        match &self.gate {
            Some(gate) => {
                gate.wait().await;
            }
            None => tokio::task::yield_now().await,
        }
    }
}

#[async_trait]
impl CardEventStore for GatedStore {
    async fn latest_events(
        &self,
        user_id: &str,
        card_ids: &[CardId],
    ) -> Result<Vec<CardEvent>, CoreError> {
        self.inner.latest_events(user_id, card_ids).await
    }
    async fn latest_event(&self, user_id: &str, card_id: &str) -> Result<CardEvent, CoreError> {
        let res = self.inner.latest_event(user_id, card_id).await;
        self.pause().await;
        res
    }
    async fn create_card_event(&self, event: &CardEvent) -> Result<EventId, CoreError> {
        tokio::task::yield_now().await;
        self.inner.create_card_event(event).await
    }
    async fn card_history(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Vec<CardEvent>, CoreError> {
        self.inner.card_history(user_id, card_id).await
    }
    async fn latest_events_by_decks(
        &self,
        user_id: &str,
        deck_ids: &[DeckId],
    ) -> Result<Vec<DeckCardEvents>, CoreError> {
        self.inner.latest_events_by_decks(user_id, deck_ids).await
    }
}

#[async_trait]
impl LearningSessionStore for GatedStore {
    async fn create_session(&self, session: &LearningSession) -> Result<SessionId, CoreError> {
        tokio::task::yield_now().await;
        self.inner.create_session(session).await
    }
    async fn update_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.inner.update_session(user_id, session_id, finished_at).await
    }
    async fn session_by_day(
        &self,
        user_id: &str,
        deck_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LearningSession, CoreError> {
        let res = self.inner.session_by_day(user_id, deck_id, start, end).await;
        self.pause().await;
        res
    }
    async fn get_session(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<LearningSession, CoreError> {
        self.inner.get_session(user_id, session_id).await
    }
}
