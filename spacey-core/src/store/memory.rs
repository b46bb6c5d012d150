use crate::{
    CardEvent, CardEventStore, CardId, CoreError, DeckCardEvents, DeckId, EventId,
    LearningSession, LearningSessionStore, SessionId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local store for tests and ephemeral runs.
///
/// Events are kept in insertion order, so among events with equal
/// `created_at` the later insert is the latest.
#[derive(Default)]
pub struct MemoryStore {
    events: RwLock<Vec<CardEvent>>,
    sessions: RwLock<HashMap<SessionId, LearningSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

/// Keeps the greatest `created_at`; later entries win ties.
fn latest_by_card<'a>(
    events: impl Iterator<Item = &'a CardEvent>,
) -> HashMap<&'a str, &'a CardEvent> {
    let mut latest: HashMap<&str, &CardEvent> = HashMap::new();
    for e in events {
        let newer = latest
            .get(e.card_id.as_str())
            .map_or(true, |cur| e.created_at >= cur.created_at);
        if newer {
            latest.insert(e.card_id.as_str(), e);
        }
    }
    latest
}

#[async_trait]
impl CardEventStore for MemoryStore {
    async fn latest_events(
        &self,
        user_id: &str,
        card_ids: &[CardId],
    ) -> Result<Vec<CardEvent>, CoreError> {
        let events = self.events.read();
        let latest = latest_by_card(
            events
                .iter()
                .filter(|e| e.user_id == user_id && card_ids.contains(&e.card_id)),
        );
        Ok(latest.into_values().cloned().collect())
    }

    async fn latest_event(&self, user_id: &str, card_id: &str) -> Result<CardEvent, CoreError> {
        let events = self.events.read();
        let found = latest_by_card(
            events
                .iter()
                .filter(|e| e.user_id == user_id && e.card_id == card_id),
        )
        .remove(card_id)
        .cloned();
        found.ok_or(CoreError::NotFound("card event"))
    }

    async fn create_card_event(&self, event: &CardEvent) -> Result<EventId, CoreError> {
        let mut events = self.events.write();
        if events.iter().any(|e| e.id == event.id) {
            return Err(CoreError::Conflict("card event id already exists"));
        }
        events.push(event.clone());
        Ok(event.id)
    }

    async fn card_history(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Vec<CardEvent>, CoreError> {
        let mut v: Vec<CardEvent> = self
            .events
            .read()
            .iter()
            .filter(|e| e.user_id == user_id && e.card_id == card_id)
            .cloned()
            .collect();
        v.sort_by_key(|e| e.created_at);
        Ok(v)
    }

    async fn latest_events_by_decks(
        &self,
        user_id: &str,
        deck_ids: &[DeckId],
    ) -> Result<Vec<DeckCardEvents>, CoreError> {
        let events = self.events.read();
        let latest = latest_by_card(
            events
                .iter()
                .filter(|e| e.user_id == user_id && deck_ids.contains(&e.deck_id)),
        );

        let mut by_deck: HashMap<DeckId, Vec<CardEvent>> = HashMap::new();
        for e in latest.into_values() {
            by_deck.entry(e.deck_id.clone()).or_default().push(e.clone());
        }
        Ok(by_deck
            .into_iter()
            .map(|(deck_id, card_events)| DeckCardEvents {
                deck_id,
                card_events,
            })
            .collect())
    }
}

#[async_trait]
impl LearningSessionStore for MemoryStore {
    async fn create_session(&self, session: &LearningSession) -> Result<SessionId, CoreError> {
        let mut m = self.sessions.write();
        if m.contains_key(&session.id) {
            return Err(CoreError::Conflict("learning session id already exists"));
        }
        m.insert(session.id, session.clone());
        Ok(session.id)
    }

    async fn update_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut m = self.sessions.write();
        let Some(session) = m.get_mut(&session_id).filter(|s| s.user_id == user_id) else {
            return Err(CoreError::NotFound("learning session"));
        };
        session.finished_at = Some(finished_at);
        session.finished = true;
        Ok(())
    }

    async fn session_by_day(
        &self,
        user_id: &str,
        deck_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LearningSession, CoreError> {
        self.sessions
            .read()
            .values()
            .filter(|s| {
                s.user_id == user_id
                    && s.deck_id == deck_id
                    && s.started_at >= start
                    && s.started_at < end
            })
            .min_by_key(|s| s.started_at)
            .cloned()
            .ok_or(CoreError::NotFound("learning session"))
    }

    async fn get_session(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<LearningSession, CoreError> {
        self.sessions
            .read()
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .cloned()
            .ok_or(CoreError::NotFound("learning session"))
    }
}
