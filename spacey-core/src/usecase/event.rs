use crate::usecase::{bounded, KeyedLocks};
use crate::{
    recall_probability, time_lag_days, updated_half_life, CardEvent, CardEventReq, CardEventRes,
    CardEventStore, CardId, CoreError, DeckProbabilitiesReq, DeckRecallProbability,
    EngineConfig, EventId, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Recall probability of `event` as of `now`.
pub fn current_recall_probability(event: &CardEvent, now: DateTime<Utc>) -> f64 {
    let lag = time_lag_days(event.created_at, now);
    recall_probability(lag as f64, event.memory_half_life)
}

fn dedup_ids(ids: &[CardId]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Keeps one event per card, the one with the greatest `created_at`.
fn index_latest(events: Vec<CardEvent>) -> HashMap<CardId, CardEvent> {
    let mut by_card: HashMap<CardId, CardEvent> = HashMap::new();
    for e in events {
        let newer = by_card
            .get(&e.card_id)
            .map_or(true, |cur| e.created_at >= cur.created_at);
        if newer {
            by_card.insert(e.card_id.clone(), e);
        }
    }
    by_card
}

/// Orders the requested cards by urgency.
///
/// Studied cards are kept only when their recall probability is at or below
/// `threshold`. Cards without an event get probability 0. The sort is stable,
/// so equal probabilities keep request order.
pub fn select_due_cards(
    events: Vec<CardEvent>,
    card_ids: &[CardId],
    now: DateTime<Utc>,
    threshold: f64,
) -> Vec<CardEventRes> {
    let mut latest = index_latest(events);
    let mut due = Vec::new();

    for id in dedup_ids(card_ids) {
        match latest.remove(id) {
            Some(event) => {
                let p = current_recall_probability(&event, now);
                if p <= threshold {
                    due.push(CardEventRes::from_event(&event, p));
                }
            }
            None => due.push(CardEventRes::never_studied(id)),
        }
    }

    due.sort_by(|a, b| a.recall_probability.total_cmp(&b.recall_probability));
    due
}

/// Records reviews and answers "what is due".
pub struct EventUsecase {
    store: Arc<dyn CardEventStore>,
    config: EngineConfig,
    locks: KeyedLocks<(UserId, CardId)>,
}

impl EventUsecase {
    pub fn new(store: Arc<dyn CardEventStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: KeyedLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn get_learning_cards(
        &self,
        user_id: &str,
        card_ids: &[CardId],
    ) -> Result<Vec<CardEventRes>, CoreError> {
        if card_ids.is_empty() {
            return Ok(Vec::new());
        }

        let events = bounded(
            self.config.store_timeout,
            "latest card events",
            self.store.latest_events(user_id, card_ids),
        )
        .await?;

        let due = select_due_cards(events, card_ids, Utc::now(), self.config.due_threshold);
        debug!(user_id, requested = card_ids.len(), due = due.len(), "selected learning cards");
        Ok(due)
    }

    /// Appends the event that results from one review.
    ///
    /// The previous event is never modified. With `serialize_writes` off, two
    /// concurrent reviews of the same card may both derive from the same
    /// previous event and one of them is lost.
    pub async fn create_card_event(
        &self,
        user_id: &str,
        req: &CardEventReq,
    ) -> Result<EventId, CoreError> {
        let _guard = if self.config.serialize_writes {
            Some(
                self.locks
                    .lock((user_id.to_string(), req.card_id.clone()))
                    .await,
            )
        } else {
            None
        };

        let latest = bounded(
            self.config.store_timeout,
            "latest card event",
            self.store.latest_event(user_id, &req.card_id),
        )
        .await;

        let event = match latest {
            Ok(prev) => {
                let half_life = updated_half_life(prev.memory_half_life, req.correct);
                // created_at must stay monotonic per card for "latest" to hold.
                let now = Utc::now().max(prev.created_at);
                debug!(
                    user_id,
                    card_id = %req.card_id,
                    prev_half_life = prev.memory_half_life,
                    half_life,
                    "updating card memory"
                );
                CardEvent::next_review(&prev, user_id, req, half_life, now)
            }
            Err(e) if e.is_not_found() => {
                let half_life = updated_half_life(0.0, req.correct);
                debug!(user_id, card_id = %req.card_id, half_life, "first review of card");
                CardEvent::first_review(user_id, req, half_life, Utc::now())
            }
            Err(e) => return Err(e),
        };

        bounded(
            self.config.store_timeout,
            "create card event",
            self.store.create_card_event(&event),
        )
        .await
    }

    /// Mean recall probability of the requested cards of each deck.
    ///
    /// Never-studied cards count as 0 and a deck without cards scores 0.
    pub async fn deck_recall_probabilities(
        &self,
        user_id: &str,
        decks: &[DeckProbabilitiesReq],
    ) -> Result<Vec<DeckRecallProbability>, CoreError> {
        if decks.is_empty() {
            return Ok(Vec::new());
        }

        let deck_ids: Vec<String> = decks.iter().map(|d| d.deck_id.clone()).collect();
        let grouped = bounded(
            self.config.store_timeout,
            "latest card events by deck",
            self.store.latest_events_by_decks(user_id, &deck_ids),
        )
        .await?;

        let by_deck: HashMap<String, HashMap<CardId, CardEvent>> = grouped
            .into_iter()
            .map(|g| (g.deck_id, index_latest(g.card_events)))
            .collect();

        let now = Utc::now();
        let no_events = HashMap::new();
        let out = decks
            .iter()
            .map(|d| {
                let events = by_deck.get(&d.deck_id).unwrap_or(&no_events);
                let ids = dedup_ids(&d.card_ids);
                let recall_probability = if ids.is_empty() {
                    0.0
                } else {
                    let total: f64 = ids
                        .iter()
                        .map(|id| {
                            events
                                .get(*id)
                                .map(|e| current_recall_probability(e, now))
                                .unwrap_or(0.0)
                        })
                        .sum();
                    total / ids.len() as f64
                };
                DeckRecallProbability {
                    deck_id: d.deck_id.clone(),
                    recall_probability,
                }
            })
            .collect();
        Ok(out)
    }

    pub async fn card_history(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Vec<CardEvent>, CoreError> {
        bounded(
            self.config.store_timeout,
            "card history",
            self.store.card_history(user_id, card_id),
        )
        .await
    }
}
