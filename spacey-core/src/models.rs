use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifiers issued by the user and deck services.
pub type UserId = String;
pub type DeckId = String;
pub type CardId = String;

pub type EventId = Uuid;
pub type SessionId = Uuid;

/// Memory state of one card for one user right after a review.
///
/// Events are only ever inserted. The current state of a (user, card) pair is
/// the event with the greatest `created_at`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CardEvent {
    pub id: EventId,
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(rename = "deckID")]
    pub deck_id: DeckId,
    #[serde(rename = "cardID")]
    pub card_id: CardId,
    #[serde(rename = "learningSessionID")]
    pub learning_session_id: SessionId,
    #[serde(rename = "memoryHalfLife")]
    pub memory_half_life: f64,
    #[serde(rename = "totalNumberPracticed")]
    pub number_practiced: u32,
    #[serde(rename = "totalNumberCorrect")]
    pub number_correct: u32,
    #[serde(rename = "totalNumberIncorrect")]
    pub number_incorrect: u32,
    #[serde(rename = "totalNumberPracticedLastSession")]
    pub number_practiced_last_session: u32,
    #[serde(rename = "totalNumberCorrectLastSession")]
    pub number_correct_last_session: u32,
    #[serde(rename = "totalNumberIncorrectLastSession")]
    pub number_incorrect_last_session: u32,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "finishedAt")]
    pub finished_at: DateTime<Utc>,
}

impl CardEvent {
    /// First review this user ever gave the card.
    pub fn first_review(
        user_id: &str,
        req: &CardEventReq,
        memory_half_life: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let (correct, incorrect) = if req.correct { (1, 0) } else { (0, 1) };
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            deck_id: req.deck_id.clone(),
            card_id: req.card_id.clone(),
            learning_session_id: req.learning_session_id,
            memory_half_life,
            number_practiced: 1,
            number_correct: correct,
            number_incorrect: incorrect,
            number_practiced_last_session: 1,
            number_correct_last_session: correct,
            number_incorrect_last_session: incorrect,
            created_at: now,
            started_at: req.started_at,
            finished_at: req.finished_at,
        }
    }

    /// Successor of `prev` after the review described by `req`.
    ///
    /// Last-session counters continue from `prev` while the review belongs to
    /// the same learning session and start over when it does not.
    pub fn next_review(
        prev: &CardEvent,
        user_id: &str,
        req: &CardEventReq,
        memory_half_life: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let (correct, incorrect) = if req.correct { (1, 0) } else { (0, 1) };
        let (practiced_ls, correct_ls, incorrect_ls) =
            if prev.learning_session_id == req.learning_session_id {
                (
                    prev.number_practiced_last_session,
                    prev.number_correct_last_session,
                    prev.number_incorrect_last_session,
                )
            } else {
                (0, 0, 0)
            };

        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            deck_id: req.deck_id.clone(),
            card_id: prev.card_id.clone(),
            learning_session_id: req.learning_session_id,
            memory_half_life,
            number_practiced: prev.number_practiced + 1,
            number_correct: prev.number_correct + correct,
            number_incorrect: prev.number_incorrect + incorrect,
            number_practiced_last_session: practiced_ls + 1,
            number_correct_last_session: correct_ls + correct,
            number_incorrect_last_session: incorrect_ls + incorrect,
            created_at: now,
            started_at: req.started_at,
            finished_at: req.finished_at,
        }
    }
}

/// One practice block for a user and deck, normally one per UTC day.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LearningSession {
    pub id: SessionId,
    #[serde(rename = "userID")]
    pub user_id: UserId,
    #[serde(rename = "deckID")]
    pub deck_id: DeckId,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
    pub finished: bool,
}

impl LearningSession {
    pub fn open(user_id: &str, req: &LearningSessionCreateReq) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            deck_id: req.deck_id.clone(),
            started_at: req.started_at,
            finished_at: None,
            finished: false,
        }
    }
}

/// Latest events of one deck, as grouped by the event store.
#[derive(Clone, Debug, PartialEq)]
pub struct DeckCardEvents {
    pub deck_id: DeckId,
    pub card_events: Vec<CardEvent>,
}

// ===== Requests / responses =====

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CardEventReq {
    #[serde(rename = "deckID")]
    pub deck_id: DeckId,
    #[serde(rename = "cardID")]
    pub card_id: CardId,
    #[serde(rename = "learningSessionID")]
    pub learning_session_id: SessionId,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "finishedAt")]
    pub finished_at: DateTime<Utc>,
    pub correct: bool,
}

impl CardEventReq {
    pub fn validate(&self) -> Result<(), crate::CoreError> {
        if self.deck_id.trim().is_empty() {
            return Err(crate::CoreError::Invalid("deckID is required"));
        }
        if self.card_id.trim().is_empty() {
            return Err(crate::CoreError::Invalid("cardID is required"));
        }
        if self.finished_at < self.started_at {
            return Err(crate::CoreError::Invalid("finishedAt precedes startedAt"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CardEventRes {
    #[serde(rename = "cardID")]
    pub card_id: CardId,
    #[serde(rename = "learningSessionID")]
    pub learning_session_id: Option<SessionId>,
    #[serde(rename = "recallProbability")]
    pub recall_probability: f64,
}

impl CardEventRes {
    pub fn from_event(event: &CardEvent, recall_probability: f64) -> Self {
        Self {
            card_id: event.card_id.clone(),
            learning_session_id: Some(event.learning_session_id),
            recall_probability,
        }
    }

    /// A card the user has never reviewed: always the most urgent.
    pub fn never_studied(card_id: &str) -> Self {
        Self {
            card_id: card_id.to_string(),
            learning_session_id: None,
            recall_probability: 0.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearningSessionCreateReq {
    #[serde(rename = "deckID")]
    pub deck_id: DeckId,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearningSessionUpdateReq {
    pub id: SessionId,
    #[serde(rename = "finishedAt")]
    pub finished_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LearningSessionRes {
    pub id: SessionId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeckProbabilitiesReq {
    #[serde(rename = "deckID")]
    pub deck_id: DeckId,
    #[serde(rename = "cardIDs", default)]
    pub card_ids: Vec<CardId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeckRecallProbability {
    #[serde(rename = "deckID")]
    pub deck_id: DeckId,
    #[serde(rename = "recallProbability")]
    pub recall_probability: f64,
}
