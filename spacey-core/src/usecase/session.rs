use crate::usecase::{bounded, KeyedLocks};
use crate::{
    CoreError, DeckId, EngineConfig, LearningSession, LearningSessionCreateReq,
    LearningSessionStore, LearningSessionUpdateReq, SessionId, UserId,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// UTC calendar day containing `at`, as `[start, end)`.
pub fn day_window(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&at.date_naive().and_time(NaiveTime::MIN));
    (start, start + Duration::days(1))
}

pub struct SessionUsecase {
    store: Arc<dyn LearningSessionStore>,
    config: EngineConfig,
    locks: KeyedLocks<(UserId, DeckId, NaiveDate)>,
}

impl SessionUsecase {
    pub fn new(store: Arc<dyn LearningSessionStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: KeyedLocks::new(),
        }
    }

    /// Opens a session for the deck, or returns the one already opened on the
    /// same UTC day when day deduplication is enabled.
    pub async fn create_learning_session(
        &self,
        user_id: &str,
        req: &LearningSessionCreateReq,
    ) -> Result<SessionId, CoreError> {
        if !self.config.dedupe_sessions_by_day {
            return self.insert(user_id, req).await;
        }

        let (start, end) = day_window(req.started_at);
        let _guard = if self.config.serialize_writes {
            let key = (user_id.to_string(), req.deck_id.clone(), start.date_naive());
            Some(self.locks.lock(key).await)
        } else {
            None
        };

        let existing = bounded(
            self.config.store_timeout,
            "learning session by day",
            self.store.session_by_day(user_id, &req.deck_id, start, end),
        )
        .await;

        match existing {
            Ok(session) => {
                debug!(user_id, session_id = %session.id, "reusing today's learning session");
                Ok(session.id)
            }
            Err(e) if e.is_not_found() => self.insert(user_id, req).await,
            Err(e) => Err(e),
        }
    }

    async fn insert(
        &self,
        user_id: &str,
        req: &LearningSessionCreateReq,
    ) -> Result<SessionId, CoreError> {
        let session = LearningSession::open(user_id, req);
        let id = bounded(
            self.config.store_timeout,
            "create learning session",
            self.store.create_session(&session),
        )
        .await?;
        info!(user_id, deck_id = %req.deck_id, session_id = %id, "opened learning session");
        Ok(id)
    }

    /// Marks the user's session finished. Finishing twice overwrites
    /// `finished_at`.
    pub async fn finish_learning_session(
        &self,
        user_id: &str,
        req: &LearningSessionUpdateReq,
    ) -> Result<(), CoreError> {
        bounded(
            self.config.store_timeout,
            "update learning session",
            self.store.update_session(user_id, req.id, req.finished_at),
        )
        .await?;
        debug!(user_id, session_id = %req.id, "finished learning session");
        Ok(())
    }

    pub async fn get_learning_session(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<LearningSession, CoreError> {
        bounded(
            self.config.store_timeout,
            "get learning session",
            self.store.get_session(user_id, session_id),
        )
        .await
    }
}
