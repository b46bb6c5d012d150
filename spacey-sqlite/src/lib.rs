use chrono::{DateTime, SecondsFormat, Utc};
use spacey_core::{
    CardEvent, CardEventStore, CardId, CoreError, DeckCardEvents, DeckId, EventId,
    LearningSession, LearningSessionStore, SessionId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::error;

const EVENT_COLUMNS: &str = "id,user_id,deck_id,card_id,learning_session_id,memory_half_life,\
    number_practiced,number_correct,number_incorrect,\
    number_practiced_last_session,number_correct_last_session,number_incorrect_last_session,\
    created_at,started_at,finished_at";

const SESSION_COLUMNS: &str = "id,user_id,deck_id,started_at,finished_at,finished";

/// Event log and learning sessions in one SQLite database.
///
/// Card events are insert-only; `seq` orders events that share a `created_at`.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(storage("sqlite connect"))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    pub async fn open_memory() -> Result<Self, CoreError> {
        // Every connection to :memory: is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage("sqlite connect"))?;
        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), CoreError> {
        const STMT: &str = r#"
        CREATE TABLE IF NOT EXISTS card_events (
          seq                             INTEGER PRIMARY KEY AUTOINCREMENT,
          id                              TEXT    NOT NULL UNIQUE,
          user_id                         TEXT    NOT NULL,
          deck_id                         TEXT    NOT NULL,
          card_id                         TEXT    NOT NULL,
          learning_session_id             TEXT    NOT NULL,
          memory_half_life                REAL    NOT NULL,
          number_practiced                INTEGER NOT NULL,
          number_correct                  INTEGER NOT NULL,
          number_incorrect                INTEGER NOT NULL,
          number_practiced_last_session   INTEGER NOT NULL,
          number_correct_last_session     INTEGER NOT NULL,
          number_incorrect_last_session   INTEGER NOT NULL,
          created_at                      TEXT    NOT NULL,
          started_at                      TEXT    NOT NULL,
          finished_at                     TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS learning_sessions (
          id           TEXT PRIMARY KEY,
          user_id      TEXT NOT NULL,
          deck_id      TEXT NOT NULL,
          started_at   TEXT NOT NULL,
          finished_at  TEXT,
          finished     INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_events_user_card_time ON card_events (user_id, card_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_events_user_deck ON card_events (user_id, deck_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_user_deck_start ON learning_sessions (user_id, deck_id, started_at);
        "#;

        for chunk in STMT.split(';') {
            let sql = chunk.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(storage("sqlite schema"))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CardEventStore for SqliteRepo {
    async fn latest_events(
        &self,
        user_id: &str,
        card_ids: &[CardId],
    ) -> Result<Vec<CardEvent>, CoreError> {
        if card_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"SELECT {EVENT_COLUMNS} FROM (
                 SELECT {EVENT_COLUMNS},
                        ROW_NUMBER() OVER (PARTITION BY card_id ORDER BY created_at DESC, seq DESC) AS rn
                 FROM card_events
                 WHERE user_id=? AND card_id IN ({})
               ) WHERE rn = 1"#,
            placeholders(card_ids.len())
        );
        let mut q = sqlx::query(&sql).bind(user_id);
        for id in card_ids {
            q = q.bind(id);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(storage("read latest events"))?;
        rows.into_iter().map(row_into_event).collect()
    }

    async fn latest_event(&self, user_id: &str, card_id: &str) -> Result<CardEvent, CoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM card_events WHERE user_id=? AND card_id=? \
             ORDER BY created_at DESC, seq DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(card_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("read latest event"))?;
        let row = row.ok_or(CoreError::NotFound("card event"))?;
        row_into_event(row)
    }

    async fn create_card_event(&self, event: &CardEvent) -> Result<EventId, CoreError> {
        let sql = format!(
            "INSERT INTO card_events ({EVENT_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)"
        );
        sqlx::query(&sql)
            .bind(event.id.to_string())
            .bind(&event.user_id)
            .bind(&event.deck_id)
            .bind(&event.card_id)
            .bind(event.learning_session_id.to_string())
            .bind(event.memory_half_life)
            .bind(event.number_practiced as i64)
            .bind(event.number_correct as i64)
            .bind(event.number_incorrect as i64)
            .bind(event.number_practiced_last_session as i64)
            .bind(event.number_correct_last_session as i64)
            .bind(event.number_incorrect_last_session as i64)
            .bind(dt_to_str(event.created_at))
            .bind(dt_to_str(event.started_at))
            .bind(dt_to_str(event.finished_at))
            .execute(&self.pool)
            .await
            .map_err(storage("insert card event"))?;
        Ok(event.id)
    }

    async fn card_history(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Vec<CardEvent>, CoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM card_events WHERE user_id=? AND card_id=? \
             ORDER BY created_at ASC, seq ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(card_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage("read card history"))?;
        rows.into_iter().map(row_into_event).collect()
    }

    async fn latest_events_by_decks(
        &self,
        user_id: &str,
        deck_ids: &[DeckId],
    ) -> Result<Vec<DeckCardEvents>, CoreError> {
        if deck_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"SELECT {EVENT_COLUMNS} FROM (
                 SELECT {EVENT_COLUMNS},
                        ROW_NUMBER() OVER (PARTITION BY card_id ORDER BY created_at DESC, seq DESC) AS rn
                 FROM card_events
                 WHERE user_id=? AND deck_id IN ({})
               ) WHERE rn = 1
               ORDER BY deck_id, card_id"#,
            placeholders(deck_ids.len())
        );
        let mut q = sqlx::query(&sql).bind(user_id);
        for id in deck_ids {
            q = q.bind(id);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(storage("read deck events"))?;

        let mut grouped: Vec<DeckCardEvents> = Vec::new();
        for row in rows {
            let event = row_into_event(row)?;
            let same_deck = grouped.last().is_some_and(|g| g.deck_id == event.deck_id);
            if same_deck {
                if let Some(g) = grouped.last_mut() {
                    g.card_events.push(event);
                }
            } else {
                grouped.push(DeckCardEvents {
                    deck_id: event.deck_id.clone(),
                    card_events: vec![event],
                });
            }
        }
        Ok(grouped)
    }
}

#[async_trait::async_trait]
impl LearningSessionStore for SqliteRepo {
    async fn create_session(&self, session: &LearningSession) -> Result<SessionId, CoreError> {
        let sql = format!("INSERT INTO learning_sessions ({SESSION_COLUMNS}) VALUES (?,?,?,?,?,?)");
        sqlx::query(&sql)
            .bind(session.id.to_string())
            .bind(&session.user_id)
            .bind(&session.deck_id)
            .bind(dt_to_str(session.started_at))
            .bind(session.finished_at.map(dt_to_str))
            .bind(bool_to_i(session.finished))
            .execute(&self.pool)
            .await
            .map_err(storage("insert learning session"))?;
        Ok(session.id)
    }

    async fn update_session(
        &self,
        user_id: &str,
        session_id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let res = sqlx::query(
            "UPDATE learning_sessions SET finished_at=?, finished=1 WHERE id=? AND user_id=?",
        )
        .bind(dt_to_str(finished_at))
        .bind(session_id.to_string())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(storage("update learning session"))?;
        if res.rows_affected() == 0 {
            return Err(CoreError::NotFound("learning session"));
        }
        Ok(())
    }

    async fn session_by_day(
        &self,
        user_id: &str,
        deck_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<LearningSession, CoreError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM learning_sessions \
             WHERE user_id=? AND deck_id=? AND started_at>=? AND started_at<? \
             ORDER BY started_at ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(deck_id)
            .bind(dt_to_str(start))
            .bind(dt_to_str(end))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("read learning session"))?;
        let row = row.ok_or(CoreError::NotFound("learning session"))?;
        row_into_session(row)
    }

    async fn get_session(
        &self,
        user_id: &str,
        session_id: SessionId,
    ) -> Result<LearningSession, CoreError> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM learning_sessions WHERE id=? AND user_id=?");
        let row = sqlx::query(&sql)
            .bind(session_id.to_string())
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("read learning session"))?;
        let row = row.ok_or(CoreError::NotFound("learning session"))?;
        row_into_session(row)
    }
}

// ===== Helpers =====
fn storage(what: &'static str) -> impl FnOnce(sqlx::Error) -> CoreError {
    move |e| {
        error!(error = %e, "{what}");
        CoreError::Storage(what)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn uuid_from_str(s: String) -> Result<uuid::Uuid, CoreError> {
    uuid::Uuid::parse_str(&s).map_err(|_| CoreError::Invalid("uuid"))
}

/// Fixed-width RFC 3339 so that text order matches time order.
fn dt_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn dt_from_str(s: String) -> Result<DateTime<Utc>, CoreError> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map_err(|_| CoreError::Invalid("datetime"))
        .map(|dt| dt.with_timezone(&Utc))
}

fn bool_to_i(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

fn count(row: &SqliteRow, col: &str) -> u32 {
    row.get::<i64, _>(col) as u32
}

fn row_into_event(row: SqliteRow) -> Result<CardEvent, CoreError> {
    Ok(CardEvent {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        user_id: row.get::<String, _>("user_id"),
        deck_id: row.get::<String, _>("deck_id"),
        card_id: row.get::<String, _>("card_id"),
        learning_session_id: uuid_from_str(row.get::<String, _>("learning_session_id"))?,
        memory_half_life: row.get::<f64, _>("memory_half_life"),
        number_practiced: count(&row, "number_practiced"),
        number_correct: count(&row, "number_correct"),
        number_incorrect: count(&row, "number_incorrect"),
        number_practiced_last_session: count(&row, "number_practiced_last_session"),
        number_correct_last_session: count(&row, "number_correct_last_session"),
        number_incorrect_last_session: count(&row, "number_incorrect_last_session"),
        created_at: dt_from_str(row.get::<String, _>("created_at"))?,
        started_at: dt_from_str(row.get::<String, _>("started_at"))?,
        finished_at: dt_from_str(row.get::<String, _>("finished_at"))?,
    })
}

fn row_into_session(row: SqliteRow) -> Result<LearningSession, CoreError> {
    Ok(LearningSession {
        id: uuid_from_str(row.get::<String, _>("id"))?,
        user_id: row.get::<String, _>("user_id"),
        deck_id: row.get::<String, _>("deck_id"),
        started_at: dt_from_str(row.get::<String, _>("started_at"))?,
        finished_at: row
            .get::<Option<String>, _>("finished_at")
            .map(dt_from_str)
            .transpose()?,
        finished: row.get::<i64, _>("finished") != 0,
    })
}
