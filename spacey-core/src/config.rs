use crate::estimator::DUE_THRESHOLD;
use std::time::Duration;

/// Tunables shared by the event and session usecases.
///
/// Passed explicitly to each usecase constructor; nothing reads it from
/// globals or the environment.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Cards whose recall probability is at or below this value are due.
    pub due_threshold: f64,
    /// Upper bound for every individual store call. `None` waits forever.
    pub store_timeout: Option<Duration>,
    /// Serialize read-then-write sequences per key (user+card for events,
    /// user+deck+day for sessions).
    pub serialize_writes: bool,
    /// Reuse a session opened earlier on the same UTC day for the same deck.
    pub dedupe_sessions_by_day: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            due_threshold: DUE_THRESHOLD,
            store_timeout: Some(Duration::from_secs(10)),
            serialize_writes: true,
            dedupe_sessions_by_day: true,
        }
    }
}

impl EngineConfig {
    /// No per-key write serialization; concurrent reviews of one card may race.
    pub fn unserialized() -> Self {
        Self {
            serialize_writes: false,
            ..Self::default()
        }
    }
}
