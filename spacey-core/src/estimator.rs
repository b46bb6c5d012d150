//! Exponential forgetting curve and half-life updates.
//!
//! Everything here is pure: no I/O, no clock reads, no failure paths. Invalid
//! numeric input is clamped to a recall probability of 0 and logged.

use chrono::{DateTime, Utc};
use tracing::{error, warn};

/// Recall probability at or below which a card is due.
pub const DUE_THRESHOLD: f64 = 0.5;

/// `2^(-time_lag / half_life)`.
///
/// Returns 0 for a non-positive half-life (the card is forgotten) and for a
/// negative time lag (invalid input).
pub fn recall_probability(time_lag_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        warn!(half_life_days, "cannot calculate recall probability with half-life <= 0");
        return 0.0;
    }
    if time_lag_days < 0.0 {
        error!(time_lag_days, "cannot calculate recall probability with negative time lag");
        return 0.0;
    }
    (-time_lag_days / half_life_days).exp2()
}

/// Whole days between `created_at` and `now`, truncated toward zero.
pub fn time_lag_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_days()
}

pub fn updated_half_life(current_half_life: f64, correct: bool) -> f64 {
    if correct {
        if current_half_life < 1.0 {
            1.0
        } else {
            current_half_life * 2.0
        }
    } else if current_half_life > 1.0 {
        current_half_life / 2.0
    } else {
        0.0
    }
}
