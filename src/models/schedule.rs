//! Per-card scheduling state kept between reviews.
use super::sm2::{DEFAULT_EASE_FACTOR, NextSchedule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSchedule {
    pub ease_factor: f64,
    /// Days until the next review. Zero only for cards never reviewed.
    pub interval: u32,
    /// Consecutive successful reviews.
    pub repetitions: u32,
    /// `None` until the first review; such cards are always due.
    pub next_review_at: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl Default for CardSchedule {
    fn default() -> Self {
        Self {
            ease_factor: DEFAULT_EASE_FACTOR,
            interval: 0,
            repetitions: 0,
            next_review_at: None,
            last_reviewed_at: None,
        }
    }
}

impl CardSchedule {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at.is_none_or(|at| at <= now)
    }
}

/// Fields written back to the store after a review.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub next_review_at: DateTime<Utc>,
    pub last_reviewed_at: DateTime<Utc>,
}

impl ScheduleUpdate {
    pub fn new(next: &NextSchedule, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            ease_factor: next.ease_factor,
            interval: next.interval,
            repetitions: next.repetitions,
            next_review_at: next.next_review_at,
            last_reviewed_at: reviewed_at,
        }
    }
}

impl From<ScheduleUpdate> for CardSchedule {
    fn from(update: ScheduleUpdate) -> Self {
        Self {
            ease_factor: update.ease_factor,
            interval: update.interval,
            repetitions: update.repetitions,
            next_review_at: Some(update.next_review_at),
            last_reviewed_at: Some(update.last_reviewed_at),
        }
    }
}
