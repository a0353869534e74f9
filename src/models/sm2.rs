//! SM-2 (SuperMemo 2) spaced repetition algorithm implementation.
//!
//! The SM-2 algorithm calculates optimal review intervals based on recall quality:
//! - Each card has an ease factor (EF) that adjusts based on performance
//! - Quality grades 0-2: Reset interval and repetitions (card needs relearning)
//! - Quality grades 3-5: Increase interval progressively (1 day → 6 days → EF multiplier)
//! - EF is adjusted after each review and has a minimum value of 1.3

use super::CardSchedule;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Ease factor never drops below this value.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Ease factor given to cards that were never reviewed.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

pub const MS_PER_DAY: i64 = 86_400_000;

/// Longest interval a card can be scheduled out, in days (about 100 years).
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Recall quality on the 0-5 SM-2 scale. Out-of-range input is clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const BLACKOUT: Quality = Quality(0);
    pub const PERFECT: Quality = Quality(5);

    /// Rounds to the nearest grade and clamps to 0-5. NaN counts as a blackout.
    pub fn from_raw(raw: f64) -> Self {
        if raw.is_nan() {
            return Self::BLACKOUT;
        }
        Self(raw.round().clamp(0.0, 5.0) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Grades of 3 and above count as a successful recall.
    pub fn is_correct(self) -> bool {
        self.0 >= 3
    }
}

impl From<u8> for Quality {
    fn from(value: u8) -> Self {
        Self(value.min(5))
    }
}

impl From<i32> for Quality {
    fn from(value: i32) -> Self {
        Self(value.clamp(0, 5) as u8)
    }
}

impl From<i64> for Quality {
    fn from(value: i64) -> Self {
        Self(value.clamp(0, 5) as u8)
    }
}

impl From<f64> for Quality {
    fn from(value: f64) -> Self {
        Self::from_raw(value)
    }
}

/// Scheduling state produced by one review.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextSchedule {
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub next_review_at: DateTime<Utc>,
}

/// Calculates the next scheduling state according to the SM-2 algorithm.
///
/// `repetitions`, `ease_factor` and `interval` are the card's state before the
/// review; `now` is the moment of review.
pub fn compute_next_schedule(
    quality: impl Into<Quality>,
    repetitions: u32,
    ease_factor: f64,
    interval: u32,
    now: DateTime<Utc>,
) -> NextSchedule {
    let quality = quality.into();
    let q = quality.value() as f64;

    let new_ef = (ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASE_FACTOR);

    let (new_interval, new_repetitions) = if !quality.is_correct() {
        (1, 0)
    } else {
        let new_reps = repetitions.saturating_add(1);
        let new_int = match new_reps {
            1 => 1,
            2 => 6,
            _ => ((interval as f64 * new_ef).round() as u32).clamp(1, MAX_INTERVAL_DAYS),
        };
        (new_int, new_reps)
    };

    let next_review_at = now
        .checked_add_signed(Duration::milliseconds(new_interval as i64 * MS_PER_DAY))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    NextSchedule {
        ease_factor: (new_ef * 100.0).round() / 100.0,
        interval: new_interval,
        repetitions: new_repetitions,
        next_review_at,
    }
}

/// Same as [`compute_next_schedule`], reviewed at the current wall-clock time.
pub fn compute_next_schedule_now(
    quality: impl Into<Quality>,
    repetitions: u32,
    ease_factor: f64,
    interval: u32,
) -> NextSchedule {
    compute_next_schedule(quality, repetitions, ease_factor, interval, Utc::now())
}

/// Applies a review to a stored schedule.
pub fn review_schedule(
    schedule: &CardSchedule,
    quality: impl Into<Quality>,
    now: DateTime<Utc>,
) -> NextSchedule {
    compute_next_schedule(
        quality,
        schedule.repetitions,
        schedule.ease_factor,
        schedule.interval,
        now,
    )
}

/// Intervals each answer button would give at `now`: Again, Hard, Good, Easy.
pub fn preview_intervals(schedule: &CardSchedule, now: DateTime<Utc>) -> [u32; 4] {
    [1u8, 3, 4, 5].map(|q| review_schedule(schedule, q, now).interval)
}

/// Formats an interval in days as a short label ("1d", "2w", "3mo", "1y").
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}
