//! Persisted summaries of finished study sessions.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary handed to the store when a session ends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudySession {
    pub deck_id: i64,
    pub cards_studied: u32,
    pub cards_correct: u32,
    pub cards_incorrect: u32,
    pub duration_ms: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySessionRecord {
    pub id: i64,
    #[serde(flatten)]
    pub session: NewStudySession,
}

impl NewStudySession {
    /// Share of graded cards answered correctly, 0.0 when nothing was graded.
    pub fn accuracy(&self) -> f64 {
        if self.cards_studied == 0 {
            0.0
        } else {
            self.cards_correct as f64 / self.cards_studied as f64
        }
    }
}
