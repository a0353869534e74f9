//! Persistence boundary used by review sessions.

use crate::models::{Deck, Flashcard, NewStudySession, ScheduleUpdate};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Deck not found: {0}")]
    DeckNotFound(i64),

    #[error("Card not found: {0}")]
    CardNotFound(i64),

    #[error("Deck '{0}' already exists")]
    DeckExists(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage operations a review session depends on.
pub trait ReviewStore {
    fn get_deck(&self, deck_id: i64) -> Result<Deck>;

    /// Cards of the deck due at `now` (or never reviewed), oldest first, at most `limit`.
    fn get_due_cards(&self, deck_id: i64, limit: usize, now: DateTime<Utc>) -> Result<Vec<Flashcard>>;

    fn update_card_schedule(&self, card_id: i64, update: &ScheduleUpdate) -> Result<()>;

    /// Returns the id of the stored record.
    fn create_study_session(&self, session: &NewStudySession) -> Result<i64>;
}
