//! SQLite-backed review store
//!
//! Handles database initialization, CRUD operations for decks and flashcards,
//! SM-2 review data and study session summaries. Timestamps are stored as
//! epoch milliseconds.

use super::store::{ReviewStore, Result, StoreError};
use crate::models::sm2::DEFAULT_EASE_FACTOR;
use crate::models::{
    CardSchedule, Deck, Flashcard, NewStudySession, ScheduleUpdate, StudySessionRecord,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS decks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS flashcards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        deck_id INTEGER NOT NULL,
        front TEXT NOT NULL,
        back TEXT NOT NULL,
        FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE,
        UNIQUE(deck_id, front)
    );

    CREATE TABLE IF NOT EXISTS review_data (
        flashcard_id INTEGER PRIMARY KEY,
        ease_factor REAL NOT NULL DEFAULT 2.5,
        interval_days INTEGER NOT NULL DEFAULT 0,
        repetitions INTEGER NOT NULL DEFAULT 0,
        next_review_at INTEGER,
        last_reviewed_at INTEGER,
        FOREIGN KEY (flashcard_id) REFERENCES flashcards(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_review_data_next_review
        ON review_data(next_review_at);

    CREATE TABLE IF NOT EXISTS study_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        deck_id INTEGER NOT NULL,
        cards_studied INTEGER NOT NULL,
        cards_correct INTEGER NOT NULL,
        cards_incorrect INTEGER NOT NULL,
        duration_ms INTEGER NOT NULL,
        started_at INTEGER NOT NULL,
        completed_at INTEGER NOT NULL,
        FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS app_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    INSERT OR IGNORE INTO app_state (key, value) VALUES ('day_offset', '0');
";

const CARD_COLUMNS: &str = "f.id, f.deck_id, f.front, f.back,
    r.ease_factor, r.interval_days, r.repetitions, r.next_review_at, r.last_reviewed_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database file and makes sure the schema exists.
    ///
    /// `busy_timeout` bounds how long any statement waits on a locked database.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        debug!("Opened review database at {}", path.as_ref().display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Creates a new deck. Fails with [`StoreError::DeckExists`] when the name is taken.
    pub fn create_deck(&self, name: &str, description: Option<&str>) -> Result<Deck> {
        if self.find_deck_by_name(name)?.is_some() {
            return Err(StoreError::DeckExists(name.to_string()));
        }

        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO decks (name, description, created_at) VALUES (?1, ?2, ?3)",
            params![name, description, created_at.timestamp_millis()],
        )?;
        info!("Deck '{}' created", name);

        Ok(Deck {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: from_millis(created_at.timestamp_millis(), 0)?,
        })
    }

    pub fn find_deck_by_name(&self, name: &str) -> Result<Option<Deck>> {
        let deck = self
            .conn
            .query_row(
                "SELECT id, name, description, created_at FROM decks WHERE name = ?1",
                params![name],
                deck_from_row,
            )
            .optional()?;
        Ok(deck)
    }

    pub fn list_decks(&self) -> Result<Vec<Deck>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, description, created_at FROM decks ORDER BY name")?;
        let decks = stmt
            .query_map([], deck_from_row)?
            .collect::<rusqlite::Result<Vec<Deck>>>()?;
        Ok(decks)
    }

    /// Adds a flashcard to a deck and initializes its review data.
    ///
    /// Returns the flashcard ID. A card with the same front in the same deck
    /// is left untouched and its existing ID is returned.
    pub fn add_card(&self, deck_id: i64, front: &str, back: &str) -> Result<i64> {
        self.get_deck(deck_id)?;

        self.conn.execute(
            "INSERT OR IGNORE INTO flashcards (deck_id, front, back) VALUES (?1, ?2, ?3)",
            params![deck_id, front, back],
        )?;

        let flashcard_id: i64 = self.conn.query_row(
            "SELECT id FROM flashcards WHERE deck_id = ?1 AND front = ?2",
            params![deck_id, front],
            |row| row.get(0),
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO review_data (flashcard_id, ease_factor, interval_days, repetitions)
             VALUES (?1, ?2, 0, 0)",
            params![flashcard_id, DEFAULT_EASE_FACTOR],
        )?;

        Ok(flashcard_id)
    }

    /// All flashcards of a deck in insertion order.
    pub fn cards_for_deck(&self, deck_id: i64) -> Result<Vec<Flashcard>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS}
             FROM flashcards f
             JOIN review_data r ON f.id = r.flashcard_id
             WHERE f.deck_id = ?1
             ORDER BY f.id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let cards = stmt
            .query_map(params![deck_id], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    pub fn count_cards(&self, deck_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM flashcards WHERE deck_id = ?1",
            params![deck_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn count_due(&self, deck_id: i64, now: DateTime<Utc>) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM flashcards f
             JOIN review_data r ON f.id = r.flashcard_id
             WHERE f.deck_id = ?1 AND (r.next_review_at IS NULL OR r.next_review_at <= ?2)",
            params![deck_id, now.timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Finished sessions of a deck, most recent first.
    pub fn list_study_sessions(&self, deck_id: i64) -> Result<Vec<StudySessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, deck_id, cards_studied, cards_correct, cards_incorrect,
                    duration_ms, started_at, completed_at
             FROM study_sessions
             WHERE deck_id = ?1
             ORDER BY started_at DESC, id DESC",
        )?;
        let sessions = stmt
            .query_map(params![deck_id], |row| {
                Ok(StudySessionRecord {
                    id: row.get(0)?,
                    session: NewStudySession {
                        deck_id: row.get(1)?,
                        cards_studied: row.get(2)?,
                        cards_correct: row.get(3)?,
                        cards_incorrect: row.get(4)?,
                        duration_ms: row.get(5)?,
                        started_at: from_millis(row.get(6)?, 6)?,
                        completed_at: from_millis(row.get(7)?, 7)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// Number of simulated days added to the wall clock.
    pub fn day_offset(&self) -> Result<i64> {
        let value: String = self.conn.query_row(
            "SELECT value FROM app_state WHERE key = 'day_offset'",
            [],
            |row| row.get(0),
        )?;
        match value.trim().parse::<i64>() {
            Ok(offset) => Ok(offset),
            Err(_) => {
                warn!("Invalid day_offset {:?} in app_state, using 0", value);
                Ok(0)
            }
        }
    }

    /// Advances the simulated date by one day and returns the new offset.
    pub fn advance_day(&self) -> Result<i64> {
        let offset = self.day_offset()? + 1;
        self.conn.execute(
            "UPDATE app_state SET value = ?1 WHERE key = 'day_offset'",
            params![offset.to_string()],
        )?;
        Ok(offset)
    }
}

impl ReviewStore for SqliteStore {
    fn get_deck(&self, deck_id: i64) -> Result<Deck> {
        self.conn
            .query_row(
                "SELECT id, name, description, created_at FROM decks WHERE id = ?1",
                params![deck_id],
                deck_from_row,
            )
            .optional()?
            .ok_or(StoreError::DeckNotFound(deck_id))
    }

    fn get_due_cards(&self, deck_id: i64, limit: usize, now: DateTime<Utc>) -> Result<Vec<Flashcard>> {
        let sql = format!(
            "SELECT {CARD_COLUMNS}
             FROM flashcards f
             JOIN review_data r ON f.id = r.flashcard_id
             WHERE f.deck_id = ?1 AND (r.next_review_at IS NULL OR r.next_review_at <= ?2)
             ORDER BY COALESCE(r.next_review_at, 0) ASC, f.id ASC
             LIMIT ?3"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&sql)?;
        let cards = stmt
            .query_map(params![deck_id, now.timestamp_millis(), limit], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    fn update_card_schedule(&self, card_id: i64, update: &ScheduleUpdate) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE review_data
             SET ease_factor = ?1, interval_days = ?2, repetitions = ?3,
                 next_review_at = ?4, last_reviewed_at = ?5
             WHERE flashcard_id = ?6",
            params![
                update.ease_factor,
                update.interval,
                update.repetitions,
                update.next_review_at.timestamp_millis(),
                update.last_reviewed_at.timestamp_millis(),
                card_id
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::CardNotFound(card_id));
        }
        Ok(())
    }

    fn create_study_session(&self, session: &NewStudySession) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO study_sessions
                (deck_id, cards_studied, cards_correct, cards_incorrect, duration_ms, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session.deck_id,
                session.cards_studied,
                session.cards_correct,
                session.cards_incorrect,
                session.duration_ms,
                session.started_at.timestamp_millis(),
                session.completed_at.timestamp_millis()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

fn from_millis(ms: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(column, ms))
}

fn optional_millis(ms: Option<i64>, column: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    ms.map(|ms| from_millis(ms, column)).transpose()
}

fn deck_from_row(row: &Row<'_>) -> rusqlite::Result<Deck> {
    Ok(Deck {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: from_millis(row.get(3)?, 3)?,
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Flashcard> {
    Ok(Flashcard {
        id: row.get(0)?,
        deck_id: row.get(1)?,
        front: row.get(2)?,
        back: row.get(3)?,
        schedule: CardSchedule {
            ease_factor: row.get(4)?,
            interval: row.get(5)?,
            repetitions: row.get(6)?,
            next_review_at: optional_millis(row.get(7)?, 7)?,
            last_reviewed_at: optional_millis(row.get(8)?, 8)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn store_with_deck() -> (SqliteStore, Deck) {
        let store = SqliteStore::open_in_memory().unwrap();
        let deck = store.create_deck("Polish Vocabulary", None).unwrap();
        (store, deck)
    }

    fn update_due_at(next_review_at: DateTime<Utc>) -> ScheduleUpdate {
        ScheduleUpdate {
            ease_factor: 2.6,
            interval: 6,
            repetitions: 2,
            next_review_at,
            last_reviewed_at: next_review_at - ChronoDuration::days(6),
        }
    }

    #[test]
    fn test_duplicate_deck_rejected() {
        let (store, _) = store_with_deck();
        let err = store.create_deck("Polish Vocabulary", None).unwrap_err();
        assert!(matches!(err, StoreError::DeckExists(name) if name == "Polish Vocabulary"));
    }

    #[test]
    fn test_add_card_ignores_duplicate_front() {
        let (store, deck) = store_with_deck();
        let first = store.add_card(deck.id, "cześć", "hello").unwrap();
        let second = store.add_card(deck.id, "cześć", "hi").unwrap();

        assert_eq!(first, second);
        let cards = store.cards_for_deck(deck.id).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].back, "hello");
        assert_eq!(cards[0].schedule, CardSchedule::default());
    }

    #[test]
    fn test_add_card_to_missing_deck() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.add_card(42, "front", "back").unwrap_err();
        assert!(matches!(err, StoreError::DeckNotFound(42)));
    }

    #[test]
    fn test_due_cards_filter_and_order() {
        let (store, deck) = store_with_deck();
        let now = Utc::now();
        let later = store.add_card(deck.id, "later", "x").unwrap();
        let overdue = store.add_card(deck.id, "overdue", "x").unwrap();
        let fresh = store.add_card(deck.id, "fresh", "x").unwrap();

        store
            .update_card_schedule(later, &update_due_at(now + ChronoDuration::days(3)))
            .unwrap();
        store
            .update_card_schedule(overdue, &update_due_at(now - ChronoDuration::days(1)))
            .unwrap();

        let due: Vec<i64> = store
            .get_due_cards(deck.id, 10, now)
            .unwrap()
            .into_iter()
            .map(|card| card.id)
            .collect();
        assert_eq!(due, vec![fresh, overdue]);
        assert_eq!(store.count_due(deck.id, now).unwrap(), 2);
        assert_eq!(store.count_cards(deck.id).unwrap(), 3);

        let limited = store.get_due_cards(deck.id, 1, now).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, fresh);
    }

    #[test]
    fn test_update_card_schedule_roundtrips_millis() {
        let (store, deck) = store_with_deck();
        let card_id = store.add_card(deck.id, "dziękuję", "thank you").unwrap();
        let next = DateTime::from_timestamp_millis(1_700_000_123_456).unwrap();

        store.update_card_schedule(card_id, &update_due_at(next)).unwrap();

        let card = &store.cards_for_deck(deck.id).unwrap()[0];
        assert_eq!(card.schedule.next_review_at, Some(next));
        assert_eq!(card.schedule.interval, 6);
        assert_eq!(card.schedule.repetitions, 2);
        assert_eq!(card.schedule.ease_factor, 2.6);
    }

    #[test]
    fn test_update_missing_card() {
        let (store, _) = store_with_deck();
        let err = store
            .update_card_schedule(999, &update_due_at(Utc::now()))
            .unwrap_err();
        assert!(matches!(err, StoreError::CardNotFound(999)));
    }

    #[test]
    fn test_study_sessions_listed_newest_first() {
        let (store, deck) = store_with_deck();
        let start = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        for i in 0..2 {
            let started_at = start + ChronoDuration::hours(i);
            store
                .create_study_session(&NewStudySession {
                    deck_id: deck.id,
                    cards_studied: 3,
                    cards_correct: 2,
                    cards_incorrect: 1,
                    duration_ms: 60_000,
                    started_at,
                    completed_at: started_at + ChronoDuration::minutes(1),
                })
                .unwrap();
        }

        let sessions = store.list_study_sessions(deck.id).unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].session.started_at > sessions[1].session.started_at);
        assert_eq!(sessions[0].session.cards_correct, 2);
    }

    #[test]
    fn test_advance_day() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.day_offset().unwrap(), 0);
        assert_eq!(store.advance_day().unwrap(), 1);
        assert_eq!(store.advance_day().unwrap(), 2);
        assert_eq!(store.day_offset().unwrap(), 2);
    }

    #[test]
    fn test_corrupt_day_offset_reads_as_zero() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute("UPDATE app_state SET value = 'tomorrow' WHERE key = 'day_offset'", [])
            .unwrap();

        assert_eq!(store.day_offset().unwrap(), 0);
        assert_eq!(store.advance_day().unwrap(), 1);
    }

    #[test]
    fn test_open_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recall.sqlite3");
        {
            let store = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
            let deck = store.create_deck("Kana", Some("Hiragana")).unwrap();
            store.add_card(deck.id, "あ", "a").unwrap();
        }

        let store = SqliteStore::open(&path, Duration::from_millis(500)).unwrap();
        let deck = store.find_deck_by_name("Kana").unwrap().unwrap();
        assert_eq!(deck.description.as_deref(), Some("Hiragana"));
        assert_eq!(store.cards_for_deck(deck.id).unwrap().len(), 1);
    }
}
