//! Review session over the cards of one deck that are due now.
//!
//! A session is created by [`ReviewSession::start`] and finished by
//! [`ReviewSession::end_study`], which consumes it. Storage failures while
//! grading are logged and counted but never interrupt the session.

use super::sm2::{self, NextSchedule, Quality};
use super::{Deck, Flashcard, NewStudySession, ScheduleUpdate};
use crate::clock::Clock;
use crate::database::{ReviewStore, StoreError};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

/// What happened to a grading request.
#[derive(Clone, Debug, PartialEq)]
pub enum ReviewOutcome {
    Graded(GradedCard),
    /// The answer has not been revealed; nothing changed.
    NotFlipped,
    /// Every due card was already graded; nothing changed.
    QueueExhausted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GradedCard {
    pub card_id: i64,
    pub quality: Quality,
    pub schedule: NextSchedule,
    /// False when the store rejected the update.
    pub persisted: bool,
}

/// Counters of the running session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub correct: u32,
    pub incorrect: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub failed_saves: u32,
}

/// Result of a finished session.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySummary {
    pub deck_name: String,
    #[serde(flatten)]
    pub session: NewStudySession,
    pub max_streak: u32,
    pub failed_saves: u32,
    /// Id of the stored session record, `None` when no card was graded or saving failed.
    pub record_id: Option<i64>,
}

pub struct ReviewSession<'a, S: ReviewStore + ?Sized, C: Clock> {
    store: &'a S,
    clock: C,
    deck: Deck,
    due_cards: Vec<Flashcard>,
    current_card_index: usize,
    is_card_flipped: bool,
    stats: SessionStats,
    study_start_time: DateTime<Utc>,
}

impl<'a, S: ReviewStore + ?Sized, C: Clock> ReviewSession<'a, S, C> {
    /// Fetches the deck and up to `limit` due cards and starts studying them.
    pub fn start(store: &'a S, clock: C, deck_id: i64, limit: usize) -> Result<Self, StoreError> {
        let deck = store.get_deck(deck_id)?;
        let study_start_time = clock.now();
        let due_cards = store.get_due_cards(deck_id, limit, study_start_time)?;

        info!(
            "Started studying '{}' with {} due cards",
            deck.name,
            due_cards.len()
        );

        Ok(Self {
            store,
            clock,
            deck,
            due_cards,
            current_card_index: 0,
            is_card_flipped: false,
            stats: SessionStats::default(),
            study_start_time,
        })
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn due_cards(&self) -> &[Flashcard] {
        &self.due_cards
    }

    pub fn current_card(&self) -> Option<&Flashcard> {
        self.due_cards.get(self.current_card_index)
    }

    pub fn current_card_index(&self) -> usize {
        self.current_card_index
    }

    pub fn is_card_flipped(&self) -> bool {
        self.is_card_flipped
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn study_start_time(&self) -> DateTime<Utc> {
        self.study_start_time
    }

    pub fn remaining(&self) -> usize {
        self.due_cards.len().saturating_sub(self.current_card_index)
    }

    /// Returns true once every due card has been graded.
    pub fn is_complete(&self) -> bool {
        self.current_card_index >= self.due_cards.len()
    }

    /// Toggles between question and answer. Returns the new state.
    pub fn flip_card(&mut self) -> bool {
        self.is_card_flipped = !self.is_card_flipped;
        self.is_card_flipped
    }

    /// Grades the current card, saves its new schedule and moves to the next card.
    pub fn review_card(&mut self, quality: impl Into<Quality>) -> ReviewOutcome {
        let quality = quality.into();
        let now = self.clock.now();

        let Some(card) = self.due_cards.get_mut(self.current_card_index) else {
            debug!("Ignoring grade {}: no card left", quality.value());
            return ReviewOutcome::QueueExhausted;
        };
        if !self.is_card_flipped {
            debug!("Ignoring grade {} for card {}: answer not shown", quality.value(), card.id);
            return ReviewOutcome::NotFlipped;
        }

        let schedule = sm2::review_schedule(&card.schedule, quality, now);
        let update = ScheduleUpdate::new(&schedule, now);

        let persisted = match self.store.update_card_schedule(card.id, &update) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save schedule for card {}: {}", card.id, e);
                self.stats.failed_saves += 1;
                false
            }
        };
        card.schedule = update.into();

        debug!(
            "Card {} graded {}: interval {}d, ease {:.2}",
            card.id,
            quality.value(),
            schedule.interval,
            schedule.ease_factor
        );
        let card_id = card.id;

        if quality.is_correct() {
            self.stats.correct += 1;
            self.stats.streak += 1;
        } else {
            self.stats.incorrect += 1;
            self.stats.streak = 0;
        }
        self.stats.max_streak = self.stats.max_streak.max(self.stats.streak);

        self.current_card_index += 1;
        self.is_card_flipped = false;

        ReviewOutcome::Graded(GradedCard {
            card_id,
            quality,
            schedule,
            persisted,
        })
    }

    /// Ends the session and saves its summary. Sessions without a graded card are not saved.
    pub fn end_study(self) -> StudySummary {
        let completed_at = self.clock.now();
        let duration_ms = (completed_at - self.study_start_time).num_milliseconds();

        let session = NewStudySession {
            deck_id: self.deck.id,
            cards_studied: self.current_card_index as u32,
            cards_correct: self.stats.correct,
            cards_incorrect: self.stats.incorrect,
            duration_ms,
            started_at: self.study_start_time,
            completed_at,
        };

        let record_id = if session.cards_studied == 0 {
            debug!("Nothing studied in '{}', session not saved", self.deck.name);
            None
        } else {
            match self.store.create_study_session(&session) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Failed to save study session for deck '{}': {}", self.deck.name, e);
                    None
                }
            }
        };

        info!(
            "Finished studying '{}': {} cards, {} correct, {} incorrect in {}s",
            self.deck.name,
            session.cards_studied,
            session.cards_correct,
            session.cards_incorrect,
            duration_ms / 1000
        );

        StudySummary {
            deck_name: self.deck.name,
            session,
            max_streak: self.stats.max_streak,
            failed_saves: self.stats.failed_saves,
            record_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::SqliteStore;
    use chrono::{Duration, TimeZone};

    fn store_with_cards(count: usize) -> (SqliteStore, Deck) {
        let store = SqliteStore::open_in_memory().unwrap();
        let deck = store.create_deck("Spanish", None).unwrap();
        for i in 0..count {
            store
                .add_card(deck.id, &format!("term {i}"), &format!("definition {i}"))
                .unwrap();
        }
        (store, deck)
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap())
    }

    fn grade<S: ReviewStore + ?Sized, C: Clock>(
        session: &mut ReviewSession<'_, S, C>,
        quality: i32,
    ) -> ReviewOutcome {
        session.flip_card();
        session.review_card(quality)
    }

    #[test]
    fn test_start_resets_counters() {
        let (store, deck) = store_with_cards(2);
        let clock = clock();
        let session = ReviewSession::start(&store, &clock, deck.id, 100).unwrap();

        assert_eq!(session.due_cards().len(), 2);
        assert_eq!(session.current_card_index(), 0);
        assert!(!session.is_card_flipped());
        assert_eq!(session.stats(), SessionStats::default());
        assert_eq!(session.study_start_time(), clock.now());
    }

    #[test]
    fn test_start_unknown_deck() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = ReviewSession::start(&store, clock(), 5, 10);
        assert!(matches!(result, Err(StoreError::DeckNotFound(5))));
    }

    #[test]
    fn test_flip_toggles() {
        let (store, deck) = store_with_cards(1);
        let mut session = ReviewSession::start(&store, clock(), deck.id, 10).unwrap();
        assert!(session.flip_card());
        assert!(!session.flip_card());
    }

    #[test]
    fn test_grades_5_5_2() {
        let (store, deck) = store_with_cards(3);
        let mut session = ReviewSession::start(&store, clock(), deck.id, 10).unwrap();

        for quality in [5, 5, 2] {
            assert!(matches!(grade(&mut session, quality), ReviewOutcome::Graded(_)));
        }

        let stats = session.stats();
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.incorrect, 1);
        assert_eq!(stats.streak, 0);
        assert_eq!(stats.max_streak, 2);
        assert_eq!(session.current_card_index(), 3);
        assert!(session.is_complete());
    }

    #[test]
    fn test_unflipped_grade_is_ignored() {
        let (store, deck) = store_with_cards(1);
        let mut session = ReviewSession::start(&store, clock(), deck.id, 10).unwrap();

        assert_eq!(session.review_card(4), ReviewOutcome::NotFlipped);
        assert_eq!(session.current_card_index(), 0);

        assert!(matches!(grade(&mut session, 4), ReviewOutcome::Graded(_)));
        // the next card starts unflipped, so a repeated submit does nothing
        assert_eq!(session.review_card(4), ReviewOutcome::QueueExhausted);
    }

    #[test]
    fn test_grade_after_queue_exhausted_is_noop() {
        let (store, deck) = store_with_cards(1);
        let mut session = ReviewSession::start(&store, clock(), deck.id, 10).unwrap();
        grade(&mut session, 3);

        session.flip_card();
        assert_eq!(session.review_card(3), ReviewOutcome::QueueExhausted);
        assert_eq!(session.stats().correct, 1);
        assert_eq!(session.current_card_index(), 1);
    }

    #[test]
    fn test_review_persists_schedule() {
        let (store, deck) = store_with_cards(1);
        let clock = clock();
        let mut session = ReviewSession::start(&store, &clock, deck.id, 10).unwrap();

        let ReviewOutcome::Graded(graded) = grade(&mut session, 4) else {
            panic!("card should be graded");
        };
        assert!(graded.persisted);
        assert_eq!(graded.schedule.interval, 1);

        let stored = &store.cards_for_deck(deck.id).unwrap()[0];
        assert_eq!(stored.schedule.repetitions, 1);
        assert_eq!(stored.schedule.last_reviewed_at, Some(clock.now()));
        assert_eq!(stored.schedule.next_review_at, Some(clock.now() + Duration::days(1)));
        assert_eq!(session.due_cards()[0].schedule, stored.schedule);
    }

    #[test]
    fn test_end_study_saves_summary() {
        let (store, deck) = store_with_cards(2);
        let clock = clock();
        let mut session = ReviewSession::start(&store, &clock, deck.id, 10).unwrap();
        grade(&mut session, 5);
        clock.advance(Duration::seconds(90));

        let summary = session.end_study();
        assert_eq!(summary.session.cards_studied, 1);
        assert_eq!(summary.session.cards_correct, 1);
        assert_eq!(summary.session.duration_ms, 90_000);
        assert!(summary.record_id.is_some());

        let sessions = store.list_study_sessions(deck.id).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session, summary.session);
    }

    #[test]
    fn test_end_without_grades_is_not_saved() {
        let (store, deck) = store_with_cards(2);
        let clock = clock();
        let mut session = ReviewSession::start(&store, &clock, deck.id, 10).unwrap();
        session.flip_card();
        clock.advance(Duration::seconds(30));

        let summary = session.end_study();
        assert_eq!(summary.session.cards_studied, 0);
        assert_eq!(summary.session.duration_ms, 30_000);
        assert_eq!(summary.record_id, None);
        assert!(store.list_study_sessions(deck.id).unwrap().is_empty());
    }

    #[test]
    fn test_empty_queue_leaves_no_history() {
        let store = SqliteStore::open_in_memory().unwrap();
        let deck = store.create_deck("Empty", None).unwrap();
        let session = ReviewSession::start(&store, clock(), deck.id, 10).unwrap();
        assert!(session.is_complete());

        let summary = session.end_study();
        assert_eq!(summary.record_id, None);
        assert!(store.list_study_sessions(deck.id).unwrap().is_empty());
    }
}
