pub mod app;
pub mod clock;
pub mod config;
pub mod database;
pub mod export;
pub mod models;

pub use clock::{Clock, ManualClock, OffsetClock, SystemClock};
pub use config::Config;
pub use database::{ReviewStore, SqliteStore, StoreError};
pub use models::sm2::{compute_next_schedule, compute_next_schedule_now};
pub use models::{
    CardSchedule, Deck, Flashcard, NewStudySession, NextSchedule, Quality, ReviewOutcome,
    ReviewSession, ScheduleUpdate, StudySessionRecord, StudySummary,
};
