pub mod deck;
pub mod flashcard;
pub mod learning_session;
pub mod schedule;
pub mod sm2;
pub mod study_session;

pub use deck::Deck;
pub use flashcard::Flashcard;
pub use learning_session::{GradedCard, ReviewOutcome, ReviewSession, SessionStats, StudySummary};
pub use schedule::{CardSchedule, ScheduleUpdate};
pub use sm2::{NextSchedule, Quality};
pub use study_session::{NewStudySession, StudySessionRecord};
