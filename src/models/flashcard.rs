//! Flashcard is a pair <front, back> plus its scheduling state.
use super::CardSchedule;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: i64,
    pub deck_id: i64,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub schedule: CardSchedule,
}
