//! JSON import/export module for flashcard decks.
//! Saves a deck's cards (without scheduling state) to a JSON file and
//! creates a deck from such a file.

use crate::database::{ReviewStore, SqliteStore, StoreError};
use crate::models::Deck;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// File layout of an exported deck.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeckFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub flashcards: Vec<CardFile>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardFile {
    #[serde(alias = "term")]
    pub front: String,
    #[serde(alias = "definition")]
    pub back: String,
}

/// Writes the deck with all of its cards to `path` as pretty-printed JSON.
pub fn export_deck(store: &SqliteStore, deck_id: i64, path: impl AsRef<Path>) -> Result<DeckFile> {
    let deck = store.get_deck(deck_id)?;
    let flashcards = store
        .cards_for_deck(deck_id)?
        .into_iter()
        .map(|card| CardFile {
            front: card.front,
            back: card.back,
        })
        .collect();

    let file = DeckFile {
        name: deck.name,
        description: deck.description,
        flashcards,
    };
    fs::write(path.as_ref(), serde_json::to_string_pretty(&file)?)?;

    info!(
        "Deck '{}' exported to '{}'",
        file.name,
        path.as_ref().display()
    );
    Ok(file)
}

/// Reads a deck file without touching the store.
pub fn read_deck_file(path: impl AsRef<Path>) -> Result<DeckFile> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Creates a new deck from a JSON file. Fails if a deck with that name exists.
pub fn import_deck(store: &SqliteStore, path: impl AsRef<Path>) -> Result<Deck> {
    let file = read_deck_file(path.as_ref())?;
    let deck = store.create_deck(&file.name, file.description.as_deref())?;

    for card in &file.flashcards {
        store.add_card(deck.id, &card.front, &card.back)?;
    }

    info!(
        "Deck '{}' imported from '{}' with {} cards",
        deck.name,
        path.as_ref().display(),
        file.flashcards.len()
    );
    Ok(deck)
}
