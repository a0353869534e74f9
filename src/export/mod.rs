pub mod json;

pub use json::{DeckFile, ExportError, export_deck, import_deck, read_deck_file};
