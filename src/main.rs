use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::debug;
use recall::app::run_study;
use recall::clock::{Clock, OffsetClock};
use recall::export::{export_deck, import_deck};
use recall::{Config, Deck, ReviewSession, SqliteStore};
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recall", about = "Flashcards with SM-2 spaced repetition", version)]
struct Cli {
    /// SQLite database file (overrides config and RECALL_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deck management
    #[command(subcommand)]
    Deck(DeckCommand),

    /// Card management
    #[command(subcommand)]
    Card(CardCommand),

    /// Review the cards of a deck that are due now
    Study {
        /// Deck name
        deck: String,
        /// Maximum number of cards in this session
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Export a deck to a JSON file
    Export {
        /// Deck name
        deck: String,
        /// Destination file (defaults to "<deck>.json")
        path: Option<PathBuf>,
    },

    /// Create a deck from a JSON file
    Import {
        path: PathBuf,
    },

    /// Show past study sessions of a deck
    Sessions {
        /// Deck name
        deck: String,
    },

    /// Move the simulated date one day forward
    AdvanceDay,
}

#[derive(Subcommand)]
enum DeckCommand {
    /// Create a new deck
    New {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// List decks with their card and due counts
    List,
}

#[derive(Subcommand)]
enum CardCommand {
    /// Add a card to a deck
    Add {
        /// Deck name
        deck: String,
        front: String,
        back: String,
    },
}

/// Where the interactive study transcript goes. With `--json` stdout carries
/// only the JSON summary.
#[derive(Debug, PartialEq)]
enum Transcript {
    Stdout,
    Stderr,
}

impl Transcript {
    fn for_output(json: bool) -> Self {
        if json { Self::Stderr } else { Self::Stdout }
    }

    fn writer(&self) -> Box<dyn Write> {
        match self {
            Self::Stdout => Box::new(io::stdout()),
            Self::Stderr => Box::new(io::stderr()),
        }
    }
}

fn find_deck(store: &SqliteStore, name: &str) -> anyhow::Result<Deck> {
    match store.find_deck_by_name(name)? {
        Some(deck) => Ok(deck),
        None => bail!("Deck '{}' not found", name),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    debug!("Using {:?}", config);

    let store = SqliteStore::open(&config.database_path, config.store_timeout)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let clock = OffsetClock::days(store.day_offset()?);

    match cli.command {
        Command::Deck(DeckCommand::New { name, description }) => {
            let deck = store.create_deck(&name, description.as_deref())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&deck)?);
            } else {
                println!("Deck '{}' created.", deck.name);
            }
        }
        Command::Deck(DeckCommand::List) => {
            let now = clock.now();
            let mut rows = Vec::new();
            for deck in store.list_decks()? {
                let cards = store.count_cards(deck.id)?;
                let due = store.count_due(deck.id, now)?;
                rows.push((deck, cards, due));
            }

            if cli.json {
                let value: Vec<_> = rows
                    .iter()
                    .map(|(deck, cards, due)| json!({ "deck": deck, "cards": cards, "due": due }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else if rows.is_empty() {
                println!("No decks yet. Create one with `recall deck new <name>`.");
            } else {
                for (i, (deck, cards, due)) in rows.iter().enumerate() {
                    println!("{}. {} ({} cards, {} due)", i + 1, deck.name, cards, due);
                }
            }
        }
        Command::Card(CardCommand::Add { deck, front, back }) => {
            let deck = find_deck(&store, &deck)?;
            let id = store.add_card(deck.id, &front, &back)?;
            if cli.json {
                println!("{}", json!({ "id": id, "deckId": deck.id }));
            } else {
                println!("Card {} added to '{}'.", id, deck.name);
            }
        }
        Command::Study { deck, limit } => {
            let deck = find_deck(&store, &deck)?;
            let limit = limit.unwrap_or(config.due_card_limit);
            let session = ReviewSession::start(&store, clock, deck.id, limit)?;
            let transcript = Transcript::for_output(cli.json);
            if session.is_complete() {
                writeln!(transcript.writer(), "No cards due in '{}'.", deck.name)?;
                return Ok(());
            }

            let stdin = io::stdin();
            let summary = run_study(session, stdin.lock(), transcript.writer())?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Command::Export { deck, path } => {
            let deck = find_deck(&store, &deck)?;
            let path = path.unwrap_or_else(|| PathBuf::from(format!("{}.json", deck.name)));
            let file = export_deck(&store, deck.id, &path)?;
            println!(
                "Deck '{}' exported to {} ({} cards).",
                file.name,
                path.display(),
                file.flashcards.len()
            );
        }
        Command::Import { path } => {
            let deck = import_deck(&store, &path)
                .with_context(|| format!("Import of {} failed", path.display()))?;
            let cards = store.count_cards(deck.id)?;
            println!("Deck '{}' imported with {} cards.", deck.name, cards);
        }
        Command::Sessions { deck } => {
            let deck = find_deck(&store, &deck)?;
            let sessions = store.list_study_sessions(deck.id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("'{}' has not been studied yet.", deck.name);
            } else {
                for record in &sessions {
                    let s = &record.session;
                    println!(
                        "{}  {} cards, {} correct ({:.0}%), {}s",
                        s.started_at.format("%Y-%m-%d %H:%M"),
                        s.cards_studied,
                        s.cards_correct,
                        s.accuracy() * 100.0,
                        s.duration_ms / 1000
                    );
                }
            }
        }
        Command::AdvanceDay => {
            let offset = store.advance_day()?;
            let today = OffsetClock::days(offset).now();
            println!("Simulated date is now {}.", today.format("%Y-%m-%d"));
        }
    }

    Ok(())
}
