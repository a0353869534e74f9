//! Terminal front end for a review session.
//!
//! Shows one card at a time: an empty line (or `f`) reveals the answer,
//! `0`-`5` grades it, `q` or end of input finishes the session.

use crate::clock::Clock;
use crate::database::ReviewStore;
use crate::models::sm2::{format_interval, preview_intervals};
use crate::models::{ReviewOutcome, ReviewSession, StudySummary};
use std::io::{self, BufRead, Write};

const GRADE_HELP: &str = "Rate your response: 0 blackout, 1 wrong, 2 wrong (familiar), 3 difficult, 4 correct, 5 perfect";

/// Runs the session to completion over `input`/`output` and returns its summary.
pub fn run_study<S, C, R, W>(
    mut session: ReviewSession<'_, S, C>,
    input: R,
    mut output: W,
) -> io::Result<StudySummary>
where
    S: ReviewStore + ?Sized,
    C: Clock,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();

    writeln!(
        output,
        "Learning: {} ({} cards due)",
        session.deck().name,
        session.due_cards().len()
    )?;

    while let Some(card) = session.current_card() {
        let position = session.current_card_index() + 1;
        let total = session.due_cards().len();

        if session.is_card_flipped() {
            let [again, hard, good, easy] = preview_intervals(&card.schedule, session.clock().now());
            writeln!(output, "Answer: {}", card.back)?;
            writeln!(
                output,
                "Again {} | Hard {} | Good {} | Easy {}",
                format_interval(again),
                format_interval(hard),
                format_interval(good),
                format_interval(easy)
            )?;
            writeln!(output, "{}", GRADE_HELP)?;
        } else {
            writeln!(output)?;
            writeln!(output, "[{}/{}] {}", position, total, card.front)?;
            writeln!(output, "(press Enter to show the answer)")?;
        }
        output.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        match line.trim() {
            "q" | "quit" => break,
            "" | "f" => {
                session.flip_card();
            }
            other => match other.parse::<i32>() {
                Ok(quality) => match session.review_card(quality) {
                    ReviewOutcome::Graded(graded) => {
                        writeln!(
                            output,
                            "Next review in {}",
                            format_interval(graded.schedule.interval)
                        )?;
                    }
                    ReviewOutcome::NotFlipped => {
                        writeln!(output, "Reveal the answer before grading.")?;
                    }
                    ReviewOutcome::QueueExhausted => break,
                },
                Err(_) => writeln!(output, "Unknown input '{}'.", other)?,
            },
        }
    }

    if session.is_complete() {
        writeln!(output)?;
        writeln!(output, "Congratulations! No more cards due in this deck.")?;
    }

    let summary = session.end_study();
    writeln!(
        output,
        "Studied {} cards: {} correct, {} incorrect, best streak {}",
        summary.session.cards_studied,
        summary.session.cards_correct,
        summary.session.cards_incorrect,
        summary.max_streak
    )?;
    if summary.failed_saves > 0 {
        writeln!(
            output,
            "Warning: {} card updates could not be saved.",
            summary.failed_saves
        )?;
    }

    Ok(summary)
}
