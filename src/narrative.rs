//! # Explanation Synthesizer
//! Template-based narrative for a move and its ranked drivers. No I/O, no
//! randomness: the same `(MoveRecord, RankedDriverSet)` always yields the same text.
//!
//! Template choice is keyed on `(direction, magnitude_bucket, lead driver category)`;
//! an empty driver set selects the dedicated "no news" template.

use chrono::NaiveDate;
use std::fmt::Write as _;

use crate::confidence::{sentiment_agrees, NEUTRAL_SENTIMENT_BAND};
use crate::types::{Category, Direction, Driver, MagnitudeBucket, MoveRecord, RankedDriverSet};

/// Fixed statement for the no-driver state.
pub const NO_NEWS_STATEMENT: &str = "No explanatory news found for this move.";

/// Drivers cited by name in the narrative.
pub const MAX_CITED_DRIVERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub direction: Direction,
    pub magnitude: MagnitudeBucket,
    /// `None` means no drivers.
    pub lead: Option<Category>,
}

pub fn template_key(movement: &MoveRecord, drivers: &RankedDriverSet) -> TemplateKey {
    TemplateKey {
        direction: movement.direction,
        magnitude: movement.magnitude_bucket,
        lead: drivers.top().map(|d| d.headline.category),
    }
}

pub fn compose_narrative(
    ticker: &str,
    date: NaiveDate,
    movement: &MoveRecord,
    drivers: &RankedDriverSet,
) -> String {
    let key = template_key(movement, drivers);
    let mut out = move_sentence(ticker, date, movement);

    match (key.lead, drivers.top()) {
        (Some(lead), Some(top)) => {
            out.push(' ');
            out.push_str(&lead_sentence(&key, lead, top));

            let supporting: Vec<&Driver> = drivers
                .iter()
                .skip(1)
                .take(MAX_CITED_DRIVERS - 1)
                .collect();
            if !supporting.is_empty() {
                out.push_str(" Further drivers: ");
                let cited: Vec<String> = supporting.iter().map(|d| cite(d)).collect();
                out.push_str(&cited.join("; "));
                out.push('.');
            }

            if key.direction != Direction::Flat {
                out.push(' ');
                out.push_str(&tone_sentence(key.direction, top.headline.sentiment));
            }
        }
        _ => {
            out.push(' ');
            out.push_str(NO_NEWS_STATEMENT);
            if key.direction != Direction::Flat {
                out.push_str(" The move may reflect broader market or sector factors.");
            }
        }
    }

    out
}

fn move_sentence(ticker: &str, date: NaiveDate, movement: &MoveRecord) -> String {
    let mut s = String::new();
    let pct = movement.pct_change;
    match movement.direction {
        Direction::Flat => {
            let _ = write!(s, "On {date}, {ticker} was little changed ({pct:+.2}%).");
        }
        dir => {
            let verb = move_verb(dir, movement.magnitude_bucket);
            let _ = write!(
                s,
                "On {date}, {ticker} {verb} {:.2}%, a {} move.",
                pct.abs(),
                movement.magnitude_bucket.as_str()
            );
        }
    }
    s
}

fn move_verb(direction: Direction, magnitude: MagnitudeBucket) -> &'static str {
    match (direction, magnitude) {
        (Direction::Up, MagnitudeBucket::Small) => "edged up",
        (Direction::Up, MagnitudeBucket::Moderate) => "rose",
        (Direction::Up, MagnitudeBucket::Large) => "surged",
        (Direction::Down, MagnitudeBucket::Small) => "slipped",
        (Direction::Down, MagnitudeBucket::Moderate) => "fell",
        (Direction::Down, MagnitudeBucket::Large) => "plunged",
        (Direction::Flat, _) => "was little changed",
    }
}

fn lead_sentence(key: &TemplateKey, lead: Category, top: &Driver) -> String {
    let quoted = format!("\"{}\"", top.headline.text().trim());
    let phrase = lead.phrase();
    let note = lead_note(top);

    match (key.direction, key.magnitude) {
        (Direction::Flat, _) => {
            format!("The stock held steady despite {phrase}: {quoted} ({note}).")
        }
        (Direction::Up, MagnitudeBucket::Large) => {
            format!("The sharp rally appears driven by {phrase}: {quoted} ({note}).")
        }
        (Direction::Down, MagnitudeBucket::Large) => {
            format!("The sharp sell-off appears driven by {phrase}: {quoted} ({note}).")
        }
        (_, MagnitudeBucket::Moderate) => {
            format!("The move appears linked to {phrase}: {quoted} ({note}).")
        }
        (_, MagnitudeBucket::Small) => {
            format!("The modest move may be linked to {phrase}: {quoted} ({note}).")
        }
    }
}

/// Tone plus the outlet that reported the lead headline, when known.
fn lead_note(top: &Driver) -> String {
    let tone = tone_word(top.headline.sentiment);
    match top.headline.source().trim() {
        "" => format!("{tone} tone"),
        source => format!("{tone} tone, via {source}"),
    }
}

fn cite(d: &Driver) -> String {
    format!(
        "{} (\"{}\", {})",
        d.headline.category.phrase(),
        d.headline.text().trim(),
        tone_word(d.headline.sentiment)
    )
}

fn tone_sentence(direction: Direction, sentiment: f64) -> String {
    let tone = tone_word(sentiment);
    let dir = direction.as_str();
    if sentiment_agrees(direction, sentiment) {
        format!("The lead headline's {tone} tone is consistent with the {dir} move.")
    } else {
        format!("The lead headline's {tone} tone runs against the {dir} move, so other factors may be at play.")
    }
}

fn tone_word(sentiment: f64) -> &'static str {
    if sentiment > NEUTRAL_SENTIMENT_BAND {
        "positive"
    } else if sentiment < -NEUTRAL_SENTIMENT_BAND {
        "negative"
    } else {
        "neutral"
    }
}
