//! Trusted-set screening: split normalized names into a clean canonical
//! candidate list and a residual queue for later matching.

use crate::normalize::Normalizer;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DiscardReason {
    MissingComma,
    InvalidCharacters,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingComma => "missing_comma",
            Self::InvalidCharacters => "invalid_characters",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discarded {
    pub name: String,
    pub reason: DiscardReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenOutcome {
    /// Sorted, duplicate-free.
    pub clean: Vec<String>,
    /// Sorted by name, duplicate-free.
    pub discarded: Vec<Discarded>,
    /// Raw values with nothing left after normalization.
    pub skipped: usize,
}

fn allowed(c: char) -> bool {
    c.is_ascii_alphabetic() || c.is_whitespace() || matches!(c, '.' | ',' | '"' | '\'' | '-')
}

/// Why a normalized name cannot enter the trusted set, if it cannot.
pub fn discard_reason(name: &str) -> Option<DiscardReason> {
    if !name.contains(',') {
        Some(DiscardReason::MissingComma)
    } else if !name.chars().all(allowed) {
        Some(DiscardReason::InvalidCharacters)
    } else {
        None
    }
}

pub fn screen<I, S>(names: I, normalizer: &Normalizer) -> ScreenOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique = BTreeSet::new();
    let mut skipped = 0usize;
    let mut total = 0usize;
    for raw in names {
        total += 1;
        match normalizer.normalize(raw.as_ref()) {
            Some(n) => {
                unique.insert(n);
            }
            None => skipped += 1,
        }
    }

    let mut outcome = ScreenOutcome {
        skipped,
        ..Default::default()
    };
    for name in unique {
        match discard_reason(&name) {
            None => outcome.clean.push(name),
            Some(reason) => {
                debug!("discarding {:?}: {}", name, reason);
                outcome.discarded.push(Discarded { name, reason });
            }
        }
    }
    info!(
        "Screened {} names: {} clean, {} discarded, {} skipped",
        total,
        outcome.clean.len(),
        outcome.discarded.len(),
        skipped
    );
    outcome
}
