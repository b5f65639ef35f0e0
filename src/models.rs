use serde::{Deserialize, Serialize};

/// Similarity score on the closed range 0..=100.
pub type Score = u8;

/// A raw name paired with its comparison form. The comparison form is derived,
/// never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub raw: String,
    pub normalized: String,
}

impl NameEntry {
    pub fn new(raw: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            normalized: normalized.into(),
        }
    }
}

/// Members grouped under the entry that seeded the cluster. The seed is always
/// `members[0]`; every other member scored at or above the threshold against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCluster {
    members: Vec<NameEntry>,
}

impl NameCluster {
    pub fn seeded(seed: NameEntry) -> Self {
        Self {
            members: vec![seed],
        }
    }

    pub fn seed(&self) -> &NameEntry {
        &self.members[0]
    }

    pub fn members(&self) -> &[NameEntry] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn push(&mut self, entry: NameEntry) {
        self.members.push(entry);
    }
}

/// Outcome of one "best match in the canonical list" query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub query: String,
    pub matched: Option<(String, Score)>,
}

impl MatchResult {
    pub fn no_match(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            matched: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }
}

/// How a [`SplitNameKey`] was derived. Logged per name because the heuristic is lossy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitStrategy {
    CommaDelimited,
    LastTwoTokensHeuristic,
}

/// Whether names without a comma may fall back to the last-two-tokens heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitPolicy {
    #[default]
    HeuristicFallback,
    CommaOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitNameKey {
    pub surname: String,
    pub firstnames: String,
    pub strategy: SplitStrategy,
}

/// Plain tabular data handed over by the flat-file collaborators. Every row is
/// kept aligned to `headers`; short rows are padded on read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl NameTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Cell value, or `None` when the cell is absent or blank.
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
