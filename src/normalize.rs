//! Display and comparison normalization for raw person names.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// One `bad -> good` glyph replacement for a known legacy-encoding artefact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub bad: String,
    pub good: String,
}

/// Ordered replacement table, applied pair by pair over the whole string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionTable {
    pairs: Vec<Substitution>,
}

/// Glyphs the yearly exports are known to contain in place of Spanish letters.
const LEGACY_ARTEFACTS: &[(&str, &str)] = &[
    ("Ð", "Ñ"),
    ("ð", "Ñ"),
    (";", "Ñ"),
    ("▄", "Ü"),
    ("_", "Ü"),
    ("Þ", "Ü"),
    ("þ", "Ü"),
    ("0", "O"),
    ("¬", "."),
    ("╚", "È"),
    ("+", "È"),
    ("¦", "É"),
    ("Ì", "Í"),
    ("Ò", "Ó"),
];

impl Default for SubstitutionTable {
    fn default() -> Self {
        Self::from_pairs(
            LEGACY_ARTEFACTS
                .iter()
                .map(|(b, g)| (b.to_string(), g.to_string())),
        )
    }
}

impl SubstitutionTable {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(bad, good)| Substitution { bad, good })
                .collect(),
        }
    }

    pub fn pairs(&self) -> &[Substitution] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Deterministic, pure name normalizer. Built once per run from the configured table.
#[derive(Debug, Clone)]
pub struct Normalizer {
    // Literal, case-sensitive keys matched against the mark-stripped input.
    table: Vec<(String, String)>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&SubstitutionTable::default())
    }
}

impl Normalizer {
    pub fn new(table: &SubstitutionTable) -> Self {
        let table = table
            .pairs()
            .iter()
            .filter(|p| !p.bad.is_empty())
            .map(|p| (p.bad.clone(), p.good.clone()))
            .collect();
        Self { table }
    }

    /// Display-quality normalization. Returns `None` for input that is empty once cleaned.
    ///
    /// Marks are stripped, the table is applied in the input's own case, and
    /// only then is the result uppercased and folded.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let mut s = strip_marks(raw);
        for (bad, good) in &self.table {
            if s.contains(bad.as_str()) {
                s = s.replace(bad.as_str(), good);
            }
        }
        let s = collapse_whitespace(&fold_letters(&s));
        let s = tighten_commas(&s);
        let s = s
            .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
            .to_string();
        if s.is_empty() { None } else { Some(s) }
    }

    /// Normalize and reduce to the comparison form in one step.
    pub fn comparison_key(&self, raw: &str) -> Option<String> {
        self.normalize(raw).map(|n| comparison_form(&n))
    }
}

/// Scoring-only form: commas become spaces and whitespace is collapsed.
/// Never use it where a display-quality name is required.
pub fn comparison_form(normalized: &str) -> String {
    collapse_whitespace(&normalized.replace(',', " "))
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tighten_commas(s: &str) -> String {
    if !s.contains(',') {
        return s.to_string();
    }
    s.split(',').map(str::trim).collect::<Vec<_>>().join(",")
}

fn strip_marks(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// NFKD, drop combining marks, uppercase, then fold letters that have no decomposition.
fn fold_letters(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.nfkd().filter(|c| !is_combining_mark(*c)) {
        for uc in ch.to_uppercase() {
            if is_combining_mark(uc) {
                continue;
            }
            match uc {
                'Æ' => out.push_str("AE"),
                'Œ' => out.push_str("OE"),
                'Ø' => out.push('O'),
                'Đ' => out.push('D'),
                'Ł' => out.push('L'),
                _ => out.push(uc),
            }
        }
    }
    out
}
