//! Bounded 0..=100 similarity between comparison-form names, plus the
//! "best match" and "top k" queries built on it.

use crate::models::Score;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strsim::normalized_levenshtein;

/// Candidate-list size at which a single query fans out across the rayon pool.
pub const DEFAULT_PARALLEL_MIN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Metric {
    /// Indel ratio, `2 * LCS / (|a| + |b|)`.
    #[default]
    Ratio,
    /// `1 - levenshtein / max(|a|, |b|)`.
    Levenshtein,
    /// Ratio over recombined sorted token intersections and differences.
    TokenSet,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ratio => "ratio",
            Self::Levenshtein => "levenshtein",
            Self::TokenSet => "token-set",
        }
    }

    /// Symmetric; identical strings always score 100, a single empty side scores 0.
    pub fn score(self, a: &str, b: &str) -> Score {
        if a == b {
            return 100;
        }
        if a.is_empty() || b.is_empty() {
            return 0;
        }
        let pct = match self {
            Self::Ratio => indel_ratio(a, b),
            Self::Levenshtein => normalized_levenshtein(a, b) * 100.0,
            Self::TokenSet => token_set_ratio(a, b),
        };
        to_score(pct)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[inline]
fn to_score(pct: f64) -> Score {
    pct.round().clamp(0.0, 100.0) as Score
}

fn indel_ratio(a: &str, b: &str) -> f64 {
    // normalized names are almost always ASCII; compare bytes without collecting
    let (lcs, total) = if a.is_ascii() && b.is_ascii() {
        (lcs_len(a.as_bytes(), b.as_bytes()), a.len() + b.len())
    } else {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        (lcs_len(&a, &b), a.len() + b.len())
    };
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs as f64 / total as f64
}

/// Single-row LCS length, row sized by the shorter side.
fn lcs_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut row = vec![0usize; inner.len() + 1];
    for x in outer {
        let mut diag = 0usize;
        for (j, y) in inner.iter().enumerate() {
            let up = row[j + 1];
            row[j + 1] = if x == y { diag + 1 } else { row[j].max(up) };
            diag = up;
        }
    }
    row[inner.len()]
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    let sect = ta.intersection(&tb).copied().collect::<Vec<_>>().join(" ");
    let ab = ta.difference(&tb).copied().collect::<Vec<_>>().join(" ");
    let ba = tb.difference(&ta).copied().collect::<Vec<_>>().join(" ");

    if sect.is_empty() {
        if ab.is_empty() || ba.is_empty() {
            return 0.0;
        }
        return indel_ratio(&ab, &ba);
    }
    if ab.is_empty() || ba.is_empty() {
        return 100.0;
    }
    let with_ab = format!("{sect} {ab}");
    let with_ba = format!("{sect} {ba}");
    indel_ratio(&sect, &with_ab)
        .max(indel_ratio(&sect, &with_ba))
        .max(indel_ratio(&with_ab, &with_ba))
}

/// A scored position in a candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub index: usize,
    pub score: Score,
}

impl Hit {
    /// Higher score wins; equal scores go to the earlier candidate.
    #[inline]
    fn better(self, other: Hit) -> Hit {
        if other.score > self.score || (other.score == self.score && other.index < self.index) {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    metric: Metric,
    parallel_min: usize,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(Metric::default())
    }
}

impl Scorer {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            parallel_min: DEFAULT_PARALLEL_MIN,
        }
    }

    pub fn with_parallel_min(mut self, parallel_min: usize) -> Self {
        self.parallel_min = parallel_min.max(1);
        self
    }

    /// Same metric, never fans out. Used inside work that is already parallel per query.
    pub fn sequential(self) -> Self {
        Self {
            parallel_min: usize::MAX,
            ..self
        }
    }

    #[inline]
    pub fn score(&self, a: &str, b: &str) -> Score {
        self.metric.score(a, b)
    }

    /// Highest-scoring candidate at or above `cutoff`, ties to the first occurrence.
    /// The result does not depend on whether the scan ran in parallel.
    pub fn best_hit<S>(&self, query: &str, candidates: &[S], cutoff: Score) -> Option<Hit>
    where
        S: AsRef<str> + Sync,
    {
        if candidates.len() >= self.parallel_min {
            candidates
                .par_iter()
                .enumerate()
                .map(|(index, c)| Hit {
                    index,
                    score: self.score(query, c.as_ref()),
                })
                .filter(|h| h.score >= cutoff)
                .reduce_with(Hit::better)
        } else {
            let mut best: Option<Hit> = None;
            for (index, c) in candidates.iter().enumerate() {
                let score = self.score(query, c.as_ref());
                if score < cutoff {
                    continue;
                }
                let hit = Hit { index, score };
                best = Some(match best {
                    Some(b) => b.better(hit),
                    None => hit,
                });
                if score == 100 {
                    break;
                }
            }
            best
        }
    }

    /// `best_hit` resolved to the candidate string.
    pub fn best_match<'a, S>(
        &self,
        query: &str,
        candidates: &'a [S],
        cutoff: Score,
    ) -> Option<(&'a str, Score)>
    where
        S: AsRef<str> + Sync,
    {
        self.best_hit(query, candidates, cutoff)
            .map(|h| (candidates[h.index].as_ref(), h.score))
    }

    /// The `k` best candidates, score descending, ties in candidate order.
    pub fn top_k<S>(&self, query: &str, candidates: &[S], k: usize) -> Vec<Hit>
    where
        S: AsRef<str> + Sync,
    {
        if k == 0 || candidates.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<Hit> = if candidates.len() >= self.parallel_min {
            candidates
                .par_iter()
                .enumerate()
                .map(|(index, c)| Hit {
                    index,
                    score: self.score(query, c.as_ref()),
                })
                .collect()
        } else {
            candidates
                .iter()
                .enumerate()
                .map(|(index, c)| Hit {
                    index,
                    score: self.score(query, c.as_ref()),
                })
                .collect()
        };
        hits.sort_by(|a, b| b.score.cmp(&a.score).then(a.index.cmp(&b.index)));
        hits.truncate(k);
        hits
    }

    /// Index of the first candidate scoring at or above `threshold`, in candidate order.
    pub fn first_at_or_above<S>(&self, query: &str, candidates: &[S], threshold: Score) -> Option<usize>
    where
        S: AsRef<str> + Sync,
    {
        if candidates.len() >= self.parallel_min {
            candidates
                .par_iter()
                .position_first(|c| self.score(query, c.as_ref()) >= threshold)
        } else {
            candidates
                .iter()
                .position(|c| self.score(query, c.as_ref()) >= threshold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const METRICS: [Metric; 3] = [Metric::Ratio, Metric::Levenshtein, Metric::TokenSet];

    #[test]
    fn identical_scores_full() {
        for m in METRICS {
            assert_eq!(m.score("GARCIA LOPEZ MARIA", "GARCIA LOPEZ MARIA"), 100);
            assert_eq!(m.score("", ""), 100);
        }
    }

    #[test]
    fn disjoint_scores_low() {
        for m in METRICS {
            assert!(m.score("AAAA BBBB", "XXXX YYYY") <= 15, "{m}");
        }
    }

    #[test]
    fn ascii_and_char_paths_agree() {
        let pairs = [
            ("PEREZ GOMEZ JUAN", "PEREZ GOMEZ JUAN CARLOS"),
            ("AARON TORRES HUERTA", "TORRES HUERTA AARON"),
            ("LOPEZ MARIA", "MUNOZ ANA"),
            ("A", ""),
        ];
        for (a, b) in pairs {
            let ac: Vec<char> = a.chars().collect();
            let bc: Vec<char> = b.chars().collect();
            assert_eq!(lcs_len(a.as_bytes(), b.as_bytes()), lcs_len(&ac, &bc));
            assert_eq!(lcs_len(a.as_bytes(), b.as_bytes()), lcs_len(b.as_bytes(), a.as_bytes()));
        }
        assert_eq!(Metric::Ratio.score("PEREZ GOMEZ JUAN", "PEREZ GOMEZ JUAN CARLOS"), 82);
        assert_eq!(Metric::Ratio.score("AARON TORRES HUERTA", "TORRES HUERTA AARON"), 68);
        // one multi-byte char counts once on the char path
        assert_eq!(Metric::Ratio.score("MUÑOZ", "MUNOZ"), 80);
    }

    #[test]
    fn ratio_matches_known_values() {
        // 2 * 9 / 19
        assert_eq!(Metric::Ratio.score("SMITH JOHN", "SMITH JON"), 95);
        // 1 - 1 / 10
        assert_eq!(Metric::Levenshtein.score("SMITH JOHN", "SMITH JON"), 90);
    }

    #[test]
    fn token_set_ignores_order_and_subsets() {
        assert_eq!(Metric::TokenSet.score("JUAN PEREZ", "PEREZ JUAN"), 100);
        assert_eq!(Metric::TokenSet.score("PEREZ GOMEZ JUAN", "PEREZ JUAN"), 100);
        assert!(Metric::Ratio.score("JUAN PEREZ", "PEREZ JUAN") < 100);
    }

    #[test]
    fn best_match_picks_closest() {
        let s = Scorer::default();
        let cands = ["SMITH JON", "DOE JANE"];
        let (name, score) = s.best_match("SMITH JOHN", &cands, 60).unwrap();
        assert_eq!(name, "SMITH JON");
        assert!(score >= 60);
    }

    #[test]
    fn best_match_empty_candidates_is_none() {
        let s = Scorer::default();
        let empty: [&str; 0] = [];
        assert_eq!(s.best_match("X", &empty, 50), None);
    }

    #[test]
    fn best_match_below_cutoff_is_none() {
        let s = Scorer::default();
        assert_eq!(s.best_match("SMITH JOHN", &["DOE JANE"], 60), None);
    }

    #[test]
    fn ties_go_to_first_occurrence() {
        let cands = vec!["PEREZ ANA", "LOPEZ EVA", "PEREZ ANA", "PEREZ ANA"];
        let seq = Scorer::default().sequential();
        let par = Scorer::default().with_parallel_min(1);
        assert_eq!(seq.best_hit("PEREZ ANA", &cands, 0).unwrap().index, 0);
        assert_eq!(par.best_hit("PEREZ ANA", &cands, 0).unwrap().index, 0);
        let top = par.top_k("PEREZ ANA", &cands, 3);
        assert_eq!(top.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let cands: Vec<String> = (0..2000)
            .map(|i| format!("APELLIDO{} NOMBRE{}", i % 37, i % 11))
            .collect();
        let seq = Scorer::default().sequential();
        let par = Scorer::default().with_parallel_min(1);
        for q in ["APELLIDO3 NOMBRE3", "APELIDO12 NOMBRE1", "ZZZ"] {
            assert_eq!(seq.best_hit(q, &cands, 50), par.best_hit(q, &cands, 50));
            assert_eq!(seq.top_k(q, &cands, 7), par.top_k(q, &cands, 7));
            assert_eq!(
                seq.first_at_or_above(q, &cands, 80),
                par.first_at_or_above(q, &cands, 80)
            );
        }
    }

    proptest! {
        #[test]
        fn reflexive_and_symmetric(a in "[A-Z ]{0,24}", b in "[A-Z ]{0,24}") {
            for m in METRICS {
                prop_assert_eq!(m.score(&a, &a), 100);
                prop_assert_eq!(m.score(&a, &b), m.score(&b, &a));
                prop_assert!(m.score(&a, &b) <= 100);
            }
        }

        #[test]
        fn single_row_lcs_matches_full_table(a in "[A-CÑ ]{0,16}", b in "[A-CÑ ]{0,16}") {
            let a: Vec<char> = a.chars().collect();
            let b: Vec<char> = b.chars().collect();
            let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
            for i in 0..a.len() {
                for j in 0..b.len() {
                    table[i + 1][j + 1] = if a[i] == b[j] {
                        table[i][j] + 1
                    } else {
                        table[i][j + 1].max(table[i + 1][j])
                    };
                }
            }
            prop_assert_eq!(lcs_len(&a, &b), table[a.len()][b.len()]);
        }
    }
}
