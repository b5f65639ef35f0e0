//! Matching leftover names against a trusted canonical list.
//!
//! Three entry points share one read-only [`CanonicalIndex`]:
//! - `match_against_canonical`: plain best match per query.
//! - `last_chance`: the same, then a second attempt for the misses after
//!   reading them as "firstnames surname" and moving the surname first.
//! - `match_two_stage`: surname filter first, then firstname similarity
//!   inside the surviving rows only.
//!
//! Queries run in parallel; the index is fully built before any worker starts
//! and is never touched afterwards.

use crate::error::RecordError;
use crate::matching::parallel::fan_out;
use crate::matching::similarity::Scorer;
use crate::models::{MatchResult, Score, SplitNameKey, SplitPolicy, SplitStrategy};
use crate::normalize::{Normalizer, comparison_form};
use log::{debug, info};
use std::collections::HashMap;
use std::time::Instant;

/// Split a name into surname and firstnames.
///
/// A comma splits at its first occurrence. Without one, `HeuristicFallback`
/// takes the last two whitespace tokens as the surname and everything before
/// as firstnames; `CommaOnly` refuses with [`RecordError::AmbiguousSplit`].
pub fn split_name(name: &str, policy: SplitPolicy) -> Result<SplitNameKey, RecordError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RecordError::MalformedInput("empty name".to_string()));
    }
    if let Some((surname, firstnames)) = name.split_once(',') {
        let key = SplitNameKey {
            surname: surname.trim().to_string(),
            firstnames: firstnames.trim().to_string(),
            strategy: SplitStrategy::CommaDelimited,
        };
        debug!(
            "split {:?} by {:?}: surname={:?} firstnames={:?}",
            name, key.strategy, key.surname, key.firstnames
        );
        return Ok(key);
    }
    match policy {
        SplitPolicy::CommaOnly => Err(RecordError::AmbiguousSplit(name.to_string())),
        SplitPolicy::HeuristicFallback => {
            let tokens: Vec<&str> = name.split_whitespace().collect();
            let cut = tokens.len().saturating_sub(2);
            let key = SplitNameKey {
                surname: tokens[cut..].join(" "),
                firstnames: tokens[..cut].join(" "),
                strategy: SplitStrategy::LastTwoTokensHeuristic,
            };
            debug!(
                "split {:?} by {:?}: surname={:?} firstnames={:?}",
                name, key.strategy, key.surname, key.firstnames
            );
            Ok(key)
        }
    }
}

/// Rewrite "FIRSTNAMES SURNAME1 SURNAME2" as "SURNAME1 SURNAME2 FIRSTNAMES".
///
/// Single-token and two-token names come back unchanged. Lossy for compound
/// or single surnames; callers only use it for a second attempt.
pub fn reformat_name_order(name: &str) -> String {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    if tokens.len() < 2 {
        return name.trim().to_string();
    }
    let cut = tokens.len() - 2;
    let mut out = tokens[cut..].join(" ");
    if cut > 0 {
        out.push(' ');
        out.push_str(&tokens[..cut].join(" "));
    }
    out
}

#[derive(Debug, Clone)]
struct SplitEntry {
    name_idx: usize,
    surname: String,
    firstnames: String,
}

/// Canonical names with their comparison forms and split keys, built once per pass.
#[derive(Debug, Clone, Default)]
pub struct CanonicalIndex {
    names: Vec<String>,
    keys: Vec<String>,
    splits: Vec<SplitEntry>,
    by_surname: HashMap<String, Vec<usize>>,
}

impl CanonicalIndex {
    pub fn build<S: AsRef<str>>(canonical: &[S], normalizer: &Normalizer, policy: SplitPolicy) -> Self {
        let mut index = CanonicalIndex::default();
        let mut dropped = 0usize;
        for raw in canonical {
            let raw = raw.as_ref().trim();
            let Some(normalized) = normalizer.normalize(raw) else {
                dropped += 1;
                continue;
            };
            let name_idx = index.names.len();
            index.names.push(raw.to_string());
            index.keys.push(comparison_form(&normalized));
            if let Ok(key) = split_name(&normalized, policy) {
                let surname = comparison_form(&key.surname);
                index
                    .by_surname
                    .entry(surname.clone())
                    .or_default()
                    .push(index.splits.len());
                index.splits.push(SplitEntry {
                    name_idx,
                    surname,
                    firstnames: comparison_form(&key.firstnames),
                });
            }
        }
        if dropped > 0 {
            debug!("canonical index: dropped {} blank names", dropped);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Per-query results plus the counts of queries that never produced a score.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// One entry per scored query, in input order.
    pub results: Vec<MatchResult>,
    /// Queries with no usable name.
    pub skipped: usize,
    /// Queries that could not be split under `SplitPolicy::CommaOnly`; reported unmatched.
    pub ambiguous: usize,
    /// Queries whose worker faulted; reported unmatched.
    pub failures: usize,
}

impl MatchOutcome {
    pub fn matched(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.is_match())
            .map(|r| r.query.clone())
            .collect()
    }

    pub fn unmatched(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.is_match())
            .map(|r| r.query.clone())
            .collect()
    }

    pub fn matched_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_match()).count()
    }

    pub fn unmatched_count(&self) -> usize {
        self.results.len() - self.matched_count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastChanceOutcome {
    /// Keyed by the original query names, whichever attempt matched.
    pub outcome: MatchOutcome,
    /// Misses of the first attempt that the reordered retry matched.
    pub recovered: usize,
}

#[derive(Debug, Clone)]
pub struct ResidualMatcher {
    normalizer: Normalizer,
    scorer: Scorer,
    split_policy: SplitPolicy,
}

impl ResidualMatcher {
    pub fn new(normalizer: Normalizer, scorer: Scorer, split_policy: SplitPolicy) -> Self {
        Self {
            normalizer,
            scorer,
            split_policy,
        }
    }

    pub fn index<S: AsRef<str>>(&self, canonical: &[S]) -> CanonicalIndex {
        CanonicalIndex::build(canonical, &self.normalizer, self.split_policy)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Best canonical match for one query. Never fans out; callers parallelize per query.
    pub fn best_for(&self, query: &str, index: &CanonicalIndex, cutoff: Score) -> Option<(String, Score)> {
        let key = self.normalizer.comparison_key(query)?;
        self.scorer
            .sequential()
            .best_hit(&key, &index.keys, cutoff)
            .map(|h| (index.names[h.index].clone(), h.score))
    }

    /// Best canonical match per query at or above `cutoff`.
    pub fn match_against_canonical<S>(
        &self,
        queries: &[S],
        index: &CanonicalIndex,
        cutoff: Score,
    ) -> MatchOutcome
    where
        S: AsRef<str> + Sync,
    {
        let start = Instant::now();
        let mut outcome = MatchOutcome::default();
        let mut prepared: Vec<(&str, String)> = Vec::with_capacity(queries.len());
        for q in queries {
            let q = q.as_ref();
            match self.normalizer.comparison_key(q) {
                Some(key) => prepared.push((q, key)),
                None => {
                    debug!("skipping query with no usable name: {:?}", q);
                    outcome.skipped += 1;
                }
            }
        }

        let keys: Vec<&str> = prepared.iter().map(|(_, k)| k.as_str()).collect();
        let (hits, failures) = self.best_in_index(&keys, index, cutoff);
        outcome.failures = failures;
        outcome.results = prepared
            .iter()
            .zip(hits)
            .map(|((q, _), matched)| MatchResult {
                query: (*q).to_string(),
                matched,
            })
            .collect();

        info!(
            "Residual match: {} queries vs {} canonical at cutoff {} -> matched={} unmatched={} skipped={} failures={} in {:.2?}",
            queries.len(),
            index.len(),
            cutoff,
            outcome.matched_count(),
            outcome.unmatched_count(),
            outcome.skipped,
            outcome.failures,
            start.elapsed()
        );
        outcome
    }

    /// Match, then retry every miss with its name order reformatted.
    pub fn last_chance<S>(&self, queries: &[S], index: &CanonicalIndex, cutoff: Score) -> LastChanceOutcome
    where
        S: AsRef<str> + Sync,
    {
        let mut outcome = self.match_against_canonical(queries, index, cutoff);

        let mut retry_pos: Vec<usize> = Vec::new();
        let mut retry_keys: Vec<String> = Vec::new();
        for (pos, r) in outcome.results.iter().enumerate() {
            if r.is_match() {
                continue;
            }
            let reordered = reformat_name_order(&r.query);
            if let Some(key) = self.normalizer.comparison_key(&reordered) {
                debug!("last chance: {:?} -> {:?}", r.query, reordered);
                retry_pos.push(pos);
                retry_keys.push(key);
            }
        }

        let keys: Vec<&str> = retry_keys.iter().map(|k| k.as_str()).collect();
        let (hits, failures) = self.best_in_index(&keys, index, cutoff);
        outcome.failures += failures;
        let mut recovered = 0usize;
        for (pos, hit) in retry_pos.into_iter().zip(hits) {
            if hit.is_some() {
                recovered += 1;
                outcome.results[pos].matched = hit;
            }
        }

        info!(
            "Last chance: recovered {} names by reordering; {} still unmatched",
            recovered,
            outcome.unmatched_count()
        );
        LastChanceOutcome { outcome, recovered }
    }

    /// Surname filter, then firstname similarity inside the filtered rows.
    ///
    /// `surname_cutoff == 100` keeps only exact surname equality. A query is
    /// unmatched when no surname survives or the best firstname score is
    /// below `name_cutoff`.
    pub fn match_two_stage<S>(
        &self,
        queries: &[S],
        index: &CanonicalIndex,
        surname_cutoff: Score,
        name_cutoff: Score,
    ) -> MatchOutcome
    where
        S: AsRef<str> + Sync,
    {
        let start = Instant::now();
        let mut outcome = MatchOutcome::default();
        let mut prepared: Vec<(&str, Option<(String, String)>)> = Vec::with_capacity(queries.len());
        for q in queries {
            let q = q.as_ref();
            let Some(normalized) = self.normalizer.normalize(q) else {
                debug!("skipping query with no usable name: {:?}", q);
                outcome.skipped += 1;
                continue;
            };
            match split_name(&normalized, self.split_policy) {
                Ok(key) => prepared.push((
                    q,
                    Some((comparison_form(&key.surname), comparison_form(&key.firstnames))),
                )),
                Err(RecordError::AmbiguousSplit(name)) => {
                    debug!("no comma in {:?}; reported unmatched", name);
                    outcome.ambiguous += 1;
                    prepared.push((q, None));
                }
                Err(e) => {
                    debug!("skipping {:?}: {}", q, e);
                    outcome.skipped += 1;
                }
            }
        }

        let scorer = self.scorer.sequential();
        let results = fan_out(&prepared, |(_, key)| {
            key.as_ref().and_then(|(surname, firstnames)| {
                two_stage_one(&scorer, surname, firstnames, index, surname_cutoff, name_cutoff)
            })
        });
        let mut failures = 0usize;
        outcome.results = prepared
            .iter()
            .zip(results)
            .map(|((q, _), res)| {
                let matched = res.unwrap_or_else(|_| {
                    failures += 1;
                    None
                });
                MatchResult {
                    query: (*q).to_string(),
                    matched,
                }
            })
            .collect();
        outcome.failures = failures;

        info!(
            "Two-stage match: {} queries (surname>={}, name>={}) -> matched={} unmatched={} ambiguous={} skipped={} failures={} in {:.2?}",
            queries.len(),
            surname_cutoff,
            name_cutoff,
            outcome.matched_count(),
            outcome.unmatched_count(),
            outcome.ambiguous,
            outcome.skipped,
            outcome.failures,
            start.elapsed()
        );
        outcome
    }

    /// Best hit per prepared key, aligned with `keys`. Faulted workers come back as `None`.
    fn best_in_index(
        &self,
        keys: &[&str],
        index: &CanonicalIndex,
        cutoff: Score,
    ) -> (Vec<Option<(String, Score)>>, usize) {
        let scorer = self.scorer.sequential();
        let mut failures = 0usize;
        let hits = fan_out(keys, |key| {
            scorer
                .best_hit(key, &index.keys, cutoff)
                .map(|h| (index.names[h.index].clone(), h.score))
        })
        .into_iter()
        .map(|r| {
            r.unwrap_or_else(|_| {
                failures += 1;
                None
            })
        })
        .collect();
        (hits, failures)
    }
}

fn two_stage_one(
    scorer: &Scorer,
    surname: &str,
    firstnames: &str,
    index: &CanonicalIndex,
    surname_cutoff: Score,
    name_cutoff: Score,
) -> Option<(String, Score)> {
    let pool: Vec<usize> = if surname_cutoff >= 100 {
        index.by_surname.get(surname).cloned().unwrap_or_default()
    } else {
        index
            .splits
            .iter()
            .enumerate()
            .filter(|(_, s)| scorer.score(surname, &s.surname) >= surname_cutoff)
            .map(|(i, _)| i)
            .collect()
    };
    if pool.is_empty() {
        debug!("no canonical surname for {:?}", surname);
        return None;
    }
    let candidates: Vec<&str> = pool
        .iter()
        .map(|&i| index.splits[i].firstnames.as_str())
        .collect();
    let hit = scorer.best_hit(firstnames, &candidates, name_cutoff)?;
    let entry = &index.splits[pool[hit.index]];
    Some((index.names[entry.name_idx].clone(), hit.score))
}
