//! Sequential single-linkage-to-seed grouping.
//!
//! Names are visited in input order and join the first existing cluster (in
//! creation order) whose seed scores at or above the threshold; otherwise they
//! seed a new cluster. Members are only guaranteed similar to their seed, not
//! to each other. Only the per-name seed scan may run in parallel; cluster
//! assignment itself stays on the calling thread, so the output is identical
//! across runs and thread counts.

use crate::matching::similarity::Scorer;
use crate::models::{NameCluster, NameEntry, Score};
use log::{debug, info};
use std::collections::HashMap;
use std::time::Instant;

pub fn cluster<I>(entries: I, threshold: Score, scorer: &Scorer) -> Vec<NameCluster>
where
    I: IntoIterator<Item = NameEntry>,
{
    let start = Instant::now();
    let mut clusters: Vec<NameCluster> = Vec::new();
    // Seed comparison forms, index-aligned with `clusters`.
    let mut seeds: Vec<String> = Vec::new();
    // A repeated comparison form always lands where its first occurrence landed.
    let mut assigned: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;

    for entry in entries {
        total += 1;
        let slot = match assigned.get(&entry.normalized) {
            Some(&idx) => Some(idx),
            None => scorer.first_at_or_above(&entry.normalized, &seeds, threshold),
        };
        let idx = match slot {
            Some(idx) => {
                clusters[idx].push(entry.clone());
                idx
            }
            None => {
                seeds.push(entry.normalized.clone());
                clusters.push(NameCluster::seeded(entry.clone()));
                clusters.len() - 1
            }
        };
        assigned.entry(entry.normalized).or_insert(idx);
        if total % 5000 == 0 {
            debug!("clustering: {} names -> {} clusters so far", total, clusters.len());
        }
    }

    info!(
        "Clustered {} names into {} groups at threshold {} in {:.2?}",
        total,
        clusters.len(),
        threshold,
        start.elapsed()
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use proptest::prelude::*;

    fn entries(names: &[&str]) -> Vec<NameEntry> {
        let norm = Normalizer::default();
        names
            .iter()
            .map(|n| NameEntry::new(*n, norm.comparison_key(n).unwrap_or_default()))
            .collect()
    }

    #[test]
    fn accents_collapse_into_one_cluster() {
        let e = entries(&["JUAN PÉREZ GÓMEZ", "JUAN PEREZ GOMEZ", "MARIA LÓPEZ"]);
        let c = cluster(e, 90, &Scorer::default());
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].len(), 2);
        assert_eq!(c[1].seed().raw, "MARIA LÓPEZ");
    }

    #[test]
    fn joins_first_qualifying_seed_not_best() {
        // The third name scores 98 against the second seed but 95 against the first.
        let e = vec![
            NameEntry::new("a", "GARCIA LOPEZ MARIA"),
            NameEntry::new("b", "GARCIA LOPEZ MARIA JO"),
            NameEntry::new("c", "GARCIA LOPEZ MARIA J"),
        ];
        let c = cluster(e, 93, &Scorer::default());
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].members()[1].raw, "c");

        let e = entries(&["PEREZ JUAN", "GOMEZ JUANA", "PEREZ JUANA"]);
        let c = cluster(e, 85, &Scorer::default());
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].members().len(), 2);
        assert_eq!(c[0].members()[1].raw, "PEREZ JUANA");
    }

    #[test]
    fn links_only_to_seed() {
        // B is close to A and C is close to B, but C is far from A.
        let e = vec![
            NameEntry::new("a", "ABCDEFGHIJ"),
            NameEntry::new("b", "ABCDEFGHXY"),
            NameEntry::new("c", "ABCDEFWXYZ"),
        ];
        let c = cluster(e, 80, &Scorer::default());
        assert_eq!(c.len(), 2);
        assert_eq!(c[1].seed().raw, "c");
    }

    #[test]
    fn empty_input_gives_no_clusters() {
        assert!(cluster(Vec::new(), 85, &Scorer::default()).is_empty());
    }

    #[test]
    fn parallel_seed_scan_is_identical() {
        let names: Vec<String> = (0..600)
            .map(|i| format!("APELLIDO{} NOMBRE{}", i % 97, i % 13))
            .collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let seq = cluster(entries(&refs), 85, &Scorer::default().sequential());
        let par = cluster(entries(&refs), 85, &Scorer::default().with_parallel_min(1));
        assert_eq!(seq, par);
    }

    proptest! {
        #[test]
        fn every_name_lands_in_exactly_one_cluster(
            names in proptest::collection::vec("[A-E]{1,3} [A-E]{1,4}", 0..40),
            threshold in 50u8..=100,
        ) {
            let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let first = cluster(entries(&refs), threshold, &Scorer::default());
            let again = cluster(entries(&refs), threshold, &Scorer::default());
            prop_assert_eq!(&first, &again);

            let total: usize = first.iter().map(|c| c.len()).sum();
            prop_assert_eq!(total, names.len());
            let mut seen: Vec<String> = first
                .iter()
                .flat_map(|c| c.members().iter().map(|m| m.raw.clone()))
                .collect();
            let mut expected = names.clone();
            seen.sort();
            expected.sort();
            prop_assert_eq!(seen, expected);

            let scorer = Scorer::default();
            for c in &first {
                for m in c.members() {
                    prop_assert!(scorer.score(&m.normalized, &c.seed().normalized) >= threshold);
                }
            }
        }
    }
}
