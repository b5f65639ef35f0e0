//! Last filter over an assigned dataset: names that got no canonical
//! assignment are checked surname-first against the canonical list, and the
//! ones that still do not match join it as new canonical names.

use crate::error::ConfigError;
use crate::matching::{MatchOutcome, ResidualMatcher};
use crate::models::{NameTable, Score};
use log::info;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    /// Updated canonical list, sorted and duplicate-free.
    pub canonical: Vec<String>,
    /// Unassigned, comma-separated names that were checked, sorted.
    pub candidates: Vec<String>,
    /// Names appended to the canonical list.
    pub added: Vec<String>,
    pub matches: MatchOutcome,
}

/// Unassigned names, deduplicated and sorted. Only names with a comma qualify.
pub fn unassigned_names(
    table: &NameTable,
    name_column: &str,
    output_column: &str,
) -> Result<Vec<String>, ConfigError> {
    let missing = |column: &str| ConfigError::MissingColumn {
        path: "dataset".to_string(),
        column: column.to_string(),
    };
    let name_col = table.column_index(name_column).ok_or_else(|| missing(name_column))?;
    let out_col = table
        .column_index(output_column)
        .ok_or_else(|| missing(output_column))?;

    let names: BTreeSet<String> = (0..table.len())
        .filter(|&r| table.value(r, out_col).is_none())
        .filter_map(|r| table.value(r, name_col))
        .filter(|n| n.contains(','))
        .map(|n| n.trim().to_string())
        .collect();
    Ok(names.into_iter().collect())
}

pub fn reconcile<S: AsRef<str>>(
    table: &NameTable,
    name_column: &str,
    output_column: &str,
    canonical: &[S],
    matcher: &ResidualMatcher,
    surname_cutoff: Score,
    name_cutoff: Score,
) -> Result<ReconcileOutcome, ConfigError> {
    let candidates = unassigned_names(table, name_column, output_column)?;
    let index = matcher.index(canonical);
    let matches = matcher.match_two_stage(&candidates, &index, surname_cutoff, name_cutoff);

    let mut merged: BTreeSet<String> = canonical
        .iter()
        .map(|c| c.as_ref().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    let mut added = Vec::new();
    for name in matches.unmatched() {
        let Some(display) = matcher.normalizer().normalize(&name) else {
            continue;
        };
        if merged.insert(display.clone()) {
            added.push(display);
        }
    }

    info!(
        "Reconciled {} unassigned names: {} matched, {} added; canonical {} -> {}",
        candidates.len(),
        matches.matched_count(),
        added.len(),
        canonical.len(),
        merged.len()
    );
    Ok(ReconcileOutcome {
        canonical: merged.into_iter().collect(),
        candidates,
        added,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::Scorer;
    use crate::models::SplitPolicy;
    use crate::normalize::Normalizer;

    fn dataset() -> NameTable {
        NameTable {
            headers: vec!["NOMBRE".into(), "INVESTIGADOR".into()],
            rows: vec![
                vec!["PEREZ,JUAN".into(), "PEREZ,JUAN".into()],
                vec!["PEREZ,JUANN".into(), "".into()],
                vec!["ZAPATA,EMILIANO".into(), "".into()],
                vec!["ZAPATA,EMILIANO".into(), "".into()],
                vec!["SIN COMA".into(), "".into()],
                vec!["".into(), "".into()],
            ],
        }
    }

    fn matcher() -> ResidualMatcher {
        ResidualMatcher::new(Normalizer::default(), Scorer::default(), SplitPolicy::HeuristicFallback)
    }

    #[test]
    fn collects_unassigned_comma_names() {
        let names = unassigned_names(&dataset(), "NOMBRE", "INVESTIGADOR").unwrap();
        assert_eq!(names, vec!["PEREZ,JUANN".to_string(), "ZAPATA,EMILIANO".to_string()]);
    }

    #[test]
    fn unmatched_names_join_the_canonical_list() {
        let canonical = vec!["PEREZ,JUAN".to_string(), "LOPEZ,MARIA".to_string()];
        let out = reconcile(&dataset(), "NOMBRE", "INVESTIGADOR", &canonical, &matcher(), 100, 85).unwrap();
        assert_eq!(out.added, vec!["ZAPATA,EMILIANO".to_string()]);
        assert_eq!(
            out.canonical,
            vec![
                "LOPEZ,MARIA".to_string(),
                "PEREZ,JUAN".to_string(),
                "ZAPATA,EMILIANO".to_string()
            ]
        );
        assert_eq!(out.matches.matched(), vec!["PEREZ,JUANN".to_string()]);
    }

    #[test]
    fn missing_output_column_is_a_config_error() {
        let err = unassigned_names(&dataset(), "NOMBRE", "CANON").unwrap_err();
        assert!(matches!(err, ConfigError::MissingColumn { ref column, .. } if column == "CANON"));
    }
}
