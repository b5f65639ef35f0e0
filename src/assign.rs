//! Attach a canonical name to every row of a dataset.

use crate::error::ConfigError;
use crate::matching::{CanonicalIndex, ResidualMatcher, fan_out};
use crate::models::{NameTable, Score};
use log::{debug, info};
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct AssignOutcome {
    pub table: NameTable,
    pub matched: usize,
    pub unmatched: usize,
    /// Rows with a missing or blank name; passed through with an empty assignment.
    pub skipped: usize,
    pub failures: usize,
}

/// Best canonical match for each row's `name_column`, written into
/// `output_column` directly after it (empty when unmatched). A pre-existing
/// `output_column` is replaced. Row order is preserved.
pub fn assign(
    table: &NameTable,
    name_column: &str,
    output_column: &str,
    matcher: &ResidualMatcher,
    index: &CanonicalIndex,
    cutoff: Score,
) -> Result<AssignOutcome, ConfigError> {
    let start = Instant::now();
    let mut base = table.clone();
    if let Some(old) = base.column_index(output_column) {
        debug!("replacing existing column {:?}", output_column);
        base.headers.remove(old);
        for row in &mut base.rows {
            if old < row.len() {
                row.remove(old);
            }
        }
    }
    let col = base
        .column_index(name_column)
        .ok_or_else(|| ConfigError::MissingColumn {
            path: "dataset".to_string(),
            column: name_column.to_string(),
        })?;

    let names: Vec<Option<&str>> = (0..base.len())
        .map(|r| {
            base.value(r, col)
                .filter(|n| matcher.normalizer().normalize(n).is_some())
        })
        .collect();
    let results = fan_out(&names, |name| {
        name.and_then(|n| matcher.best_for(n, index, cutoff))
    });
    let present: Vec<bool> = names.iter().map(Option::is_some).collect();
    let skipped = present.iter().filter(|p| !**p).count();

    let mut outcome = AssignOutcome {
        skipped,
        ..Default::default()
    };
    let mut headers = base.headers.clone();
    headers.insert(col + 1, output_column.to_string());
    let width = headers.len();
    let mut out = NameTable::new(headers);
    for ((mut row, present), res) in base.rows.into_iter().zip(present).zip(results) {
        let assigned = match res {
            Ok(Some((canonical, _))) => {
                outcome.matched += 1;
                canonical
            }
            Ok(None) => {
                if present {
                    outcome.unmatched += 1;
                }
                String::new()
            }
            Err(_) => {
                outcome.failures += 1;
                outcome.unmatched += 1;
                String::new()
            }
        };
        if row.len() <= col {
            row.resize(col + 1, String::new());
        }
        row.insert(col + 1, assigned);
        if row.len() < width {
            row.resize(width, String::new());
        }
        out.rows.push(row);
    }
    outcome.table = out;

    info!(
        "Assigned {} rows against {} canonical at cutoff {}: matched={} unmatched={} skipped={} failures={} in {:.2?}",
        outcome.table.len(),
        index.len(),
        cutoff,
        outcome.matched,
        outcome.unmatched,
        outcome.skipped,
        outcome.failures,
        start.elapsed()
    );
    Ok(outcome)
}
