use crate::error::ConfigError;
use crate::models::NameTable;
use crate::normalize::{Substitution, SubstitutionTable};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn open(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(ConfigError::MissingInput {
            path: path.display().to_string(),
        }
        .into());
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::with_capacity(512 * 1024, file))
}

/// Read a headed CSV file. Short rows are padded and long rows truncated to the header width.
pub fn read_table(path: &Path) -> Result<NameTable> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(open(path)?);
    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            // utf-8-sig exports carry a BOM in front of the first header
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();
    let width = headers.len();
    let mut table = NameTable::new(headers);
    let mut reshaped = 0usize;
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("{}: record {}", path.display(), line + 1))?;
        let mut row: Vec<String> = rec.iter().map(|v| v.to_string()).collect();
        if row.len() != width {
            reshaped += 1;
            row.resize(width, String::new());
        }
        table.rows.push(row);
    }
    if reshaped > 0 {
        debug!("{}: {} rows padded or truncated to {} columns", path.display(), reshaped, width);
    }
    info!("Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Read several files into one table. Headers are the union in first-seen
/// order; every file must carry `required_column`.
pub fn read_tables<P: AsRef<Path>>(paths: &[P], required_column: &str) -> Result<NameTable> {
    let mut merged = NameTable::default();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for path in paths {
        let path = path.as_ref();
        let t = read_table(path)?;
        if t.column_index(required_column).is_none() {
            return Err(ConfigError::MissingColumn {
                path: path.display().to_string(),
                column: required_column.to_string(),
            }
            .into());
        }
        let mapping: Vec<usize> = t
            .headers
            .iter()
            .map(|h| {
                *positions.entry(h.clone()).or_insert_with(|| {
                    merged.headers.push(h.clone());
                    merged.headers.len() - 1
                })
            })
            .collect();
        for row in t.rows {
            let mut out = vec![String::new(); merged.headers.len()];
            for (v, &dst) in row.into_iter().zip(&mapping) {
                out[dst] = v;
            }
            merged.rows.push(out);
        }
    }
    let width = merged.headers.len();
    for row in &mut merged.rows {
        row.resize(width, String::new());
    }
    Ok(merged)
}

/// Every value of `column`, blanks included, in file order.
pub fn read_name_column(path: &Path, column: &str) -> Result<Vec<String>> {
    let table = read_table(path)?;
    let col = table
        .column_index(column)
        .ok_or_else(|| ConfigError::MissingColumn {
            path: path.display().to_string(),
            column: column.to_string(),
        })?;
    Ok(table.rows.into_iter().map(|mut r| std::mem::take(&mut r[col])).collect())
}

/// Two-column `bad,good` file replacing the built-in substitution table.
pub fn load_substitutions(path: &Path) -> Result<SubstitutionTable> {
    let mut rdr = ReaderBuilder::new().from_reader(open(path)?);
    let mut pairs = Vec::new();
    for rec in rdr.deserialize::<Substitution>() {
        let s = rec.with_context(|| format!("parsing substitutions in {}", path.display()))?;
        if s.bad.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "substitutions",
                reason: format!("empty pattern in {}", path.display()),
            }
            .into());
        }
        pairs.push((s.bad, s.good));
    }
    info!("Loaded {} substitutions from {}", pairs.len(), path.display());
    Ok(SubstitutionTable::from_pairs(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_bom_and_pads_short_rows() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("a.csv");
        fs::write(&p, "\u{feff}NOMBRE, AREA\nPEREZ,JUAN\n\"PEREZ,JUAN\",II,extra\nLOPEZ\n").unwrap();
        let t = read_table(&p).unwrap();
        assert_eq!(t.headers, vec!["NOMBRE", "AREA"]);
        assert_eq!(t.rows[0], vec!["PEREZ", "JUAN"]);
        assert_eq!(t.rows[1], vec!["PEREZ,JUAN", "II"]);
        assert_eq!(t.rows[2], vec!["LOPEZ", ""]);
    }

    #[test]
    fn merges_by_header_union() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("2021.csv");
        let b = dir.path().join("2022.csv");
        fs::write(&a, "NOMBRE,AREA\nA,1\n").unwrap();
        fs::write(&b, "NIVEL,NOMBRE\nSNI,B\n").unwrap();
        let t = read_tables(&[a, b], "NOMBRE").unwrap();
        assert_eq!(t.headers, vec!["NOMBRE", "AREA", "NIVEL"]);
        assert_eq!(t.rows, vec![vec!["A", "1", ""], vec!["B", "", "SNI"]]);
    }

    #[test]
    fn missing_column_and_missing_file_are_config_errors() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.csv");
        fs::write(&a, "X\n1\n").unwrap();
        let err = read_tables(&[&a], "NOMBRE").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingColumn { .. })
        ));
        let err = read_table(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingInput { .. })
        ));
    }

    #[test]
    fn substitutions_from_csv() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("subs.csv");
        fs::write(&p, "bad,good\n#,Ñ\n\"|\",I\n").unwrap();
        let table = load_substitutions(&p).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.pairs()[0].bad, "#");
        assert_eq!(table.pairs()[1].good, "I");
    }

    #[test]
    fn name_column_keeps_blanks() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("n.csv");
        fs::write(&p, "ID,NOMBRE\n1,A\n2,\n").unwrap();
        assert_eq!(read_name_column(&p, "NOMBRE").unwrap(), vec!["A", ""]);
    }
}
