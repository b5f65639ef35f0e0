use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Parsed `KEY=value` pairs plus the 1-based numbers of lines that had no `=`.
#[derive(Debug, Default)]
pub struct EnvFile {
    pub vars: HashMap<String, String>,
    pub rejected: Vec<usize>,
}

/// Blank lines and `#` comments are ignored, a leading `export ` is allowed,
/// and one pair of matching surrounding quotes is removed.
pub fn parse_env(content: &str) -> EnvFile {
    let mut out = EnvFile::default();
    for (idx, line) in content.lines().enumerate() {
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((key, val)) = s.split_once('=') else {
            out.rejected.push(idx + 1);
            continue;
        };
        out.vars.insert(key.trim().to_string(), unquote(val.trim()).to_string());
    }
    out
}

fn unquote(val: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = val.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner;
        }
    }
    val
}

/// Read and parse an env file; a missing file yields no variables.
/// Does not modify the process environment.
pub fn parse_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let parsed = parse_env(&content);
    for line in &parsed.rejected {
        // logging is not up yet when the env file is read
        eprintln!(
            "Warning: ignoring {} line {} without '='",
            path.display(),
            line
        );
    }
    Ok(parsed.vars)
}

/// Load `.env` from the working directory. Existing variables are not overridden.
pub fn load_dotenv_if_present() -> Result<()> {
    for (k, v) in parse_env_file(Path::new(".env"))? {
        if std::env::var_os(&k).is_none() {
            unsafe {
                std::env::set_var(&k, &v);
            }
        }
    }
    Ok(())
}

/// Write a commented `.env.template` listing every `NAME_CANON_*` variable.
pub fn write_env_template(path: &Path) -> Result<()> {
    let mut f = fs::File::create(path)?;
    let template = r#"# name_canon environment configuration template
# Copy this file to .env and uncomment what you need.
# Command-line flags take precedence over these values.

# Columns
#NAME_CANON_NAME_COLUMN=NOMBRE DEL INVESTIGADOR
#NAME_CANON_OUTPUT_COLUMN=INVESTIGADOR

# Matching (0-100)
#NAME_CANON_THRESHOLDS=85,75
#NAME_CANON_RESIDUAL_CUTOFF=85
#NAME_CANON_ASSIGN_CUTOFF=75
#NAME_CANON_SURNAME_CUTOFF=100
#NAME_CANON_NAME_CUTOFF=85
#NAME_CANON_METRIC=ratio
#NAME_CANON_SPLIT_POLICY=heuristic-fallback

# Two-column bad,good CSV replacing the built-in glyph substitutions
#NAME_CANON_SUBSTITUTIONS=substitutions.csv

# Performance
#NAME_CANON_THREADS=8
#NAME_CANON_PARALLEL_SEEDS=256

# Logging (overrides -v/-q)
#RUST_LOG=info
"#;
    f.write_all(template.as_bytes())?;
    Ok(())
}
