use name_canon::PipelineConfig;
use name_canon::error::ConfigError;
use name_canon::ingest::{read_name_column, read_table};
use name_canon::orchestrator::{
    ASSIGNED_FILE, CANONICAL_FILE, DISCARDED_FILE, Orchestrator, SUMMARY_FILE, UNMATCHED_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const NAME: &str = "NOMBRE DEL INVESTIGADOR";

fn write(dir: &Path, file: &str, body: &str) -> PathBuf {
    let p = dir.join(file);
    fs::write(&p, body).unwrap();
    p
}

fn yearly_inputs(dir: &Path) -> Vec<PathBuf> {
    let a = write(
        dir,
        "2021.csv",
        "NOMBRE DEL INVESTIGADOR,AREA\n\
         \"PEREZ GOMEZ, JUAN\",I\n\
         \"Pérez Gómez, Juan\",I\n\
         \"PEREZ GOMEZ,JUAN CARLOS\",II\n\
         \"LOPEZ,MARIA\",III\n\
         AARON TORRES HUERTA,IV\n\
         ,V\n",
    );
    let b = write(
        dir,
        "2022.csv",
        "ANIO,NOMBRE DEL INVESTIGADOR\n\
         2022,\"MU;OZ,ANA\"\n\
         2022,\"MUÑOZ,ANA\"\n\
         2022,\"TORRES HUERTA,AARON\"\n\
         2022,\"ZAPATA#,EMILIANO\"\n",
    );
    vec![a, b]
}

#[test]
fn full_run_writes_every_artifact() {
    let dir = tempdir().unwrap();
    let inputs = yearly_inputs(dir.path());
    let out_dir = dir.path().join("out");
    let cfg = PipelineConfig::default();
    let report = Orchestrator::new(&cfg).unwrap().run(&inputs, &out_dir).unwrap();

    for file in [
        "pass_1_t85.csv",
        "pass_2_t75.csv",
        DISCARDED_FILE,
        CANONICAL_FILE,
        ASSIGNED_FILE,
        UNMATCHED_FILE,
        SUMMARY_FILE,
    ] {
        assert!(out_dir.join(file).exists(), "missing {}", file);
    }
    assert_eq!(report.artifacts.passes.len(), 2);
    assert_eq!(report.summary.input_rows, 10);

    // the first pass keeps JUAN apart from JUAN CARLOS (82), the second joins them
    let pass1 = read_name_column(&out_dir.join("pass_1_t85.csv"), NAME).unwrap();
    assert_eq!(pass1.len(), 5);
    let pass2 = read_name_column(&out_dir.join("pass_2_t75.csv"), NAME).unwrap();
    assert_eq!(
        pass2,
        vec!["LOPEZ,MARIA", "MUNOZ,ANA", "PEREZ GOMEZ,JUAN CARLOS", "TORRES HUERTA,AARON"]
    );

    // the only unassigned comma name has no surname in the list and is added
    assert_eq!(
        report.canonical,
        vec![
            "LOPEZ,MARIA",
            "MUNOZ,ANA",
            "PEREZ GOMEZ,JUAN CARLOS",
            "TORRES HUERTA,AARON",
            "ZAPATA#,EMILIANO"
        ]
    );
    assert_eq!(read_name_column(&out_dir.join(CANONICAL_FILE), NAME).unwrap(), report.canonical);

    // reordering recovers AARON TORRES HUERTA; the invalid-character name stays unmatched
    assert_eq!(report.unmatched, vec!["ZAPATA#,EMILIANO"]);
    assert_eq!(
        read_name_column(&out_dir.join(UNMATCHED_FILE), NAME).unwrap(),
        report.unmatched
    );
}

#[test]
fn assigned_dataset_keeps_rows_and_inserts_the_output_column() {
    let dir = tempdir().unwrap();
    let inputs = yearly_inputs(dir.path());
    let out_dir = dir.path().join("out");
    let cfg = PipelineConfig::default();
    Orchestrator::new(&cfg).unwrap().run(&inputs, &out_dir).unwrap();

    let assigned = read_table(&out_dir.join(ASSIGNED_FILE)).unwrap();
    assert_eq!(assigned.headers, vec![NAME, "INVESTIGADOR", "AREA", "ANIO"]);
    assert_eq!(assigned.len(), 10);
    let col = assigned.column_index("INVESTIGADOR").unwrap();
    let got: Vec<&str> = assigned.rows.iter().map(|r| r[col].as_str()).collect();
    assert_eq!(
        got,
        vec![
            "PEREZ GOMEZ,JUAN CARLOS",
            "PEREZ GOMEZ,JUAN CARLOS",
            "PEREZ GOMEZ,JUAN CARLOS",
            "LOPEZ,MARIA",
            "",
            "",
            "MUNOZ,ANA",
            "MUNOZ,ANA",
            "TORRES HUERTA,AARON",
            "",
        ]
    );
    // other columns pass through untouched
    assert_eq!(assigned.rows[4][0], "AARON TORRES HUERTA");
    assert_eq!(assigned.rows[6][3], "2022");
}

#[test]
fn missing_name_column_is_a_config_error() {
    let dir = tempdir().unwrap();
    let bad = write(dir.path(), "bad.csv", "NOMBRE,AREA\n\"PEREZ,JUAN\",I\n");
    let cfg = PipelineConfig::default();
    let err = Orchestrator::new(&cfg)
        .unwrap()
        .run(&[bad], &dir.path().join("out"))
        .unwrap_err();
    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::MissingColumn { column, .. }) => assert_eq!(column, NAME),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!dir.path().join("out").join(SUMMARY_FILE).exists());
}

#[test]
fn invalid_config_is_rejected_before_any_work() {
    let cfg = PipelineConfig {
        thresholds: Vec::new(),
        ..Default::default()
    };
    assert!(Orchestrator::new(&cfg).is_err());
}

#[test]
fn residual_stage_recovers_reordered_names() {
    let dir = tempdir().unwrap();
    let query = write(
        dir.path(),
        "query.csv",
        "NOMBRE DEL INVESTIGADOR\nAARON TORRES HUERTA\nZAPATA EMILIANO\n",
    );
    let canonical = write(
        dir.path(),
        "canonical.csv",
        "NOMBRE DEL INVESTIGADOR\n\"TORRES HUERTA,AARON\"\n\"LOPEZ,MARIA\"\n",
    );
    let out = dir.path().join("matched.csv");
    let cfg = PipelineConfig::default();
    let res = Orchestrator::new(&cfg)
        .unwrap()
        .residual(&query, &canonical, &out, 85)
        .unwrap();
    assert_eq!(res.recovered, 1);
    assert_eq!(res.outcome.matched(), vec!["AARON TORRES HUERTA"]);
    assert_eq!(res.outcome.unmatched(), vec!["ZAPATA EMILIANO"]);
    assert!(out.exists());
}
