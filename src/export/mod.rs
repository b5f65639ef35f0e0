pub mod csv_export;

pub use csv_export::{
    CsvPassWriter, export_summary_csv, write_discarded, write_match_results, write_names,
    write_table,
};
