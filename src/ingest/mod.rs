pub mod csv_ingest;

pub use csv_ingest::{load_substitutions, read_name_column, read_table, read_tables};
