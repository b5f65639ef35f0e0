use env_logger::Env;

/// Default filter for a net `-v`/`-q` count. `RUST_LOG` still wins when set.
pub fn default_filter(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub fn init_logging(verbosity: i8) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter(verbosity)))
        .format_timestamp_millis()
        .try_init();
}
