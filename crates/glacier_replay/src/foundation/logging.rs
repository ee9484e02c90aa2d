//! Log setup for the replayer
//!
//! Replays usually run headless under a launcher, so besides the normal
//! stderr path the log can be redirected to a file named by
//! `GLACIER_LOG_PATH`.

use std::env;
use std::fs::OpenOptions;

use env_logger::{Env, Target};

/// Environment variable naming a file that receives all log output.
pub const LOG_PATH_ENV: &str = "GLACIER_LOG_PATH";

/// Initialize the logging system.
///
/// Defaults to info level so replay summaries are visible; `RUST_LOG`
/// overrides as usual. When `GLACIER_LOG_PATH` is set, log lines are appended
/// to that file instead of stderr.
pub fn init() {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Ok(path) = env::var(LOG_PATH_ENV) {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(err) => eprintln!("could not open log file {path}: {err}"),
        }
    }
    // Tests and embedders may have installed a logger already.
    let _ = builder.try_init();
}
