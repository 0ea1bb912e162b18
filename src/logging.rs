//! Logging setup on the `log` facade with an `env_logger` backend.
//!
//! Level selection, highest priority first:
//!
//! 1. `RUST_LOG`, if set
//! 2. `--quiet` (errors only) or `-v` / `-vv` (debug / trace)
//! 3. info
//!
//! The long-running `serve` command logs one line per sync pass, so records
//! always carry a timestamp. Debug builds and verbose runs also show the
//! emitting module; background threads are identified by name.
//!
//! ```rust,no_run
//! use gallery_sync::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("cache loaded");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;
use std::thread;

/// Initialize the global logger from the CLI verbosity flags.
///
/// Calling it twice is harmless: the second logger is simply not installed.
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var("RUST_LOG").ok();

    let mut builder = Builder::new();
    match &from_env {
        Some(_) => {
            builder.parse_default_env();
        }
        None => {
            builder.filter_level(determine_level(verbose, quiet));
        }
    }
    configure_format(&mut builder, show_module_path(verbose));

    if builder.try_init().is_err() {
        return;
    }

    match from_env {
        Some(filter) => log::debug!("Logging configured from RUST_LOG={filter}"),
        None => log::debug!("Logging initialized at level {}", current_level_name()),
    }
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn show_module_path(verbose: u8) -> bool {
    cfg!(debug_assertions) || verbose > 0
}

fn configure_format(builder: &mut Builder, with_module: bool) {
    builder.format(move |buf, record| {
        let timestamp = buf.timestamp_seconds();
        let level = record.level();
        let style = buf.default_level_style(level);

        // The scheduler runs on a named thread; tag its lines.
        let current = thread::current();
        let origin = match current.name() {
            Some("main") | None => String::new(),
            Some(name) => format!(" ({name})"),
        };

        if with_module {
            writeln!(
                buf,
                "{timestamp} {style}{level:<5}{style:#} [{}]{origin} {}",
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{timestamp} {style}{level:<5}{style:#}{origin} {}",
                record.args()
            )
        }
    });
}

/// The active maximum level, lowercase.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
