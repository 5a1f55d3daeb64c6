//! Stderr diagnostics in the pipeline's log format.
//!
//! The crate logs through the [`log`] facade with the stage name as the
//! record target; this module renders records as `[LEVEL][name] - message`,
//! one whole line per record under the stderr lock so concurrent stages
//! never interleave bytes within a line. Standard output stays reserved for
//! stage side effects and the shutdown banner.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fmt;
use std::io::{self, Write};

static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn format_line(level: Level, target: &str, args: &fmt::Arguments<'_>) -> String {
    format!("[{}][{}] - {}", level_tag(level), target, args)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), record.target(), record.args());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{line}");
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Install the stderr logger for the process. Idempotent: a second call
/// (another test, an embedding application with its own logger) is a no-op.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_format() {
        let line = format_line(Level::Error, "rotator", &format_args!("transform failed"));
        assert_eq!(line, "[ERROR][rotator] - transform failed");
    }

    #[test]
    fn test_info_format() {
        let line = format_line(Level::Info, "logger", &format_args!("ready"));
        assert_eq!(line, "[INFO][logger] - ready");
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
