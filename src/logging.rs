//! This module contains the global logger instance used by the `log` crate.

use std::io::Write;

/// The static API for the logger.
pub static LOGGER_API: LockedLogger = LockedLogger;

/// An API that writes every record to a locked standard error.
///
/// It is used to interface with the `log` crate.
pub struct LockedLogger;

impl log::Log for LockedLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        if cfg!(debug_assertions) {
            true
        } else {
            metadata.level() <= log::Level::Info
        }
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "[{:5}] {}", record.level(), record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

pub fn init() -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER_API)?;
    log::set_max_level(if cfg!(debug_assertions) {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    });
    Ok(())
}
