//! Generic logger utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use conquer_once::OnceCell;
use log::{self, info};
use std::path::Path;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static LOG_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, thiserror::Error)]
pub enum LoggerInitError {
    #[error("Cannot create the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("Cannot register the logger: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Output is written to stdout, and to `log_file_path` if one is given.
/// Subsequent calls are no-ops so that test binaries may initialise freely.
pub fn logger_init(
    min_level: LevelFilter,
    log_file_path: Option<&Path>,
) -> Result<(), LoggerInitError> {
    // First caller sets the epoch, anyone after that has nothing to do
    if LOG_EPOCH.try_init_once(Utc::now).is_err() {
        return Ok(());
    }

    // Setup the logger using fern's builder pattern
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            // If debug or trace include the target, otherwise don't include it
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    elapsed_seconds(),
                    level_to_str(record.level()),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    elapsed_seconds(),
                    level_to_str(record.level()),
                    message
                ))
            }
        })
        .level(min_level)
        .chain(std::io::stdout());

    if let Some(path) = log_file_path {
        dispatch = dispatch.chain(
            fern::log_file(path).map_err(LoggerInitError::LogFileInitError)?,
        );
    }

    dispatch.apply().map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Log level: {:?}", min_level);
    if let Some(path) = log_file_path {
        info!("    Log file path: {:?}", path);
    }

    Ok(())
}

/// Seconds elapsed since the logger was initialised.
pub fn elapsed_seconds() -> f64 {
    match LOG_EPOCH.get() {
        Some(epoch) => {
            let elapsed = Utc::now() - *epoch;
            elapsed.num_milliseconds() as f64 / 1000.0
        }
        None => 0.0,
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the string representation of a log level.
///
/// Levels are padded to a fixed width so the message column stays aligned.
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRACE".dimmed(),
        log::Level::Debug => "DEBUG".blue(),
        log::Level::Info => "INFO ".green(),
        log::Level::Warn => "WARN ".yellow().bold(),
        log::Level::Error => "ERROR".red().bold(),
    }
}
