/// Structured logging for the sargassum risk service
///
/// Provides context-rich logging with component and beach identifiers,
/// timestamps, and severity levels. Supports both console output
/// and file-based logging for scheduled batch runs.

use crate::model::{PersistenceError, SnapshotError};
use crate::pipeline::PipelineSummary;
use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Registry,
    Snapshots,
    Scorer,
    Scores,
    Pipeline,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Registry => write!(f, "REG"),
            Component::Snapshots => write!(f, "SNAP"),
            Component::Scorer => write!(f, "SCORE"),
            Component::Scores => write!(f, "DB"),
            Component::Pipeline => write!(f, "PIPE"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. the simulation stopped short of this horizon
    Expected,
    /// Unexpected failure - indicates storage degradation or a broken upstream adapter
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, component: Component, beach: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let beach_part = beach.map(|b| format!(" [{}]", b)).unwrap_or_default();
        let log_entry = format_entry(
            &Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            level,
            component,
            &beach_part,
            message,
        );

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, beach_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, beach_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", component, beach_part, message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

fn format_entry(
    timestamp: &str,
    level: LogLevel,
    component: Component,
    beach_part: &str,
    message: &str,
) -> String {
    format!("{} {} {}{}: {}", timestamp, level, component, beach_part, message)
}

fn emit(level: LogLevel, component: Component, beach: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, beach, message);
        }
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

/// Log a general informational message
pub fn info(component: Component, beach: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, beach, message);
}

/// Log a warning message
pub fn warn(component: Component, beach: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, beach, message);
}

/// Log an error message
pub fn error(component: Component, beach: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, beach, message);
}

/// Log a debug message
pub fn debug(component: Component, beach: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, beach, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a snapshot fetch failure.
///
/// A missing horizon is routine (short simulations, particles beached early);
/// storage errors are not.
pub fn classify_snapshot_failure(err: &SnapshotError) -> FailureType {
    match err {
        SnapshotError::NotFound { .. } => FailureType::Expected,
        SnapshotError::Database(_) => FailureType::Unexpected,
        SnapshotError::Invalid { .. } | SnapshotError::NoRuns => FailureType::Unknown,
    }
}

/// Classify a score write failure. Every persistence failure fails the run.
pub fn classify_persistence_failure(err: &PersistenceError) -> FailureType {
    match err {
        PersistenceError::Database(msg) if msg.contains("timeout") => FailureType::Unknown,
        _ => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a snapshot failure with automatic classification
pub fn log_snapshot_failure(run_id: &str, day_offset: u8, err: &SnapshotError) {
    let failure_type = classify_snapshot_failure(err);
    let message = format!(
        "snapshot {} j+{} skipped [{}]: {}",
        run_id, day_offset, failure_type, err
    );

    match failure_type {
        FailureType::Expected => warn(Component::Snapshots, None, &message),
        FailureType::Unexpected => error(Component::Snapshots, None, &message),
        FailureType::Unknown => warn(Component::Snapshots, None, &message),
    }
}

/// Log a failed upsert for one beach/day
pub fn log_persistence_failure(beach: &str, day_offset: u8, err: &PersistenceError) {
    let failure_type = classify_persistence_failure(err);
    let message = format!("upsert j+{} failed [{}]: {}", day_offset, failure_type, err);
    error(Component::Scores, Some(beach), &message);
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one scoring run
pub fn log_pipeline_summary(summary: &PipelineSummary) {
    let message = format!(
        "Scoring run {} complete: {}/{} stored, {} failed, {} skipped (days scored: {:?}, skipped: {:?})",
        summary.run_id,
        summary.succeeded,
        summary.expected,
        summary.failed,
        summary.skipped,
        summary.scored_days,
        summary.skipped_days
    );

    if summary.failed == 0 && summary.skipped == 0 {
        info(Component::Pipeline, None, &message);
    } else if summary.succeeded == 0 {
        error(Component::Pipeline, None, &message);
    } else {
        warn(Component::Pipeline, None, &message);
    }
}
