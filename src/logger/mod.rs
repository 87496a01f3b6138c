//! Structured logging for the trendguard engine
//!
//! Provides a tag + level logging API with colored console output. Every
//! decision the engine makes (block/allow, exit signals, pauses) goes through
//! this module so the audit trail has one shape.
//!
//! ## Usage
//!
//! ```rust
//! use trendguard::logger::{self, LogTag};
//!
//! logger::info(LogTag::Risk, "Stage 1 passed");
//! logger::warning(LogTag::Storage, "Peak persistence failed, continuing on in-memory state");
//! logger::log(LogTag::Risk, "BLOCKED", "choppy market (ADX 14.2 < 20)");
//! ```
//!
//! Call `logger::init(LogLevel::Info)` once at startup to set the minimum
//! level; until then everything at Info and above is shown.

mod format;
mod levels;
mod tags;

pub use levels::LogLevel;
pub use tags::LogTag;

use std::sync::atomic::{AtomicU8, Ordering};

// Minimum level threshold, encoded as the LogLevel discriminant.
static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Initialize the logger with a minimum level threshold.
///
/// Call once at application startup. Errors are always shown regardless.
pub fn init(min_level: LogLevel) {
    MIN_LEVEL.store(min_level as u8, Ordering::Relaxed);
}

fn should_log(level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }
    (level as u8) <= MIN_LEVEL.load(Ordering::Relaxed)
}

/// Log a tagged event with a free-form event label (e.g. "BLOCKED", "EXIT").
///
/// This is the primary audit-trail entry point: decision events carry an
/// uppercase event label so grep-ing the log for a decision type is trivial.
pub fn log(tag: LogTag, event: &str, message: &str) {
    if should_log(LogLevel::Info) {
        format::format_and_log(tag, event, message);
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    format::format_and_log(tag, "ERROR", message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    if should_log(LogLevel::Warning) {
        format::format_and_log(tag, "WARNING", message);
    }
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    if should_log(LogLevel::Info) {
        format::format_and_log(tag, "INFO", message);
    }
}

/// Log at DEBUG level (hidden unless init'd with Debug)
pub fn debug(tag: LogTag, message: &str) {
    if should_log(LogLevel::Debug) {
        format::format_and_log(tag, "DEBUG", message);
    }
}
