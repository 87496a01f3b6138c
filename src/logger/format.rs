//! Log formatting and output with ANSI colors
//!
//! Handles colorized console output with aligned tag and event columns, and
//! broken-pipe safe writes for piped invocations.

use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const EVENT_WIDTH: usize = 18;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, event: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        format_tag(&tag),
        format_event(event),
        message
    );

    print_stdout_safe(&line);
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.as_str(), width = TAG_WIDTH);
    match tag {
        LogTag::Engine => padded.bright_cyan().bold(),
        LogTag::Indicators => padded.bright_blue().bold(),
        LogTag::Regime => padded.bright_magenta().bold(),
        LogTag::Risk => padded.bright_yellow().bold(),
        LogTag::Tracker => padded.bright_green().bold(),
        LogTag::Capital => padded.bright_red().bold(),
        LogTag::Storage => padded.bright_white().bold(),
        LogTag::Feed => padded.cyan().bold(),
    }
}

/// Format the event column; block/error events get red, allow/pass green
fn format_event(event: &str) -> ColoredString {
    let padded = format!("{:<width$}", event, width = EVENT_WIDTH);
    if event.contains("BLOCK") || event.contains("ERROR") || event.contains("FAIL") {
        padded.red().bold()
    } else if event.contains("PASS") || event.contains("ALLOW") || event.contains("OK") {
        padded.green().bold()
    } else if event.contains("WARN") {
        padded.yellow().bold()
    } else {
        padded.normal()
    }
}

/// Write to stdout, ignoring broken pipes when output is piped
fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() == ErrorKind::BrokenPipe {
            return;
        }
    }
    let _ = out.flush();
}
