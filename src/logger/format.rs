//! Log formatting and output with ANSI colors
//!
//! Handles:
//! - Colorized console output with tag and level formatting
//! - Dual output (console + file)
//! - Broken pipe handling for piped commands

use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stderr, stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LOG_TYPE_WIDTH: usize = 8;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string().dimmed();

    let line = format!(
        "{} [{}] [{}] {}",
        time,
        format_tag(&tag),
        format_log_type(level),
        message
    );

    // Errors and warnings go to stderr so command output stays pipeable
    if level <= LogLevel::Warning {
        print_safe(&mut stderr(), &line);
    } else {
        print_safe(&mut stdout(), &line);
    }

    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    write_to_file(&format!(
        "{} [{}] [{}] {}",
        timestamp,
        tag.to_plain_string(),
        level.as_str(),
        message
    ));
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Config => padded.bright_white().bold(),
        LogTag::Rpc => padded.bright_cyan().bold(),
        LogTag::Registry => padded.bright_blue().bold(),
        LogTag::Balances => padded.bright_green().bold(),
        LogTag::Quote => padded.bright_purple().bold(),
        LogTag::Swap => padded.bright_magenta().bold(),
        LogTag::Transfer => padded.bright_magenta().bold(),
        LogTag::Wallet => padded.bright_magenta().bold(),
        LogTag::Settlement => padded.bright_cyan().bold(),
    }
}

/// Format log level with appropriate color
fn format_log_type(level: LogLevel) -> ColoredString {
    let padded = format!("{:<width$}", level.as_str(), width = LOG_TYPE_WIDTH);
    match level {
        LogLevel::Error => padded.bright_red().bold(),
        LogLevel::Warning => padded.bright_yellow().bold(),
        LogLevel::Info => padded.bright_green(),
        LogLevel::Debug => padded.bright_blue(),
        LogLevel::Verbose => padded.dimmed(),
    }
}

/// Write a line but exit quietly on a broken pipe
fn print_safe<W: Write>(out: &mut W, message: &str) {
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
    let _ = out.flush();
}
