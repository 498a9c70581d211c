//! Pipeline progress log.
//!
//! Every stage reports through one process-wide [`ProgressLog`]. Entries go
//! to stderr, so stdout stays free for command output, and can also be
//! appended to a JSON-lines file (`--log-file`).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Info => "   ",
            Self::Success => "   ✓",
            Self::Warning => "   ⚠️",
            Self::Error => "   ❌",
        }
    }
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth, three spaces per level on the console
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Console form of the entry.
    pub fn render(&self) -> String {
        format!(
            "{}{} {}",
            "   ".repeat(self.indent as usize),
            self.level.prefix(),
            self.message
        )
    }
}

/// Process-wide progress log
pub static PROGRESS_LOG: Lazy<ProgressLog> = Lazy::new(ProgressLog::new);

/// Console log with an optional JSON-lines copy on disk
pub struct ProgressLog {
    file: Mutex<Option<File>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self {
            file: Mutex::new(None),
        }
    }

    /// Print `entry` to stderr and append it to the log file, if any.
    pub fn log(&self, entry: LogEntry) {
        eprintln!("{}", entry.render());

        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                if let Ok(line) = serde_json::to_string(&entry) {
                    let _ = writeln!(file, "{}", line);
                }
            }
        }
    }

    /// Append every following entry to `path`.
    pub fn attach_file(&self, path: &Path) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if let Ok(mut guard) = self.file.lock() {
            *guard = Some(file);
        }
        Ok(())
    }

    pub fn detach_file(&self) {
        if let Ok(mut guard) = self.file.lock() {
            *guard = None;
        }
    }
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    PROGRESS_LOG.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    PROGRESS_LOG.log(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    PROGRESS_LOG.log(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    PROGRESS_LOG.log(LogEntry::new(LogLevel::Error, msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    PROGRESS_LOG.log(LogEntry::new(LogLevel::Info, msg).with_indent(indent));
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    PROGRESS_LOG.log(LogEntry::new(LogLevel::Warning, msg).with_indent(indent));
}
