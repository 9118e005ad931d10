//! Request-scoped diagnostic log.
//!
//! Every bibliography request carries its own [`RequestLog`]. Events are
//! mirrored to the process log through `tracing` and buffered so they can be
//! returned to the caller as a commented block ahead of the bibliography.

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::Mutex;

/// Severity of a request log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single recorded event
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub at: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

/// Event buffer for one inbound request.
///
/// Shared by reference between the concurrent fetches of a request, hence the
/// mutex. Debug events go to `tracing` only; everything from INFO up is kept.
#[derive(Debug, Default)]
pub struct RequestLog {
    events: Mutex<Vec<LogEvent>>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{}", message);
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.push(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.push(LogLevel::Error, message);
    }

    fn push(&self, level: LogLevel, message: String) {
        let event = LogEvent {
            at: Local::now(),
            level,
            message,
        };
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEvent>> {
        // a panic while holding the lock only loses log lines
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().clone()
    }

    /// Whether any recorded message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|e| e.message.contains(needle))
    }

    /// Render as plain lines: `<timestamp> <LEVEL> | <message>`
    pub fn render(&self) -> String {
        let mut out = String::new();
        for event in self.lock().iter() {
            out.push_str(&format!(
                "{} {:>7} | {}\n",
                event.at.format("%Y-%m-%d %H:%M:%S,%3f"),
                event.level,
                event.message
            ));
        }
        out
    }

    /// Render with every non-blank line prefixed by `% `, the BibTeX comment marker
    pub fn render_commented(&self) -> String {
        comment_lines(&self.render())
    }
}

/// Prefix every non-blank line with `% `
pub fn comment_lines(text: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("% {}", line)
            }
        })
        .collect()
}
