//! Host log forwarding.
//!
//! The audio core logs through `tracing`; a [`LoggerSink`] receives a copy
//! of each event as a [`LogEntry`] so the embedding engine can show it in
//! its own console or log file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{error::Result, platform::PlatformSendSync};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One forwarded log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Emitting module, e.g. `core_playback::manager`.
    pub target: String,
    pub message: String,
    /// Event fields after sanitising (`channel`, `clip`, `backend`, ...).
    pub fields: HashMap<String, String>,
    /// Name of the innermost span the event was recorded in.
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The channel an audio event concerns, when it names one.
    pub fn channel(&self) -> Option<&str> {
        self.fields.get("channel").map(String::as_str)
    }
}

/// Receiver for forwarded core logs.
///
/// ```ignore
/// struct EngineConsole;
///
/// #[async_trait::async_trait]
/// impl LoggerSink for EngineConsole {
///     async fn log(&self, entry: LogEntry) -> Result<()> {
///         engine::console_print(entry.channel().unwrap_or("-"), &entry.message);
///         Ok(())
///     }
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait LoggerSink: PlatformSendSync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Events below this level are dropped before an entry is built.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_exposes_channel_field() {
        let entry = LogEntry::new(LogLevel::Info, "core_playback::manager", "Audio play")
            .with_field("channel", "music")
            .with_field("clip", "Theme1");

        assert_eq!(entry.channel(), Some("music"));
        assert_eq!(entry.fields.get("clip").map(String::as_str), Some("Theme1"));
        assert!(entry.span.is_none());
    }

    #[test]
    fn test_entry_without_channel() {
        let entry = LogEntry::new(LogLevel::Warn, "core_playback::registry", "Preload failed");
        assert_eq!(entry.channel(), None);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
