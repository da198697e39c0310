//! # Logging & Tracing Infrastructure
//!
//! Wires `tracing-subscriber` for the audio core and mirrors events to an
//! optional host [`LoggerSink`].
//!
//! Three output formats are available (pretty, JSON, compact). Unless a
//! custom filter is given, the workspace crates log at the configured level
//! while codec and HTTP dependencies stay at `warn`.
//!
//! Events forwarded to a sink are sanitised first:
//! - fields that may carry key material (`key`, `token`, `secret`, ...) are
//!   replaced with `[REDACTED]`
//! - path-like fields (`path`, `file`, `dir`) keep only the file name, so a
//!   player's home directory never reaches the host log
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{LoggingConfig, LogFormat, init_logging};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::audio_debug()
//!     .with_format(LogFormat::Compact)
//!     .with_logger_sink(Arc::new(EngineConsole));
//!
//! init_logging(config)?;
//! tracing::info!(channel = "music", clip = "Theme1", "Audio play");
//! ```

use crate::error::{Error, Result};

use bridge_traits::logger::{LogEntry, LogLevel, LoggerSink};

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Crates whose level follows [`LoggingConfig::level`] in the default filter.
const CORE_TARGETS: &[&str] = &[
    "core_runtime",
    "core_playback",
    "bridge_desktop",
    "bridge_traits",
    "stream_audio_core",
];

/// Dependencies that are only interesting when they fail.
const QUIET_TARGETS: &[&str] = &["symphonia", "h2", "hyper", "reqwest", "rustls"];

const SENSITIVE_FIELDS: &[&str] = &["key", "token", "password", "secret", "authorization"];

const PATH_FIELDS: &[&str] = &["path", "file", "dir"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line, coloured
    Pretty,
    /// One JSON object per event
    Json,
    /// Single-line output for frame-loop heavy sessions
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the default filter
    pub filter: Option<String>,
    /// Host logger receiving a sanitised copy of every event
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Emit span enter/exit events (the async asset load path is instrumented)
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
            display_thread_info: false,
        }
    }
}

impl LoggingConfig {
    /// Preset for diagnosing playback: debug level with load spans.
    ///
    /// Pair with `AudioSettings::debug_logging` to see every channel
    /// transition.
    pub fn audio_debug() -> Self {
        Self {
            level: LogLevel::Debug,
            enable_spans: true,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.enable_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// `Error::Config` if a subscriber is already installed or the filter does
/// not parse.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(LoggerSinkLayer::new(config.logger_sink.clone()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_thread_ids(config.display_thread_info)
        .with_thread_names(config.display_thread_info)
        .with_span_events(config.span_events())
        .with_writer(io::stdout);

    let result = match config.format {
        LogFormat::Pretty => registry.with(fmt_layer.pretty()).try_init(),
        LogFormat::Json => registry
            .with(
                fmt_layer
                    .json()
                    .flatten_event(true)
                    .with_current_span(config.enable_spans),
            )
            .try_init(),
        LogFormat::Compact => registry.with(fmt_layer.compact()).try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(custom) => custom.clone(),
        None => {
            let level = level_directive(config.level);
            CORE_TARGETS
                .iter()
                .map(|target| format!("{}={}", target, level))
                .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
                .collect::<Vec<_>>()
                .join(",")
        }
    };

    EnvFilter::try_new(directives).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Mirrors events into a [`LoggerSink`].
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = LogLevel::from_tracing(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields.message.unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (name, value) in fields.fields {
            let value = sanitize_field(name, &value);
            entry = entry.with_field(name, value);
        }
        entry.span = ctx.lookup_current().map(|span| span.name().to_string());

        deliver(Arc::clone(sink), entry);
    }
}

/// Hand the entry to the sink without blocking the frame loop when a Tokio
/// runtime is available.
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
        }
        Err(_) => {
            if let Err(err) = futures::executor::block_on(sink.log(entry)) {
                eprintln!("LoggerSink error: {}", err);
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.fields.push((name, value)),
        }
    }
}

trait FromTracingLevel {
    fn from_tracing(level: tracing::Level) -> Self;
}

impl FromTracingLevel for LogLevel {
    fn from_tracing(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

fn sanitize_field(name: &str, value: &str) -> String {
    let name = name.to_ascii_lowercase();
    if PATH_FIELDS.iter().any(|f| name == *f || name.ends_with(&format!("_{f}"))) {
        return strip_path(value.trim_matches('"')).to_string();
    }
    redact_if_sensitive(&name, value)
}

/// Redact the value of fields that may carry key material.
///
/// ```ignore
/// debug!(encryption_key = %redact_if_sensitive("encryption_key", key), "Cipher ready");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let field = field_name.to_ascii_lowercase();
    if SENSITIVE_FIELDS.iter().any(|f| field.contains(f)) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

/// Keep only the file name of an asset path.
///
/// ```ignore
/// info!(file = %strip_path("/home/player/Game/audio/bgm/Theme1.ogg"), "Loading asset");
/// // file="Theme1.ogg"
/// ```
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for RecordingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Info
        }
    }

    fn with_sink<F: FnOnce()>(f: F) -> Vec<LogEntry> {
        let sink = Arc::new(RecordingSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber =
            tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        tracing::subscriber::with_default(subscriber, f);
        let entries = sink.entries.lock().clone();
        entries
    }

    #[test]
    fn test_audio_debug_preset() {
        let config = LoggingConfig::audio_debug();
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.enable_spans);
        assert!(config.logger_sink.is_none());
    }

    #[test]
    fn test_default_filter_quiets_dependencies() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let rendered = build_filter(&config).unwrap().to_string();
        assert!(rendered.contains("core_playback=debug"));
        assert!(rendered.contains("bridge_desktop=debug"));
        assert!(rendered.contains("symphonia=warn"));
    }

    #[test]
    fn test_custom_filter_replaces_default() {
        let config = LoggingConfig::default().with_filter("core_playback=trace");
        let rendered = build_filter(&config).unwrap().to_string();
        assert!(rendered.contains("core_playback=trace"));
        assert!(!rendered.contains("symphonia"));
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = LoggingConfig::default().with_filter("core_playback=[");
        assert!(matches!(build_filter(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_strip_path() {
        assert_eq!(strip_path("/home/user/game/audio/bgm/Theme1.ogg"), "Theme1.ogg");
        assert_eq!(strip_path("C:\\Games\\audio\\se\\Cursor1.ogg"), "Cursor1.ogg");
        assert_eq!(strip_path("Theme1.ogg"), "Theme1.ogg");
    }

    #[test]
    fn test_sink_receives_sanitised_fields() {
        let path = std::path::PathBuf::from("/home/player/Game/audio/bgm/Theme1.ogg");
        let entries = with_sink(|| {
            tracing::info!(
                target: "core_playback",
                channel = "music",
                cipher_key = "d41d8cd98f00b204e9800998ecf8427e",
                path = ?path,
                "Audio play"
            );
        });

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_playback");
        assert_eq!(entry.message, "Audio play");
        assert_eq!(entry.fields.get("channel"), Some(&"music".to_string()));
        assert_eq!(entry.fields.get("cipher_key"), Some(&"[REDACTED]".to_string()));
        assert_eq!(entry.fields.get("path"), Some(&"Theme1.ogg".to_string()));
    }

    #[test]
    fn test_sink_respects_min_level() {
        let entries = with_sink(|| {
            tracing::debug!("Audio prune");
            tracing::warn!(url = "audio/bgm/Missing.ogg", "Load failed");
        });

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(
            entries[0].fields.get("url"),
            Some(&"audio/bgm/Missing.ogg".to_string())
        );
    }
}
