//! Logging infrastructure - structured tracing for the object runtime
//!
//! Design: two layers.
//! 1. Process-wide `tracing` subscriber set up from a [`LogConfig`]
//!    (console or daily rolling file, pretty/compact/json).
//! 2. Per-object [`Logger`] handles. Every object carries the logger it
//!    inherited from its parent at creation; the `obj_*!` macros route
//!    through it and tag each record with the object's type name.

use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub use tracing::{debug, error, info, trace, warn, Level};

mod macros;

use crate::object::{Object, ObjectId};

/// Type tag used when an object was created without one
pub const GENERIC_TYPE_NAME: &str = "generic";

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// Single-line
    Compact,
    /// Structured JSON
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rolling file
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives (e.g. "objtree::tree=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // OBJTREE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("OBJTREE_LOG_LEVEL") {
            config.level = parse_level(&level);
        }

        // OBJTREE_LOG_FILE: directory for daily rolling files
        if let Ok(directory) = std::env::var("OBJTREE_LOG_FILE") {
            config.output = LogOutput::File {
                directory,
                prefix: "objtree".to_string(),
            };
        }

        if std::env::var("OBJTREE_LOG_JSON").is_ok() {
            config.format = LogFormat::Json;
        }

        config.span_events = std::env::var("OBJTREE_LOG_SPANS").is_ok();

        config
    }
}

/// Parse a level name, falling back to INFO
pub fn parse_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging from the environment
pub fn init() -> Option<WorkerGuard> {
    init_with_config(LogConfig::from_env())
}

/// Install the global subscriber
///
/// Idempotent: only the first call installs anything. The returned guard must
/// be kept alive until exit so buffered records are flushed.
pub fn init_with_config(config: LogConfig) -> Option<WorkerGuard> {
    if LOGGER_INITIALIZED.get().is_some() {
        return None;
    }

    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    let span_events = span_events_config(config.span_events);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .pretty()
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .compact()
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions))
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .json()
            .with_span_events(span_events)
            .boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(layer.with_filter(build_filter(&config)))
        .try_init()
        .is_ok();

    // Another subscriber may already own the process (tests, embedding host)
    let _ = LOGGER_INITIALIZED.set(());
    installed.then_some(guard)
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("objtree={}", config.level.as_str().to_lowercase())));

    match &config.filter {
        Some(directives) => directives
            .split(',')
            .filter_map(|directive| directive.trim().parse().ok())
            .fold(base, |filter, directive| filter.add_directive(directive)),
        None => base,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

// ============================================================================
// Per-object logger service
// ============================================================================

/// Message severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// Metadata attached to one object log message
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub severity: Severity,
    pub object_id: ObjectId,
    /// Type name of the emitting object, never empty
    pub object_type: &'a str,
    pub module: &'a str,
    pub file: &'a str,
    pub line: u32,
    pub function: &'a str,
}

/// Sink for object log messages
pub trait Logger: Send + Sync {
    fn log(&self, record: &LogRecord<'_>, args: fmt::Arguments<'_>);
}

/// Default sink forwarding to the global `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>, args: fmt::Arguments<'_>) {
        let object = record.object_id;
        match record.severity {
            Severity::Error => error!(
                target: "objtree::object",
                object = %object,
                object_type = record.object_type,
                module = record.module,
                file = record.file,
                line = record.line,
                function = record.function,
                "{}", args
            ),
            Severity::Warning => warn!(
                target: "objtree::object",
                object = %object,
                object_type = record.object_type,
                module = record.module,
                file = record.file,
                line = record.line,
                function = record.function,
                "{}", args
            ),
            Severity::Info => info!(
                target: "objtree::object",
                object = %object,
                object_type = record.object_type,
                module = record.module,
                "{}", args
            ),
            Severity::Debug => debug!(
                target: "objtree::object",
                object = %object,
                object_type = record.object_type,
                module = record.module,
                "{}", args
            ),
        }
    }
}

/// Shared handle to the default sink
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

/// Emit a message through an object's logger
///
/// No-op when the object has no logger. Prefer the `obj_*!` macros, which
/// fill in the source location.
#[allow(clippy::too_many_arguments)]
pub fn object_log(
    obj: &Object,
    severity: Severity,
    module: &str,
    file: &str,
    line: u32,
    function: &str,
    args: fmt::Arguments<'_>,
) {
    let Some(logger) = obj.logger() else {
        return;
    };

    let object_type = match obj.type_name() {
        "" => GENERIC_TYPE_NAME,
        name => name,
    };

    let record = LogRecord {
        severity,
        object_id: obj.id(),
        object_type,
        module,
        file,
        line,
        function,
    };
    logger.log(&record, args);
}
