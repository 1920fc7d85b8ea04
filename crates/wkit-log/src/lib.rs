//! Logging infrastructure for wkit.
//!
//! A [`Logger`] is an explicit object: build it from a [`LogConfig`], hand
//! it to whatever needs to log, and either [`install`](Logger::install) it as
//! the process default or keep it scoped. Log lines are written through
//! fluent [`Entry`] values:
//!
//! ```no_run
//! use wkit_log::{LogConfig, Logger, TraceContext};
//!
//! let logger = Logger::new(LogConfig::from_env()).unwrap();
//! let ctx = TraceContext::new().with_trace_id("1881976623637467136");
//!
//! logger
//!     .msg("order created")
//!     .ctx(&ctx)
//!     .field("order_id", 42)
//!     .info();
//! ```

use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Dispatch;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    EnvFilter, Layer,
};

mod entry;
mod time;

/// Distributed tracing utilities.
pub mod spans;

pub use entry::{Entry, TraceContext};
pub use time::LocalTimer;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Also append log lines to this file.
    pub file_path: Option<PathBuf>,
    /// Include timestamps.
    pub timestamps: bool,
    /// Add file and line of the emitting code.
    pub source_location: bool,
    /// Include span events.
    pub span_events: bool,
    /// Offset from UTC, in hours, used to render timestamps.
    pub utc_offset_hours: i32,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = LogError;

    /// Case-insensitive; `warning` is accepted for `warn`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            other => return Err(LogError::UnknownLevel(other.to_string())),
        };
        Ok(level)
    }
}

impl LogLevel {
    /// Directive understood by [`EnvFilter`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, for terminals.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event.
    Json,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            file_path: None,
            timestamps: true,
            source_location: false,
            span_events: false,
            utc_offset_hours: 8,
        }
    }
}

impl LogConfig {
    /// Read `WKIT_*` variables over the defaults.
    ///
    /// `WKIT_ENV=production` switches the default format to JSON;
    /// `WKIT_LOG_FORMAT` still wins when set. The level comes from
    /// `WKIT_LOG_LEVEL`, then `RUST_LOG` when it names a bare level.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if env_var("WKIT_ENV").as_deref() == Some("production") {
            config.format = LogFormat::Json;
        }

        if let Some(level) = env_var("WKIT_LOG_LEVEL")
            .or_else(|| env_var("RUST_LOG"))
            .and_then(|v| v.parse().ok())
        {
            config.level = level;
        }

        if let Some(format) = env_var("WKIT_LOG_FORMAT") {
            config.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }

        config.file_path = env_var("WKIT_LOG_FILE").map(PathBuf::from);

        if let Some(on) = env_flag("WKIT_LOG_SOURCE") {
            config.source_location = on;
        }
        if let Some(on) = env_flag("WKIT_LOG_SPANS") {
            config.span_events = on;
        }
        if let Some(hours) = env_var("WKIT_LOG_UTC_OFFSET").and_then(|v| v.trim().parse().ok()) {
            config.utc_offset_hours = hours;
        }

        config
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_flag(key: &str) -> Option<bool> {
    env_var(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Buffered log file shared by the file layer and [`Logger::flush`].
#[derive(Clone)]
struct FileSink(Arc<Mutex<BufWriter<File>>>);

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

fn fmt_layer<S, W>(config: &LogConfig, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_timer(LocalTimer::new(config.utc_offset_hours, config.timestamps))
        .with_ansi(ansi)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

/// A configured logger.
///
/// Nothing is global until [`install`](Self::install) is called.
pub struct Logger {
    dispatch: Dispatch,
    file: Option<FileSink>,
}

impl Logger {
    /// Build a logger writing to stderr (and the configured file, if any).
    pub fn new(config: LogConfig) -> Result<Self, LogError> {
        Self::build(config, io::stderr, true)
    }

    /// Build a logger writing to `writer` instead of stderr.
    pub fn with_writer<W>(config: LogConfig, writer: W) -> Result<Self, LogError>
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self::build(config, writer, false)
    }

    fn build<W>(config: LogConfig, writer: W, ansi: bool) -> Result<Self, LogError>
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let filter = EnvFilter::new(config.level.as_str());

        let file = match &config.file_path {
            Some(path) => {
                let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
                Some(FileSink(Arc::new(Mutex::new(BufWriter::new(file)))))
            }
            None => None,
        };

        let file_layer = file.clone().map(|sink| {
            let writer = move || sink.clone();
            fmt_layer(&config, writer, false)
        });

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer(&config, writer, ansi))
            .with(file_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            file,
        })
    }

    /// Make this logger the process-wide default.
    ///
    /// Plain `tracing` macros anywhere in the process go through it
    /// afterwards. Fails if a default is already installed.
    pub fn install(&self) -> Result<(), LogError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| LogError::InitError(e.to_string()))
    }

    /// Run `f` with this logger as the thread's default.
    pub fn scoped<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// The dispatcher events are routed through.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Start a log entry.
    pub fn msg(&self, message: impl Into<String>) -> Entry<'_> {
        Entry::new(self, message.into())
    }

    /// Start a log entry from format arguments.
    pub fn msgf(&self, args: std::fmt::Arguments<'_>) -> Entry<'_> {
        Entry::new(self, args.to_string())
    }

    /// Flush buffered file output.
    pub fn flush(&self) -> Result<(), LogError> {
        if let Some(file) = &self.file {
            file.0.lock().flush()?;
        }
        Ok(())
    }

    /// Flush and release the logger.
    pub fn shutdown(self) -> Result<(), LogError> {
        self.flush()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("file", &self.file.is_some())
            .finish_non_exhaustive()
    }
}

/// Build a logger and install it as the process default.
pub fn init(config: LogConfig) -> Result<Logger, LogError> {
    let logger = Logger::new(config)?;
    logger.install()?;
    Ok(logger)
}

/// Logger setup errors.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A global subscriber was already set.
    #[error("a global logger is already installed: {0}")]
    InitError(String),

    /// The log file could not be opened or written.
    #[error("log file I/O failed: {0}")]
    FileError(#[from] io::Error),

    /// A level name was not recognized.
    #[error("unknown log level `{0}`")]
    UnknownLevel(String),
}

pub use tracing::{debug, error, info, trace, warn};
