//! Fluent log entries.

use crate::Logger;
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::panic::Location;
use tracing::Level;

/// Request-scoped values carried into log entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: Option<String>,
}

impl TraceContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a trace id.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// The trace id, or `""` when none was set.
    pub fn trace_id(&self) -> &str {
        self.trace_id.as_deref().unwrap_or("")
    }
}

/// A pending log line. Nothing is written until a level method is called.
#[must_use = "an entry is only written by a level method such as `info()`"]
pub struct Entry<'a> {
    logger: &'a Logger,
    message: String,
    trace_id: Option<String>,
    data: Map<String, Value>,
    error: Option<String>,
}

impl<'a> Entry<'a> {
    pub(crate) fn new(logger: &'a Logger, message: String) -> Self {
        Self {
            logger,
            message,
            trace_id: None,
            data: Map::new(),
            error: None,
        }
    }

    /// Attach the trace id from `ctx`, if it has one.
    pub fn ctx(mut self, ctx: &TraceContext) -> Self {
        if let Some(id) = ctx.trace_id.as_ref().filter(|id| !id.is_empty()) {
            self.trace_id = Some(id.clone());
        }
        self
    }

    /// Attach a structured field. Values that fail to serialize are
    /// recorded as their error text.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| Value::String(e.to_string()));
        self.data.insert(key.into(), value);
        self
    }

    /// Attach an error together with its source chain.
    pub fn err(mut self, error: &(dyn Error + 'static)) -> Self {
        let mut text = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        self.error = Some(text);
        self
    }

    /// Emit at debug level.
    #[track_caller]
    pub fn debug(self) {
        self.emit(Level::DEBUG, Location::caller());
    }

    /// Emit at info level.
    #[track_caller]
    pub fn info(self) {
        self.emit(Level::INFO, Location::caller());
    }

    /// Emit at warn level.
    #[track_caller]
    pub fn warn(self) {
        self.emit(Level::WARN, Location::caller());
    }

    /// Emit at error level.
    #[track_caller]
    pub fn error(self) {
        self.emit(Level::ERROR, Location::caller());
    }

    /// Log at error level, flush, and exit the process with status 1.
    #[track_caller]
    pub fn fatal(mut self) -> ! {
        let logger = self.logger;
        self.data.insert("fatal".into(), Value::Bool(true));
        self.emit(Level::ERROR, Location::caller());
        let _ = logger.flush();
        std::process::exit(1)
    }

    /// Log at error level, then panic with the message.
    #[track_caller]
    pub fn panic(self) -> ! {
        let logger = self.logger;
        let message = self.message.clone();
        self.emit(Level::ERROR, Location::caller());
        let _ = logger.flush();
        panic!("{}", message)
    }

    fn emit(self, level: Level, location: &'static Location<'static>) {
        let caller = format!("{}:{}", location.file(), location.line());
        let trace_id = self.trace_id.as_deref();
        let error = self.error.as_deref();
        let data = if self.data.is_empty() {
            None
        } else {
            Some(Value::Object(self.data).to_string())
        };
        let data = data.as_deref();
        let message = self.message;

        self.logger.scoped(|| match level {
            Level::TRACE => tracing::trace!(trace_id, caller, data, error, "{}", message),
            Level::DEBUG => tracing::debug!(trace_id, caller, data, error, "{}", message),
            Level::INFO => tracing::info!(trace_id, caller, data, error, "{}", message),
            Level::WARN => tracing::warn!(trace_id, caller, data, error, "{}", message),
            _ => tracing::error!(trace_id, caller, data, error, "{}", message),
        });
    }
}
