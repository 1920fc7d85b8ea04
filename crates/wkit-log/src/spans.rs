//! Distributed tracing utilities.

use crate::TraceContext;
use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Create a span carrying the trace id of a request.
pub fn trace_span(ctx: &TraceContext) -> Span {
    info_span!("trace", trace_id = %ctx.trace_id())
}

/// Create a span for an outbound HTTP call.
pub fn request_span(method: &str, url: &str) -> Span {
    info_span!("request", method = %method, url = %url)
}

/// Instrument a future with a span.
pub fn instrument_future<F: Future>(future: F, span: Span) -> impl Future<Output = F::Output> {
    future.instrument(span)
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing `operation`.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Log the elapsed time at debug level and return it.
    pub fn finish(self) -> std::time::Duration {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %duration.as_millis(),
            "operation completed"
        );
        duration
    }
}

/// Time a block and log how long it took.
#[macro_export]
macro_rules! timed {
    ($name:expr, $body:expr) => {{
        let _timer = $crate::spans::Timer::start($name);
        let result = $body;
        _timer.finish();
        result
    }};
}

pub use tracing::instrument;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::json_logger;
    use crate::LogLevel;

    #[test]
    fn test_trace_span_is_attached_to_events() {
        let (logger, capture) = json_logger(LogLevel::Info);
        let ctx = TraceContext::new().with_trace_id("t-1");

        logger.scoped(|| {
            let span = trace_span(&ctx);
            let _guard = span.enter();
            tracing::info!("inside");
        });

        let lines = capture.json_lines();
        assert_eq!(lines[0]["span"]["trace_id"], "t-1");
        assert_eq!(lines[0]["span"]["name"], "trace");
    }

    #[tokio::test]
    async fn test_context_propagation_across_async() {
        let (logger, capture) = json_logger(LogLevel::Info);
        let _default = tracing::dispatcher::set_default(logger.dispatch());

        let inner = async {
            tracing::info!("sending");
        };
        instrument_future(inner, request_span("GET", "http://localhost/users")).await;

        let lines = capture.json_lines();
        assert_eq!(lines[0]["span"]["method"], "GET");
        assert_eq!(lines[0]["span"]["url"], "http://localhost/users");
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.finish() >= std::time::Duration::from_millis(10));
    }

    #[test]
    fn test_timed_macro() {
        let (logger, capture) = json_logger(LogLevel::Debug);
        let result = logger.scoped(|| {
            timed!("macro_test", {
                std::thread::sleep(std::time::Duration::from_millis(5));
                "success"
            })
        });

        assert_eq!(result, "success");
        let lines = capture.json_lines();
        assert_eq!(lines[0]["fields"]["operation"], "macro_test");
    }
}
