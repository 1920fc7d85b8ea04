//! HTTP errors.

use std::fmt;

/// Errors returned by [`Request::send`](crate::Request::send).
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The reqwest client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The builder recorded a configuration error.
    #[error("invalid request: {0}")]
    Config(#[from] ConfigError),

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-2xx status.
    #[error("http status code not 2xx, is {status}")]
    Status {
        status: u16,
        body: serde_json::Map<String, serde_json::Value>,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Read(#[source] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("failed to parse JSON (status {status}): {source}")]
    Decode {
        status: u16,
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HttpError {
    /// The HTTP status carried by a non-2xx or decode failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } | HttpError::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the request failed because a deadline was exceeded.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Transport(e) if e.kind() == TransportErrorKind::Timeout)
    }
}

/// Errors detected while building a request.
///
/// They are stored by the builder and reported by `send`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The number of path params differs from the placeholders.
    #[error("path param count mismatch: expected {expected}, got {actual}")]
    PathParamCount { expected: usize, actual: usize },

    /// The URL could not be parsed.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The JSON body could not be serialized.
    #[error("failed to serialize request body: {0}")]
    Body(#[source] serde_json::Error),

    /// The query struct could not be flattened.
    #[error("failed to encode query parameters: {0}")]
    Query(String),

    /// A header name or value is invalid.
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// A deadline was exceeded.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// Anything else: TLS, protocol, redirect loops, ...
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => f.write_str("request timed out"),
            TransportErrorKind::Connect => f.write_str("connection failed"),
            TransportErrorKind::Other => f.write_str("request failed"),
        }
    }
}

/// A network-level failure: no HTTP response was received.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {source}")]
pub struct TransportError {
    kind: TransportErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    /// Wrap an arbitrary error with an explicit kind.
    pub fn new(
        kind: TransportErrorKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    /// Shorthand for a timeout failure.
    pub fn timeout(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new(TransportErrorKind::Timeout, source)
    }

    /// Shorthand for a connect failure.
    pub fn connect(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::new(TransportErrorKind::Connect, source)
    }

    /// What went wrong.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, e)
    }
}
