//! Fluent HTTP requests with retry and typed JSON responses.

pub mod client;
pub mod error;
pub mod params;
pub mod request;
pub mod response;
pub mod retry;

pub use client::{build_client, HttpClient, HttpConfig};
pub use error::{ConfigError, HttpError, TransportError, TransportErrorKind};
pub use request::{headers, Request};
pub use response::Response;
pub use retry::{RetryOn, RetryPolicy, Transport};
