//! Business errors and the failure response.

use crate::types::{Envelope, INTERNAL_PRINT_INFO};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};
use wkit_code::ErrorCode;

/// An error whose code and message are meant for the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("error code: {code}, reason: {message}")]
pub struct BizError {
    code: i32,
    message: String,
    status: StatusCode,
}

impl BizError {
    /// A business error answered with `500 Internal Server Error`.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Override the HTTP status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// A business error carrying the code and public message of `code`.
    pub fn from_code(code: &ErrorCode) -> Self {
        Self::new(code.code(), code.message())
    }

    /// The numeric code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The client-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// True when `err` is a [`BizError`].
pub fn is_biz_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<BizError>().is_some()
}

/// Error half of a handler result.
///
/// Anything convertible into [`anyhow::Error`] converts into a `Failure`, so
/// handlers can use `?` freely.
#[derive(Debug)]
pub struct Failure(anyhow::Error);

impl Failure {
    /// The wrapped error.
    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }

    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.0
            .downcast_ref::<BizError>()
            .map(BizError::status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn envelope(&self) -> Envelope<()> {
        match self.0.downcast_ref::<BizError>() {
            Some(biz) => Envelope::failure(biz.code, biz.message.clone(), biz.to_string()),
            None => Envelope::failure(-1, self.0.to_string(), INTERNAL_PRINT_INFO),
        }
    }
}

impl<E> From<E> for Failure
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let status = self.status();
        if is_biz_error(&self.0) {
            warn!(error = %self.0, status = status.as_u16(), "Business error");
        } else {
            error!(error = format!("{:#}", self.0), "Request failed");
        }

        (status, Json(self.envelope())).into_response()
    }
}
