//! Successful handler responses.

use crate::error::Failure;
use crate::types::Envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Result type for handlers answering with an envelope.
pub type HandlerResult<T> = Result<Reply<T>, Failure>;

/// Success half of a handler result: `200 OK` with `data` in the envelope.
#[derive(Debug)]
pub struct Reply<T>(pub T);

impl<T> Reply<T> {
    /// The wrapped payload.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(Envelope::success(self.0))).into_response()
    }
}

/// Wrap `data` in a successful handler result.
pub fn ok<T>(data: T) -> HandlerResult<T> {
    Ok(Reply(data))
}
