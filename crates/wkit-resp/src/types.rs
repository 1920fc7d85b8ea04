//! Response envelope.

use serde::Serialize;

/// Message of every successful envelope.
pub const SUCCESS_MESSAGE: &str = "success";

/// Shown to users for errors that are not [`BizError`](crate::BizError)s.
pub const INTERNAL_PRINT_INFO: &str = "internal error, please contact the platform team";

/// Body of every JSON response.
///
/// Clients show `printInfo` to the user whenever it is present.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// `0` on success.
    pub code: i32,
    /// Short description of the outcome.
    pub message: String,
    /// Message meant for the end user.
    #[serde(rename = "printInfo", skip_serializing_if = "Option::is_none")]
    pub print_info: Option<String>,
    /// Payload, `null` on failure.
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// A success envelope around `data`.
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: SUCCESS_MESSAGE.to_string(),
            print_info: None,
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// A failure envelope without data.
    pub fn failure(code: i32, message: impl Into<String>, print_info: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            print_info: Some(print_info.into()),
            data: None,
        }
    }
}
