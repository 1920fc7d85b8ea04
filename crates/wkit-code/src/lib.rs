//! Numeric error codes.
//!
//! An [`ErrorCode`] is a reusable definition (`code` + public `message`);
//! each failure creates a fresh [`CodedError`] from it carrying an optional
//! cause and request id.
//!
//! ```
//! use wkit_code::FAILED;
//!
//! let err = FAILED
//!     .with_internal_msg(format!("param {} must be {}", "age", "> 30"))
//!     .new_error_with_request_id("1881976623637467136");
//!
//! assert_eq!(
//!     err.to_string(),
//!     "Code: 10001, Message: failed, RequestId: 1881976623637467136"
//! );
//! ```

use serde::Serialize;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Operation succeeded.
pub const SUCCESS: ErrorCode = ErrorCode::new(10000, "success");
/// Operation failed.
pub const FAILED: ErrorCode = ErrorCode::new(10001, "failed");
/// Failure with no more specific code.
pub const UNKNOWN: ErrorCode = ErrorCode::new(10002, "unknown error");

/// An error code definition.
///
/// Equality compares the numeric code only.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorCode {
    code: i32,
    message: Cow<'static, str>,
    #[serde(skip)]
    internal_msg: Option<String>,
}

impl ErrorCode {
    /// A code with a static message.
    pub const fn new(code: i32, message: &'static str) -> Self {
        Self {
            code,
            message: Cow::Borrowed(message),
            internal_msg: None,
        }
    }

    /// Define a code with a message built at runtime.
    pub fn with_message(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Cow::Owned(message.into()),
            internal_msg: None,
        }
    }

    /// Copy of this code carrying a diagnostic message that is not shown to
    /// callers.
    pub fn with_internal_msg(&self, internal_msg: impl Into<String>) -> Self {
        Self {
            internal_msg: Some(internal_msg.into()),
            ..self.clone()
        }
    }

    /// The numeric code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The client-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The internal message, if one was attached.
    pub fn internal_msg(&self) -> Option<&str> {
        self.internal_msg.as_deref()
    }

    /// A [`CodedError`] carrying this code.
    pub fn new_error(&self) -> CodedError {
        self.build(None, String::new())
    }

    /// A [`CodedError`] carrying this code and `cause`.
    pub fn new_error_with_cause<E>(&self, cause: E) -> CodedError
    where
        E: Into<BoxError>,
    {
        self.build(Some(cause.into()), String::new())
    }

    /// A [`CodedError`] carrying this code and a request id.
    pub fn new_error_with_request_id(&self, request_id: impl Into<String>) -> CodedError {
        self.build(None, request_id.into())
    }

    /// A [`CodedError`] carrying this code, `cause` and a request id.
    pub fn new_error_with_cause_and_request_id<E>(
        &self,
        cause: E,
        request_id: impl Into<String>,
    ) -> CodedError
    where
        E: Into<BoxError>,
    {
        self.build(Some(cause.into()), request_id.into())
    }

    fn build(&self, cause: Option<BoxError>, request_id: String) -> CodedError {
        CodedError {
            code: self.clone(),
            cause,
            request_id,
        }
    }
}

impl PartialEq for ErrorCode {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for ErrorCode {}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// An error raised from an [`ErrorCode`].
#[derive(Debug, thiserror::Error)]
#[error("Code: {}, Message: {}, RequestId: {}", .code.code, .code.message, .request_id)]
pub struct CodedError {
    code: ErrorCode,
    #[source]
    cause: Option<BoxError>,
    request_id: String,
}

impl CodedError {
    /// The code this error was built from.
    pub fn error_code(&self) -> &ErrorCode {
        &self.code
    }

    /// Shorthand for `self.error_code().code()`.
    pub fn code(&self) -> i32 {
        self.code.code
    }

    /// The request id, or `""` when none was set.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// True when this error was raised from `code`.
    pub fn is(&self, code: &ErrorCode) -> bool {
        self.code == *code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_with_request_id() {
        let err = FAILED
            .with_internal_msg(format!("param {} must satisfy {}", "age", "> 30"))
            .new_error_with_request_id("1881976623637467136");

        assert_eq!(
            err.to_string(),
            "Code: 10001, Message: failed, RequestId: 1881976623637467136"
        );
        assert_eq!(
            err.error_code().internal_msg(),
            Some("param age must satisfy > 30")
        );
        assert_eq!(err.request_id(), "1881976623637467136");
    }

    #[test]
    fn test_display_without_request_id() {
        assert_eq!(
            UNKNOWN.new_error().to_string(),
            "Code: 10002, Message: unknown error, RequestId: "
        );
    }

    #[test]
    fn test_constants_are_not_mutated() {
        let _ = FAILED.with_internal_msg("detail");
        assert!(FAILED.internal_msg().is_none());
    }

    #[test]
    fn test_cause_is_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing row");
        let err = UNKNOWN.new_error_with_cause_and_request_id(io, "req-1");

        let source = err.source().expect("cause");
        assert_eq!(source.to_string(), "missing row");
        assert_eq!(err.request_id(), "req-1");

        let err = FAILED.new_error_with_cause("plain text cause");
        assert_eq!(err.source().unwrap().to_string(), "plain text cause");
        assert!(SUCCESS.new_error().source().is_none());
    }

    #[test]
    fn test_equality_by_code() {
        let custom = ErrorCode::with_message(10001, "something else");
        assert_eq!(custom, FAILED);
        assert_ne!(SUCCESS, FAILED);
        assert_eq!(FAILED.with_internal_msg("x"), FAILED);

        let err = FAILED.new_error();
        assert!(err.is(&custom));
        assert!(!err.is(&UNKNOWN));
        assert_eq!(err.code(), 10001);
    }

    #[test]
    fn test_serialize_hides_internal_msg() {
        let json = serde_json::to_value(FAILED.with_internal_msg("secret")).unwrap();
        assert_eq!(json, serde_json::json!({ "code": 10001, "message": "failed" }));
    }

    proptest! {
        #[test]
        fn equality_ignores_messages(code in any::<i32>(), a in ".*", b in ".*") {
            prop_assert_eq!(
                ErrorCode::with_message(code, a),
                ErrorCode::with_message(code, b).with_internal_msg("x")
            );
        }
    }
}
