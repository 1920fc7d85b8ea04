//! Uniform JSON responses for axum handlers.
//!
//! Handlers return [`HandlerResult<T>`]. Success becomes `200` with
//! `{code: 0, message: "success", data}`; errors become a [`Failure`]
//! envelope whose shape depends on whether the error is a [`BizError`].

pub mod error;
pub mod file;
pub mod guard;
pub mod reply;
pub mod types;

pub use error::{is_biz_error, BizError, Failure};
pub use file::FileDownload;
pub use guard::{guard, GuardLayer, GuardMiddleware};
pub use reply::{ok, HandlerResult, Reply};
pub use types::{Envelope, INTERNAL_PRINT_INFO, SUCCESS_MESSAGE};
