//! HTTP response types.

use crate::error::HttpError;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::warn;

/// A successful (2xx) response with its body decoded as `T`.
#[derive(Debug, Clone)]
pub struct Response<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    data: T,
}

impl<T: DeserializeOwned> Response<T> {
    /// Read the whole body and decode it.
    ///
    /// Non-2xx responses become [`HttpError::Status`] once the body has been
    /// parsed as a JSON object for diagnostics.
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self, HttpError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(HttpError::Read)?;

        if status.is_success() {
            let data = parse_json(status, &body)?;
            return Ok(Self {
                status,
                headers,
                body,
                data,
            });
        }

        let details: serde_json::Map<String, serde_json::Value> = parse_json(status, &body)?;
        warn!(status = status.as_u16(), body = ?details, "request returned non-success status");
        Err(HttpError::Status {
            status: status.as_u16(),
            body: details,
        })
    }
}

impl<T> Response<T> {
    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Raw response body.
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Decoded response body.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Take the decoded body.
    pub fn into_data(self) -> T {
        self.data
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of header `key`, or `""` when absent.
    pub fn header(&self, key: &str) -> &str {
        self.headers
            .get(key)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }

    /// Every value of header `key`, in received order. Empty when absent.
    pub fn header_all(&self, key: &str) -> Vec<&str> {
        self.headers
            .get_all(key)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }
}

fn parse_json<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice(body).map_err(|e| HttpError::Decode {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).to_string(),
        source: e,
    })
}
