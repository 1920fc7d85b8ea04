//! File responses.

use crate::error::Failure;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

const OCTET_STREAM: &str = "application/octet-stream";

/// A file served as the response body.
///
/// With `download` set the file is sent as an attachment named after its
/// basename; otherwise the content type is guessed from the extension.
/// The body is streamed from disk in chunks.
#[derive(Debug)]
pub struct FileDownload {
    path: PathBuf,
    file: File,
    len: u64,
    download: bool,
}

impl FileDownload {
    /// Open `path`. A missing or unreadable file is a [`Failure`].
    pub async fn open(path: impl AsRef<Path>, download: bool) -> Result<Self, Failure> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        let len = file.metadata().await?.len();
        debug!(path = %path.display(), size = len, "Serving file");
        Ok(Self {
            path,
            file,
            len,
            download,
        })
    }

    /// Size of the file in bytes when it was opened.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the file was empty when it was opened.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Basename of the served file.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn content_type(&self) -> String {
        if self.download {
            return OCTET_STREAM.to_string();
        }
        mime_guess::from_path(&self.path)
            .first_or_octet_stream()
            .to_string()
    }
}

impl IntoResponse for FileDownload {
    fn into_response(self) -> Response {
        let content_type = self.content_type();
        let disposition = self
            .download
            .then(|| format!("attachment; fileName={}", self.file_name()));

        let len = self.len;
        let body = Body::from_stream(ReaderStream::new(self.file));
        let mut response = (StatusCode::OK, body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        if let Some(disposition) = disposition {
            let value = HeaderValue::from_str(&disposition)
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        response
    }
}
