//! Fluent request builder.

use crate::client::HttpClient;
use crate::error::{ConfigError, HttpError};
use crate::params::{self, QueryParams};
use crate::response::Response;
use crate::retry::{self, RetryOn, RetryPolicy};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

/// Common HTTP headers.
pub mod headers {
    /// `Content-Type` of JSON bodies.
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    /// Header carrying the request id.
    pub const X_REQUEST_ID: &str = "x-request-id";
}

/// A single HTTP request, decoded into `T` on success.
///
/// Configuration errors don't interrupt the chain: the first one is kept,
/// later calls are ignored, and [`send`](Self::send) reports it.
///
/// ```no_run
/// # async fn demo(client: wkit_http::HttpClient) -> Result<(), wkit_http::HttpError> {
/// #[derive(serde::Deserialize)]
/// struct Order { id: u64 }
///
/// let order = client
///     .get::<Order>()
///     .with_base_url("https://api.example.com/users/{uid}/orders/{oid}")
///     .with_path_param(["42", "7"])
///     .with_query_param("expand", "items")
///     .with_retry(3, std::time::Duration::from_millis(200), std::time::Duration::ZERO)
///     .send()
///     .await?
///     .into_data();
/// # let _ = order;
/// # Ok(())
/// # }
/// ```
pub struct Request<T> {
    client: HttpClient,
    method: Method,
    base_url: String,
    query: QueryParams,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    timeout: Option<Duration>,
    retry: RetryPolicy,
    error: Option<ConfigError>,
    _response: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Request<T> {
    /// Create a request for `method` sent through `client`.
    pub fn new(client: HttpClient, method: Method) -> Self {
        Self {
            client,
            method,
            base_url: String::new(),
            query: QueryParams::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            retry: RetryPolicy::none(),
            error: None,
            _response: PhantomData,
        }
    }

    /// Run `f` unless an earlier step already failed; keep its error.
    fn apply(mut self, f: impl FnOnce(&mut Self) -> Result<(), ConfigError>) -> Self {
        if self.error.is_none() {
            if let Err(err) = f(&mut self) {
                debug!(error = %err, "request configuration failed");
                self.error = Some(err);
            }
        }
        self
    }

    /// Set the target URL. `{name}` placeholders are filled by
    /// [`with_path_param`](Self::with_path_param).
    pub fn with_base_url(self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.apply(|req| {
            params::validate_template(&url)?;
            req.base_url = url;
            Ok(())
        })
    }

    /// Set a deadline for each attempt. Zero keeps the client default.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.apply(|req| {
            if !timeout.is_zero() {
                req.timeout = Some(timeout);
            }
            Ok(())
        })
    }

    /// Retry timed-out attempts with exponential backoff.
    ///
    /// `max_attempts` includes the first attempt. See [`RetryPolicy::new`]
    /// for how zero values are normalized.
    pub fn with_retry(self, max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        self.apply(|req| {
            let retry_on = req.retry.retry_on();
            req.retry = RetryPolicy::new(max_attempts, base_delay, max_delay).with_retry_on(retry_on);
            Ok(())
        })
    }

    /// Choose which transport failures are retried.
    pub fn with_retry_on(self, retry_on: RetryOn) -> Self {
        self.apply(|req| {
            req.retry = req.retry.clone().with_retry_on(retry_on);
            Ok(())
        })
    }

    /// Serialize `body` as JSON and send it with `Content-Type: application/json`.
    pub fn with_json_body<B: Serialize + ?Sized>(self, body: &B) -> Self {
        self.apply(|req| {
            let bytes = serde_json::to_vec(body).map_err(ConfigError::Body)?;
            req.body = Some(bytes);
            req.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(headers::CONTENT_TYPE_JSON),
            );
            Ok(())
        })
    }

    /// Fill the base URL placeholders, in order, with path-escaped values.
    pub fn with_path_param<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<S> = values.into_iter().collect();
        self.apply(|req| {
            req.base_url = params::substitute_path(&req.base_url, &values)?;
            Ok(())
        })
    }

    /// Set a query parameter. Empty values are skipped.
    pub fn with_query_param(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        self.apply(|req| {
            if !value.is_empty() {
                req.query.set(key, value);
            }
            Ok(())
        })
    }

    /// Set several query parameters. Empty values are skipped.
    pub fn with_query_params<K, V>(self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        params
            .into_iter()
            .fold(self, |req, (key, value)| req.with_query_param(key, value))
    }

    /// Set query parameters from the fields of a serializable struct.
    ///
    /// Every value goes through [`with_query_param`](Self::with_query_param),
    /// so for a sequence field the last non-empty element wins. `None`
    /// fields and empty values are skipped.
    pub fn with_query_struct<Q: Serialize + ?Sized>(self, params: &Q) -> Self {
        self.apply(|req| {
            for (key, values) in params::flatten_query(params)? {
                for value in values.into_iter().filter(|v| !v.is_empty()) {
                    req.query.set(key.clone(), value);
                }
            }
            Ok(())
        })
    }

    /// Like [`with_query_struct`](Self::with_query_struct), but a sequence
    /// field keeps every element as a repeated key (`tag=a&tag=b`).
    pub fn with_query_struct_multi<Q: Serialize + ?Sized>(self, params: &Q) -> Self {
        self.apply(|req| {
            for (key, values) in params::flatten_query(params)? {
                let mut values = values.into_iter().filter(|v| !v.is_empty());
                if let Some(first) = values.next() {
                    req.query.set(key.clone(), first);
                    for value in values {
                        req.query.append(key.clone(), value);
                    }
                }
            }
            Ok(())
        })
    }

    /// Set a header, replacing earlier values. Empty values are skipped.
    pub fn with_header(self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let (key, value) = (key.as_ref(), value.as_ref());
        self.apply(|req| {
            if value.is_empty() {
                return Ok(());
            }
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ConfigError::InvalidHeader {
                    name: key.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
                name: key.to_string(),
                reason: e.to_string(),
            })?;
            req.headers.insert(name, value);
            Ok(())
        })
    }

    /// Set several headers. Empty values are skipped.
    pub fn with_headers<K, V>(self, headers: &HashMap<K, V>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .iter()
            .fold(self, |req, (key, value)| req.with_header(key, value))
    }

    /// The base URL after placeholder substitution.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The full URL that will be requested, query string included.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.base_url.clone();
        }
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.base_url, separator, self.query.encode())
    }

    /// Query parameters set so far.
    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Headers set so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The encoded JSON body, if any.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The retry policy used by `send`.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The first configuration error, if any.
    pub fn error(&self) -> Option<&ConfigError> {
        self.error.as_ref()
    }

    /// Send the request and decode the response body.
    pub async fn send(mut self) -> Result<Response<T>, HttpError> {
        if let Some(err) = self.error.take() {
            return Err(err.into());
        }

        let url = self.url();
        let parsed = Url::parse(&url).map_err(|source| ConfigError::InvalidUrl {
            url: url.clone(),
            source,
        })?;

        let mut request = reqwest::Request::new(self.method, parsed);
        *request.headers_mut() = self.headers;
        *request.timeout_mut() = self.timeout;
        if let Some(body) = self.body {
            *request.body_mut() = Some(body.into());
        }

        let response = retry::execute(self.client.transport(), request, &self.retry).await?;
        debug!(status = response.status().as_u16(), %url, "received response");

        Response::from_reqwest(response).await
    }
}

impl<T> std::fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::Value;

    fn client() -> HttpClient {
        HttpClient::new().unwrap()
    }

    #[derive(Serialize)]
    struct TestData {
        message: String,
        value: i32,
    }

    #[test]
    fn test_path_params_fill_in_order() {
        let req = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/user/{uid}/order/{oid}")
            .with_path_param(["u 1", "o/2"]);

        assert!(req.error().is_none());
        assert_eq!(req.base_url(), "https://api.example.com/user/u%201/order/o%2F2");
    }

    #[test]
    fn test_path_param_mismatch_keeps_base_url() {
        let template = "https://api.example.com/user/{uid}/order/{oid}";
        let req = client()
            .get::<Value>()
            .with_base_url(template)
            .with_path_param(["only-one"]);

        assert_eq!(req.base_url(), template);
        assert!(matches!(
            req.error(),
            Some(ConfigError::PathParamCount {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_first_error_wins() {
        let req = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/{id}")
            .with_path_param(Vec::<String>::new())
            .with_header("bad header", "x")
            .with_base_url("not a url");

        assert!(matches!(
            req.error(),
            Some(ConfigError::PathParamCount { .. })
        ));
        assert_eq!(req.base_url(), "https://api.example.com/{id}");
    }

    #[test]
    fn test_port_placeholder() {
        let req = client()
            .get::<Value>()
            .with_base_url("http://localhost:{port}/users/{id}")
            .with_path_param(["8080", "1"]);

        assert!(req.error().is_none());
        assert_eq!(req.base_url(), "http://localhost:8080/users/1");
    }

    #[test]
    fn test_invalid_base_url() {
        let req = client().get::<Value>().with_base_url("/relative/path");
        assert!(matches!(req.error(), Some(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_empty_query_values_are_skipped() {
        let req = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/search")
            .with_query_param("q", "")
            .with_query_param("page", "1");

        assert_eq!(req.url(), "https://api.example.com/search?page=1");
    }

    #[test]
    fn test_query_param_overwrites() {
        let req = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/search")
            .with_query_param("k", "v")
            .with_query_param("k", "w");

        assert_eq!(req.url(), "https://api.example.com/search?k=w");
    }

    #[test]
    fn test_no_query_string_when_empty() {
        let req = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/search")
            .with_query_params([("a", ""), ("b", "")]);

        assert_eq!(req.url(), "https://api.example.com/search");
    }

    #[test]
    fn test_query_appends_to_existing_query() {
        let req = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/search?fixed=1")
            .with_query_param("extra", "2");

        assert_eq!(req.url(), "https://api.example.com/search?fixed=1&extra=2");
    }

    #[derive(Serialize)]
    struct Search {
        q: String,
        tag: Vec<&'static str>,
        cursor: Option<String>,
        empty: String,
    }

    #[test]
    fn test_query_struct() {
        let req = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/search")
            .with_query_param("q", "replaced")
            .with_query_struct(&Search {
                q: "rust".into(),
                tag: vec!["a", "b"],
                cursor: None,
                empty: String::new(),
            });

        assert!(req.error().is_none());
        assert_eq!(req.url(), "https://api.example.com/search?q=rust&tag=b");
    }

    #[test]
    fn test_query_struct_multi_keeps_every_value() {
        let req = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/search")
            .with_query_struct_multi(&Search {
                q: "rust".into(),
                tag: vec!["a", "", "b"],
                cursor: None,
                empty: String::new(),
            });

        assert_eq!(req.url(), "https://api.example.com/search?q=rust&tag=a&tag=b");
    }

    #[test]
    fn test_query_struct_rejects_scalars() {
        let req = client().get::<Value>().with_query_struct("just a string");
        assert!(matches!(req.error(), Some(ConfigError::Query(_))));
    }

    #[test]
    fn test_headers() {
        let mut extra = HashMap::new();
        extra.insert("X-Trace", "abc");
        extra.insert("X-Skipped", "");

        let req = client()
            .get::<Value>()
            .with_header("Authorization", "Bearer one")
            .with_header("authorization", "Bearer two")
            .with_headers(&extra);

        assert_eq!(req.headers().len(), 2);
        assert_eq!(req.headers()["authorization"], "Bearer two");
        assert_eq!(req.headers()["x-trace"], "abc");
        assert!(!req.headers().contains_key("x-skipped"));
    }

    #[test]
    fn test_invalid_header_is_deferred() {
        let req = client().get::<Value>().with_header("bad header", "value");
        assert!(matches!(req.error(), Some(ConfigError::InvalidHeader { .. })));
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let req = client().post::<Value>().with_json_body(&TestData {
            message: "hello".to_string(),
            value: 42,
        });

        let parsed: Value = serde_json::from_slice(req.body().unwrap()).unwrap();
        assert_eq!(parsed["message"], "hello");
        assert_eq!(parsed["value"], 42);
        assert_eq!(req.headers()[CONTENT_TYPE], headers::CONTENT_TYPE_JSON);
    }

    #[test]
    fn test_json_body_failure_keeps_state() {
        let mut bad = HashMap::new();
        bad.insert(vec![1u8], "non-string keys cannot be JSON object keys");

        let req = client()
            .post::<Value>()
            .with_json_body(&TestData {
                message: "first".into(),
                value: 1,
            })
            .with_json_body(&bad);

        assert!(matches!(req.error(), Some(ConfigError::Body(_))));
        let parsed: Value = serde_json::from_slice(req.body().unwrap()).unwrap();
        assert_eq!(parsed["message"], "first");
    }

    #[test]
    fn test_zero_timeout_is_ignored() {
        let req = client().get::<Value>().with_timeout(Duration::ZERO);
        assert!(req.timeout.is_none());

        let req = req.with_timeout(Duration::from_secs(2));
        assert_eq!(req.timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_retry_configuration() {
        let req = client()
            .get::<Value>()
            .with_retry_on(RetryOn {
                timeouts: true,
                connect_errors: true,
            })
            .with_retry(0, Duration::ZERO, Duration::ZERO);

        let policy = req.retry_policy();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
        assert_eq!(policy.max_delay(), Duration::from_secs(16));
        assert!(policy.retry_on().connect_errors);
    }

    #[tokio::test]
    async fn test_send_reports_deferred_error() {
        let result = client()
            .get::<Value>()
            .with_base_url("https://api.example.com/{id}")
            .with_path_param(["1", "2"])
            .send()
            .await;

        assert!(matches!(
            result,
            Err(HttpError::Config(ConfigError::PathParamCount { .. }))
        ));
    }

    #[tokio::test]
    async fn test_send_without_base_url_fails() {
        let result = client().get::<Value>().send().await;
        assert!(matches!(
            result,
            Err(HttpError::Config(ConfigError::InvalidUrl { .. }))
        ));
    }
}
