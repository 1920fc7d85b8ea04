//! Middleware that runs a check before the handler.

use crate::error::Failure;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Build a [`GuardLayer`] from `check`.
///
/// The check may inspect or annotate the request (for example by inserting
/// an extension). When it fails, the handler is skipped and the failure
/// envelope is returned instead.
///
/// ```no_run
/// use axum::{routing::get, Router};
/// use wkit_resp::{guard, ok, BizError, HandlerResult};
///
/// async fn me() -> HandlerResult<&'static str> {
///     ok("alice")
/// }
///
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(guard(|req| {
///         if req.headers().contains_key("authorization") {
///             Ok(())
///         } else {
///             Err(BizError::new(40100, "login required").into())
///         }
///     }));
/// ```
pub fn guard<F>(check: F) -> GuardLayer<F>
where
    F: Fn(&mut Request<Body>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    GuardLayer::new(check)
}

/// Layer applying a request check.
pub struct GuardLayer<F> {
    check: Arc<F>,
}

impl<F> GuardLayer<F> {
    /// Wrap `check` in a layer.
    pub fn new(check: F) -> Self {
        Self {
            check: Arc::new(check),
        }
    }
}

impl<F> Clone for GuardLayer<F> {
    fn clone(&self) -> Self {
        Self {
            check: self.check.clone(),
        }
    }
}

impl<S, F> Layer<S> for GuardLayer<F> {
    type Service = GuardMiddleware<S, F>;

    fn layer(&self, inner: S) -> Self::Service {
        GuardMiddleware {
            inner,
            check: self.check.clone(),
        }
    }
}

/// Service produced by [`GuardLayer`].
pub struct GuardMiddleware<S, F> {
    inner: S,
    check: Arc<F>,
}

impl<S: Clone, F> Clone for GuardMiddleware<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            check: self.check.clone(),
        }
    }
}

impl<S, F> Service<Request<Body>> for GuardMiddleware<S, F>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    F: Fn(&mut Request<Body>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        if let Err(err) = (self.check)(&mut req) {
            let response = Failure::from(err).into_response();
            return Box::pin(async move { Ok(response) });
        }

        // Take the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}
