use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower::{BoxError, Service, ServiceExt};
use tracing::{debug, error, info, warn};

use crate::options::{ConfigError, Options};
use crate::relay::Relay;
use crate::retry::{Outcome, RetryEngine};

/// The two ways a request can fail without ever reaching the real handler.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    #[error("timed out waiting for handler to be created and sent")]
    TimedOut,
    #[error("permanent error creating handler")]
    Permanent,
}

impl IntoResponse for Unavailable {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
    }
}

/// Mount any infallible service as a router, so that every responder the
/// handler deals with shares one `Clone + Send + Sync` type.
pub(crate) fn into_responder<S>(service: S) -> Router
where
    S: Service<Request, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse + 'static,
    S::Future: Send + 'static,
{
    Router::new().fallback_service(service)
}

/// Responder installed once creation has been given up on.
pub(crate) fn failed() -> Router {
    Router::new().fallback(|| async { Unavailable::Permanent })
}

/// Responder active during the cold window: waits for the relay to deliver
/// the real responder, for at most `timeout_after` per request.
#[derive(Clone)]
struct Pending {
    relay: Relay<Router>,
    timeout_after: Duration,
}

impl Service<Request> for Pending {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let relay = self.relay.clone();
        let timeout_after = self.timeout_after;

        Box::pin(async move {
            let mut subscription = relay.subscribe();
            match tokio::time::timeout(timeout_after, subscription.recv()).await {
                Ok(Some(next)) => next.oneshot(req).await,
                Ok(None) => Ok(Unavailable::Permanent.into_response()),
                Err(_) => {
                    debug!(
                        "request timed out after {:?} waiting for handler",
                        timeout_after
                    );
                    Ok(Unavailable::TimedOut.into_response())
                }
            }
        })
    }
}

/// A request handler that can be mounted before the real one exists.
///
/// On construction, a background task starts calling `create` every
/// `retry_after`. Until it succeeds, requests are held for up to
/// `timeout_after` waiting for the result, and answered with
/// `503 Service Unavailable` if it does not come in time. Once `create`
/// succeeds, its service is swapped in and requests go straight to it.
///
/// Failed attempts are passed to the `notify` callback. If `shutdown` is
/// cancelled before any attempt succeeded, retries stop and every request is
/// answered with a permanent `503` from then on.
///
/// `DeferredHandler` is cheap to clone; all clones share the same state. It
/// implements [`tower::Service`], so it can be used as an axum fallback:
///
/// ```no_run
/// use std::convert::Infallible;
/// use axum::{routing::get, Router};
/// use deferred::{DeferredHandler, Options};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), deferred::ConfigError> {
/// let handler = DeferredHandler::new(
///     CancellationToken::new(),
///     || async { Ok::<Router, Infallible>(Router::new().route("/", get(|| async { "ready" }))) },
///     Options::default(),
/// )?;
/// let app: Router = Router::new().fallback_service(handler);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DeferredHandler {
    active: Arc<Mutex<Router>>,
}

impl DeferredHandler {
    /// Start creating the handler in the background and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<F, Fut, S, E>(
        shutdown: CancellationToken,
        create: F,
        options: Options,
    ) -> Result<Self, ConfigError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
        S: Service<Request, Error = Infallible> + Clone + Send + 'static,
        S::Response: IntoResponse + 'static,
        S::Future: Send + 'static,
    {
        options.validate()?;

        let relay = Relay::default();
        let handler = Self {
            active: Arc::new(Mutex::new(into_responder(Pending {
                relay: relay.clone(),
                timeout_after: options.timeout_after,
            }))),
        };

        let mut installed = relay.subscribe();
        let active = handler.active.clone();
        tokio::spawn(async move {
            if let Some(next) = installed.recv().await {
                *active.lock().unwrap_or_else(PoisonError::into_inner) = next;
                debug!("installed created handler");
            }
        });

        let engine = RetryEngine::new(options.retry_after, options.notify, relay.clone());
        let creation = tokio::spawn(engine.run(shutdown, create));
        tokio::spawn(async move {
            match creation.await {
                Ok(Outcome::Succeeded { attempts }) => info!(attempts, "handler created"),
                Ok(Outcome::Cancelled { attempts }) => warn!(
                    attempts,
                    "shutdown before handler was created, failing permanently"
                ),
                Err(err) => {
                    // A panicking factory must not leave requests waiting forever.
                    error!("handler creation task failed, failing permanently: {}", err);
                    relay.publish(failed());
                }
            }
        });

        Ok(handler)
    }

    fn current(&self) -> Router {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Service<Request> for DeferredHandler {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let active = self.current();
        Box::pin(active.oneshot(req))
    }
}
