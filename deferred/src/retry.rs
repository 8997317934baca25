use std::convert::Infallible;
use std::future::{self, Future};
use std::time::Duration;

use axum::extract::Request;
use axum::response::IntoResponse;
use axum::Router;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tower::{BoxError, Service};
use tracing::warn;

use crate::handler::{failed, into_responder};
use crate::options::Notify;
use crate::relay::Relay;

/// How a `RetryEngine` run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// An attempt succeeded and its responder was published.
    Succeeded { attempts: u64 },
    /// Shutdown was requested before any attempt succeeded.
    Cancelled { attempts: u64 },
}

/// Drives handler creation: calls the factory on a fixed schedule until it
/// succeeds or shutdown is requested, and publishes the resulting responder.
pub(crate) struct RetryEngine {
    /// Interval between attempts, also the delay before the first one.
    retry_after: Duration,
    /// Told about every failed attempt.
    notify: Notify,
    /// Where the final responder goes.
    relay: Relay<Router>,
}

impl RetryEngine {
    pub(crate) fn new(retry_after: Duration, notify: Notify, relay: Relay<Router>) -> Self {
        Self {
            retry_after,
            notify,
            relay,
        }
    }

    /// Run until a terminal state is reached. The ticker lives on this task's
    /// stack, so no schedule outlives the run.
    pub(crate) async fn run<F, Fut, S, E>(
        self,
        shutdown: CancellationToken,
        mut create: F,
    ) -> Outcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        E: Into<BoxError>,
        S: Service<Request, Error = Infallible> + Clone + Send + 'static,
        S::Response: IntoResponse + 'static,
        S::Future: Send + 'static,
    {
        // An interval too long to land on the clock never ticks; only
        // cancellation can end the run then.
        let mut schedule = Instant::now()
            .checked_add(self.retry_after)
            .map(|start| {
                let mut schedule = time::interval_at(start, self.retry_after);
                schedule.set_missed_tick_behavior(MissedTickBehavior::Delay);
                schedule
            });
        let mut attempts = 0;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.relay.publish(failed());
                    return Outcome::Cancelled { attempts };
                }
                _ = next_tick(schedule.as_mut()) => {
                    attempts += 1;
                    match create().await {
                        Ok(next) => {
                            self.relay.publish(into_responder(next));
                            return Outcome::Succeeded { attempts };
                        }
                        Err(err) => {
                            let err: BoxError = err.into();
                            warn!(
                                attempts,
                                "failed to create handler, retrying in {:?}: {}",
                                self.retry_after,
                                err
                            );
                            (self.notify)(err);
                        }
                    }
                }
            }
        }
    }
}

async fn next_tick(schedule: Option<&mut Interval>) {
    match schedule {
        Some(schedule) => {
            schedule.tick().await;
        }
        None => future::pending().await,
    }
}
