use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tower::BoxError;

/// Interval between two attempts at creating the handler.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);
/// How long a request waits for the handler before giving up.
pub const DEFAULT_TIMEOUT_AFTER: Duration = Duration::from_secs(15);

pub type Notify = Arc<dyn Fn(BoxError) + Send + Sync>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("retry interval must be greater than zero")]
    ZeroRetryInterval,
}

/// Tunables for a [`DeferredHandler`](crate::DeferredHandler).
///
/// Start from [`Options::default`] and override what you need:
///
/// ```
/// use std::time::Duration;
/// use deferred::Options;
///
/// let options = Options::default()
///     .retry_after(Duration::from_secs(1))
///     .notify(|err| eprintln!("creating handler failed: {err}"));
/// ```
///
/// Setting the same option twice keeps the last value. A zero `timeout_after`
/// means cold requests never wait: they are served only if the handler is
/// already available.
#[derive(Clone)]
pub struct Options {
    pub(crate) retry_after: Duration,
    pub(crate) timeout_after: Duration,
    pub(crate) notify: Notify,
}

impl Options {
    /// Interval used for retrying handler creation. The first attempt happens
    /// one interval after construction.
    pub fn retry_after(mut self, interval: Duration) -> Self {
        self.retry_after = interval;
        self
    }

    /// How long a request arriving before the handler exists waits for it.
    pub fn timeout_after(mut self, timeout: Duration) -> Self {
        self.timeout_after = timeout;
        self
    }

    /// Called with the error of every failed creation attempt. Runs on the
    /// retry task, so it must return quickly.
    pub fn notify<F>(mut self, notify: F) -> Self
    where
        F: Fn(BoxError) + Send + Sync + 'static,
    {
        self.notify = Arc::new(notify);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_after.is_zero() {
            return Err(ConfigError::ZeroRetryInterval);
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retry_after: DEFAULT_RETRY_AFTER,
            timeout_after: DEFAULT_TIMEOUT_AFTER,
            notify: Arc::new(|_| {}),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("retry_after", &self.retry_after)
            .field("timeout_after", &self.timeout_after)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.retry_after, Duration::from_secs(10));
        assert_eq!(options.timeout_after, Duration::from_secs(15));
        assert_eq!(options.validate(), Ok(()));

        // The default notifier accepts anything.
        (options.notify)("boom".into());
    }

    #[test]
    fn last_write_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let options = Options::default()
            .retry_after(Duration::from_millis(50))
            .timeout_after(Duration::from_millis(500))
            .retry_after(Duration::from_millis(75))
            .notify(|_| panic!("replaced notifier must not be called"))
            .notify(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        assert_eq!(options.retry_after, Duration::from_millis(75));
        assert_eq!(options.timeout_after, Duration::from_millis(500));

        (options.notify)("boom".into());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_retry_interval_is_rejected() {
        let options = Options::default().retry_after(Duration::ZERO);
        assert_eq!(options.validate(), Err(ConfigError::ZeroRetryInterval));
    }

    #[test]
    fn zero_timeout_is_accepted() {
        let options = Options::default().timeout_after(Duration::ZERO);
        assert_eq!(options.validate(), Ok(()));
    }
}
