//! Serve HTTP requests before the handler answering them can be built.
//!
//! [`DeferredHandler`] wraps a fallible, possibly slow factory for an axum
//! service. It can be mounted right away: requests wait (up to a bound) for the
//! factory to succeed, failed attempts are retried on a fixed interval, and the
//! created service is swapped in as soon as it exists. Cancelling the shutdown
//! token before that happens makes the handler fail closed for good.
mod handler;
mod options;
mod relay;
mod retry;

pub use handler::{DeferredHandler, Unavailable};
pub use options::{ConfigError, Notify, Options, DEFAULT_RETRY_AFTER, DEFAULT_TIMEOUT_AFTER};
pub use relay::{Relay, Subscription};
