//! Declare the `RetryTime` enumeration and related code.

use std::time::{Duration, Instant};

/// A description of when an operation may be retried.
///
/// Used by the agent supervisor to decide whether a closed connection
/// should trigger a reconnect, and by the router to decide whether a
/// routing failure is worth surfacing immediately or waiting out.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RetryTime {
    /// The operation can be retried immediately.
    Immediate,

    /// The operation can be retried after a backoff delay.
    ///
    /// The agent supervisor's backoff schedule governs how long that delay
    /// actually is; this variant only says that waiting helps.
    AfterWaiting,

    /// The operation can be retried after a specific delay.
    After(Duration),

    /// Retrying is unlikely to help until something else is fixed first.
    ///
    /// Appropriate for authentication failures and other fatal
    /// misconfiguration: the process should exit rather than loop.
    Never,
}

/// Trait for an error that can tell us when the operation that produced it
/// may be retried.
pub trait HasRetryTime {
    /// Return the time when the operation that gave this error can be
    /// retried.
    fn retry_time(&self) -> RetryTime;

    /// Return an absolute retry time, given the current time and a function
    /// to choose a delay for [`RetryTime::AfterWaiting`].
    fn abs_retry_time<F>(&self, now: Instant, choose_delay: F) -> AbsRetryTime
    where
        F: FnOnce() -> Duration,
    {
        self.retry_time().absolute(now, choose_delay)
    }
}

/// An absolute [`RetryTime`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[allow(clippy::exhaustive_enums)]
pub enum AbsRetryTime {
    /// See [`RetryTime::Immediate`].
    Immediate,
    /// A concrete instant.
    At(Instant),
    /// See [`RetryTime::Never`].
    Never,
}

impl RetryTime {
    /// Convert this [`RetryTime`] into an absolute time.
    pub fn absolute<F>(self, now: Instant, choose_delay: F) -> AbsRetryTime
    where
        F: FnOnce() -> Duration,
    {
        match self {
            RetryTime::Immediate => AbsRetryTime::Immediate,
            RetryTime::AfterWaiting => AbsRetryTime::At(now + choose_delay()),
            RetryTime::After(d) => AbsRetryTime::At(now + d),
            RetryTime::Never => AbsRetryTime::Never,
        }
    }
}
