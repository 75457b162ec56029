//! Interval-based polling for eventually-available state.
//!
//! [`RetryPoller`] invokes an operation until it succeeds, sleeping a fixed
//! interval between attempts. The loop stops early when its
//! [`CancellationToken`] fires, when the optional overall deadline passes, or
//! when the optional attempt limit is reached. Cancellation interrupts both
//! the wait and an attempt in progress, and no attempt starts after it.
//!
//! ```ignore
//! let poller = RetryPoller::new(Duration::from_secs(5)).with_deadline(Duration::from_secs(300));
//! let outcome = poller
//!     .start(|| async { remote_output(&*remote, "type C:/k/node.crt").await })
//!     .await;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The operation succeeded on attempt number `attempts`.
    Succeeded { value: T, attempts: u32 },
    /// The token fired or the deadline passed.
    Cancelled { attempts: u32 },
    /// `max_attempts` attempts all failed.
    Exhausted { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Succeeded { .. })
    }

    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Succeeded { attempts, .. }
            | PollOutcome::Cancelled { attempts }
            | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            PollOutcome::Succeeded { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Cancellable retry loop with a fixed interval.
#[derive(Debug, Clone)]
pub struct RetryPoller {
    interval: Duration,
    max_attempts: Option<u32>,
    deadline: Option<Duration>,
    token: CancellationToken,
}

impl RetryPoller {
    /// Poll every `interval` until success or cancellation.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Give up after `max_attempts` failures. Zero never invokes the operation.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Stop once `deadline` has elapsed since `start` was called.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Token that stops this poller when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn start<F, Fut, T, E>(&self, mut operation: F) -> PollOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let mut attempts = 0u32;

        if self.max_attempts == Some(0) {
            warn!("Polling allowed no attempts");
            return PollOutcome::Exhausted { attempts };
        }

        loop {
            if self.token.is_cancelled() || deadline.is_some_and(|at| Instant::now() >= at) {
                debug!("Polling cancelled after {} attempt(s)", attempts);
                return PollOutcome::Cancelled { attempts };
            }

            attempts += 1;
            let result = tokio::select! {
                biased;

                _ = self.token.cancelled() => return PollOutcome::Cancelled { attempts },
                _ = sleep_until(deadline) => return PollOutcome::Cancelled { attempts },
                result = operation() => result,
            };

            match result {
                Ok(value) => {
                    if attempts > 1 {
                        info!("Polling succeeded after {} attempt(s)", attempts);
                    }
                    return PollOutcome::Succeeded { value, attempts };
                }
                Err(e) => debug!("Poll attempt {} failed: {}", attempts, e),
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                warn!("Polling gave up after {} attempt(s)", attempts);
                return PollOutcome::Exhausted { attempts };
            }

            tokio::select! {
                biased;

                _ = self.token.cancelled() => return PollOutcome::Cancelled { attempts },
                _ = sleep_until(deadline) => return PollOutcome::Cancelled { attempts },
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
