//! Rate-limit aware retry loop wrapped around every remote call.
//!
//! One logical operation runs inside one [`RetrySession`]. The loop is a small
//! state machine:
//!
//! ```text
//! Attempting ──ok──────────────────────────────▶ Done(Ok)
//!     │ rate limited(d)                              ▲
//!     ▼                                              │
//! WaitingOnRateLimit ──sleep(d)──▶ Attempting        │
//!     │ cancelled ─────────────────────────▶ Done(Err(Cancelled))
//!     │
//! Attempting ──transient, deadline left──▶ Attempting
//! Attempting ──transient, deadline gone──▶ Done(Err(last))
//! Attempting ──permanent─────────────────▶ Done(Err(e))
//! ```
//!
//! The rate-limit sleep is the only timer suspension in the crate.
use std::{future::Future, time::Duration};

use log::{debug, info};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::remote::RemoteError;
use crate::retry::classify::{classify, ErrorClass};

/// Default retry deadline, in seconds.
pub const DEFAULT_RETRY_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Wall-clock budget for one logical operation, across all its attempts.
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_secs(DEFAULT_RETRY_TIMEOUT_SECS)
    }
}

impl RetryConfig {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(secs),
        }
    }
}

/// Bookkeeping for one logical operation. Discarded when it terminates.
#[derive(Debug, Clone, Copy)]
pub struct RetrySession {
    deadline: Instant,
    attempt: u32,
}

impl RetrySession {
    pub fn start(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            attempt: 0,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

enum RetryState<T> {
    Attempting,
    WaitingOnRateLimit {
        retry_after: Duration,
        last: RemoteError,
    },
    Done(Result<T, RemoteError>),
}

/// Runs remote operations until success, permanent failure, or deadline.
///
/// Cloning shares the cancellation token, so cancelling any clone aborts
/// pending waits on all of them.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    cancel: CancellationToken,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    pub fn with_cancellation(config: RetryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> RetryConfig {
        self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Invoke `operation` until it succeeds, fails permanently, or the
    /// session deadline passes.
    ///
    /// - Rate limited: sleep for exactly the requested duration, then retry.
    ///   Cancellation during the sleep returns [`RemoteError::Cancelled`].
    /// - Transient: retry immediately while the deadline allows.
    /// - Permanent: return the error unchanged.
    ///
    /// When the deadline runs out during retryable failures the last error
    /// seen is returned, not a synthetic timeout.
    pub async fn execute<T, F, Fut>(&self, op: &str, mut operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut session = RetrySession::start(self.config.timeout);
        let mut state = RetryState::Attempting;
        loop {
            state = match state {
                RetryState::Attempting => {
                    if self.cancel.is_cancelled() {
                        RetryState::Done(Err(RemoteError::Cancelled))
                    } else {
                        session.attempt += 1;
                        match operation().await {
                            Ok(value) => RetryState::Done(Ok(value)),
                            Err(err) => self.next_state(op, &session, err).await,
                        }
                    }
                }
                RetryState::WaitingOnRateLimit { retry_after, last } => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            info!("{op}: cancelled during rate limit wait");
                            RetryState::Done(Err(RemoteError::Cancelled))
                        }
                        _ = tokio::time::sleep(retry_after) => {
                            if session.is_expired() {
                                RetryState::Done(Err(last))
                            } else {
                                info!("{op}: rate limit wait completed, retrying operation");
                                RetryState::Attempting
                            }
                        }
                    }
                }
                RetryState::Done(result) => return result,
            };
        }
    }

    async fn next_state<T>(
        &self,
        op: &str,
        session: &RetrySession,
        err: RemoteError,
    ) -> RetryState<T> {
        match classify(&err) {
            ErrorClass::RateLimited(retry_after) => {
                info!(
                    "{op}: rate limit exceeded, retrying after delay retry_after_seconds={} attempt={}",
                    retry_after.as_secs_f64(),
                    session.attempt()
                );
                RetryState::WaitingOnRateLimit {
                    retry_after,
                    last: err,
                }
            }
            ErrorClass::Transient if !session.is_expired() => {
                info!(
                    "{op}: transient error detected, retrying operation error={err} attempt={}",
                    session.attempt()
                );
                tokio::task::yield_now().await;
                RetryState::Attempting
            }
            ErrorClass::Transient => {
                debug!("{op}: retry deadline exhausted, last error={err}");
                RetryState::Done(Err(err))
            }
            ErrorClass::Permanent => {
                debug!("{op}: permanent error={err}");
                RetryState::Done(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    };

    #[test]
    fn default_timeout_is_sixty_seconds() {
        assert_eq!(RetryConfig::default().timeout, Duration::from_secs(60));
        assert_eq!(DEFAULT_RETRY_TIMEOUT_SECS, 60);
    }

    #[tokio::test]
    async fn success_returns_after_one_attempt() {
        let exec = RetryExecutor::new(RetryConfig::from_secs(1));
        let calls = AtomicU32::new(0);
        let result = exec
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Ok::<_, RemoteError>("value"))
            })
            .await;
        assert_eq!(result, Ok("value"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_error_is_returned_unchanged_on_first_attempt() {
        let exec = RetryExecutor::new(RetryConfig::from_secs(1));
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = exec
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Err(RemoteError::api("invalid_auth")))
            })
            .await;
        assert_eq!(result, Err(RemoteError::api("invalid_auth")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_errors_retry_until_success() {
        let exec = RetryExecutor::new(RetryConfig::from_secs(5));
        let calls = AtomicU32::new(0);
        let result = exec
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                ready(if n < 3 {
                    Err(RemoteError::Transport("bad gateway".into()))
                } else {
                    Ok(n)
                })
            })
            .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn deadline_exhaustion_returns_last_error() {
        let exec = RetryExecutor::new(RetryConfig {
            timeout: Duration::from_millis(30),
        });
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = exec
            .execute("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                ready(Err(RemoteError::Transport(format!("gateway timeout #{n}"))))
            })
            .await;
        let last = calls.load(Ordering::SeqCst) - 1;
        assert!(last >= 1);
        assert_eq!(
            result,
            Err(RemoteError::Transport(format!("gateway timeout #{last}")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_the_requested_duration() {
        let exec = RetryExecutor::new(RetryConfig::from_secs(60));
        let attempts = Mutex::new(Vec::new());
        let started = Instant::now();
        let result = exec
            .execute("op", || {
                let mut attempts = attempts.lock().unwrap();
                attempts.push(Instant::now());
                ready(if attempts.len() == 1 {
                    Err(RemoteError::RateLimited {
                        retry_after: Duration::from_secs(3),
                    })
                } else {
                    Ok(())
                })
            })
            .await;
        assert_eq!(result, Ok(()));
        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 2);
        let elapsed = attempts[1] - started;
        assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_past_deadline_returns_rate_limit_error() {
        let exec = RetryExecutor::new(RetryConfig::from_secs(2));
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = exec
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Err(RemoteError::RateLimited {
                    retry_after: Duration::from_secs(5),
                }))
            })
            .await;
        assert_eq!(
            result,
            Err(RemoteError::RateLimited {
                retry_after: Duration::from_secs(5)
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_rate_limit_wait() {
        let exec = RetryExecutor::new(RetryConfig::from_secs(120));
        let token = exec.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let calls = AtomicU32::new(0);
        let started = std::time::Instant::now();
        let result: Result<(), _> = exec
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Err(RemoteError::RateLimited {
                    retry_after: Duration::from_secs(30),
                }))
            })
            .await;
        assert_eq!(result, Err(RemoteError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_attempt() {
        let exec = RetryExecutor::new(RetryConfig::from_secs(5));
        exec.cancellation_token().cancel();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = exec
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                ready(Ok(()))
            })
            .await;
        assert_eq!(result, Err(RemoteError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
