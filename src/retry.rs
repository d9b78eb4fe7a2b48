//! Retry with exponential backoff for metadata and library HTTP calls
//!
//! Lookups against third-party services fail transiently (timeouts, rate
//! limits, 5xx responses). [`with_retry`] repeats an operation while its
//! error is [`IsRetryable`], doubling the delay each time and optionally
//! adding jitter so that concurrent jobs do not hammer a service in step.
//!
//! ```no_run
//! use tubarr::config::RetryConfig;
//! use tubarr::retry::with_retry;
//!
//! # async fn example() -> tubarr::Result<()> {
//! let config = RetryConfig::default();
//! let body = with_retry(&config, "tmdb search", || async {
//!     Ok::<_, tubarr::Error>("{}".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, MetadataError, ToolError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies errors as transient or permanent.
pub trait IsRetryable {
    /// Whether repeating the operation may succeed
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Tool(ToolError::TimedOut { .. }) => true,
            Error::Metadata(MetadataError::Lookup { reason, .. }) => {
                reason.contains("HTTP 429") || reason.contains("HTTP 5")
            }
            Error::Config { .. }
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::Job(_)
            | Error::Tool(_)
            | Error::Source(_)
            | Error::Metadata(_)
            | Error::NotFound(_)
            | Error::Validation(_)
            | Error::ShuttingDown
            | Error::Serialization(_)
            | Error::Yaml(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently or the attempts run out.
///
/// `max_attempts` counts retries, so the operation runs at most
/// `max_attempts + 1` times. `what` names the operation in log events.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    what: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(what, attempts = attempt + 1, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;
                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tracing::warn!(
                    what,
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis() as u64,
                    "transient failure, retrying"
                );
                tokio::time::sleep(wait).await;
                delay = next_delay(config, delay);
            }
            Err(e) => {
                tracing::debug!(what, error = %e, attempts = attempt + 1, "giving up");
                return Err(e);
            }
        }
    }
}

/// The delay after `current`, capped at the configured maximum
fn next_delay(config: &RetryConfig, current: Duration) -> Duration {
    Duration::try_from_secs_f64(current.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Uniform jitter in `[delay, 2 * delay]`
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    delay.mul_f64(1.0 + factor)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn transient() -> Error {
        Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"))
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(&fast(), "lookup", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok("found")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "found");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), Error> = with_retry(&fast(), "lookup", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_errors_fail_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), Error> = with_retry(&fast(), "lookup", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::Validation("bad query".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delays_grow_and_cap() {
        let config = fast();
        let second = next_delay(&config, config.initial_delay);
        assert_eq!(second, Duration::from_millis(10));
        assert_eq!(next_delay(&config, second), Duration::from_millis(20));
        assert_eq!(
            next_delay(&config, Duration::from_millis(20)),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn jitter_stays_within_double() {
        let base = Duration::from_millis(100);
        for _ in 0..200 {
            let jittered = add_jitter(base);
            assert!(jittered >= base && jittered <= base * 2);
        }
        assert_eq!(add_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn classification() {
        assert!(transient().is_retryable());
        assert!(
            Error::Tool(ToolError::TimedOut {
                tool: "ffprobe".into(),
                seconds: 5
            })
            .is_retryable()
        );
        assert!(
            Error::Metadata(MetadataError::Lookup {
                service: "tvdb".into(),
                reason: "HTTP 503 Service Unavailable".into()
            })
            .is_retryable()
        );
        assert!(
            !Error::Metadata(MetadataError::Lookup {
                service: "tvdb".into(),
                reason: "HTTP 401 Unauthorized".into()
            })
            .is_retryable()
        );
        assert!(!Error::ShuttingDown.is_retryable());
        assert!(
            !Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied"
            ))
            .is_retryable()
        );
    }
}
