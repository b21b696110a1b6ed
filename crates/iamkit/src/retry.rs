//! Backoff for IAM calls that hit throttling or a flaky network.
//!
//! IAM is a global service with low per-account request rates; a burst of
//! detaches during removal commonly draws `Throttling: Rate exceeded`.
//! Those errors, and connection failures, are retried. Everything else
//! (access denied, missing entities, conflicts) is returned on first sight
//! because repeating the request cannot change the answer.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use std::thread;

/// Notified before each backoff sleep.
pub trait RetryCallback {
    /// `attempt` is the 1-indexed attempt that just failed with `error`;
    /// the next one starts after `delay_ms`.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u64);
}

/// Reports retries as warnings through the `log` facade.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u64) {
        log::warn!(
            "{} on attempt {attempt}/{max_attempts}: {error}. Retrying in {delay_ms}ms...",
            error.category().description()
        );
    }
}

/// Run an IAM call, retrying throttling and network failures.
///
/// A `max_attempts` of zero still makes one attempt.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let error = match operation() {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        attempt += 1;
        if !error.is_retryable() || attempt >= max_attempts {
            return Err(error);
        }

        let delay = config.delay_for_attempt(attempt - 1);
        if let Some(cb) = callback {
            cb.on_retry(attempt, max_attempts, &error, delay.as_millis() as u64);
        }
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_with_retry_success_first_try() {
        let config = RetryConfig::no_retry();
        let result = with_retry(&config, None, || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_with_retry_non_retryable_error() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<()> = with_retry(&fast_config(5), None, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Err(Error::NotFound {
                message: "policy".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_with_retry_eventual_success() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry(&fast_config(3), None, || {
            let current = attempts_clone.get();
            attempts_clone.set(current + 1);
            if current < 2 {
                Err(Error::Throttling {
                    message: "Rate exceeded".to_string(),
                })
            } else {
                Ok("arn")
            }
        });

        assert_eq!(result.unwrap(), "arn");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_with_retry_all_attempts_fail() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<()> = with_retry(&fast_config(3), None, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Err(Error::Network {
                message: "connection reset".to_string(),
            })
        });

        assert!(matches!(result, Err(Error::Network { .. })));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_callback_invoked() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingCallback(Arc<AtomicU32>);
        impl RetryCallback for CountingCallback {
            fn on_retry(&self, _: u32, _: u32, _: &Error, _: u64) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let callback_count = Arc::new(AtomicU32::new(0));
        let callback = CountingCallback(callback_count.clone());

        let _: Result<()> = with_retry(&fast_config(3), Some(&callback), || {
            Err(Error::Throttling {
                message: "Rate exceeded".to_string(),
            })
        });

        // Called between attempts only
        assert_eq!(callback_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_attempts_still_reaches_backend() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result = with_retry(&fast_config(0), None, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Ok::<_, Error>("arn")
        });

        assert_eq!(result.unwrap(), "arn");
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_zero_attempts_returns_the_real_error() {
        let result: Result<()> = with_retry(&fast_config(0), None, || {
            Err(Error::Throttling {
                message: "Rate exceeded".to_string(),
            })
        });

        assert!(matches!(result, Err(Error::Throttling { .. })));
    }
}
