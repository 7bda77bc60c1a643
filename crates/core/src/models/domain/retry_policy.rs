use std::time::Duration;

use thiserror::Error;

use crate::shared::cancellation::CancellationToken;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },
    #[error("cancelled")]
    Cancelled,
}

/// Bounded retry with linear backoff.
///
/// Before attempt `k + 1` the policy waits `k * base_delay`. There is no wait
/// after the final attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Runs `op` until it succeeds, the attempts run out, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, E, F>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    })
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    log::warn!("Attempt {attempt}/{max} failed: {e}; retrying in {delay:?}");
                    if !cancel.sleep(delay) {
                        return Err(RetryError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn fast(max: u32) -> RetryPolicy {
        RetryPolicy::new(max, Duration::from_millis(1))
    }

    #[test]
    fn test_default_is_two_attempts_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
    }

    #[test]
    fn test_success_on_first_attempt() {
        let mut calls = 0;
        let result: Result<u32, RetryError<String>> = fast(2).run(&CancellationToken::new(), |n| {
            calls += 1;
            Ok(n)
        });
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_success_on_second_attempt() {
        let result: Result<u32, RetryError<String>> = fast(2).run(&CancellationToken::new(), |n| {
            if n == 1 {
                Err("boom".to_string())
            } else {
                Ok(n)
            }
        });
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_never_exceeds_max_attempts() {
        let mut calls = 0;
        let result: Result<(), RetryError<String>> = fast(2).run(&CancellationToken::new(), |n| {
            calls += 1;
            if n < 3 {
                Err(format!("fail {n}"))
            } else {
                Ok(())
            }
        });
        assert_eq!(calls, 2);
        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert_eq!(last, "fail 2");
            }
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut calls = 0;
        let _: Result<(), RetryError<String>> =
            RetryPolicy::new(0, Duration::ZERO).run(&CancellationToken::new(), |_| {
                calls += 1;
                Err("x".to_string())
            });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_cancel_during_backoff_stops_retrying() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::new(3, Duration::from_secs(30));
        let mut calls = 0;
        let start = Instant::now();
        let result: Result<(), RetryError<String>> = policy.run(&cancel, |_| {
            calls += 1;
            cancel.cancel();
            Err("fail".to_string())
        });
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls, 1);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_no_wait_after_final_attempt() {
        let policy = RetryPolicy::new(1, Duration::from_secs(30));
        let start = Instant::now();
        let _: Result<(), RetryError<String>> =
            policy.run(&CancellationToken::new(), |_| Err("fail".to_string()));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
