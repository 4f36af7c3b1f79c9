use std::time::Duration;

use log::debug;

use crate::http::HttpError;

/// Bounded exponential backoff, applied to timeouts only.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Disables waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, max_attempts)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.base_delay.saturating_mul(1 << exponent);
        delay.min(self.max_delay)
    }

    pub fn execute<T>(
        &self,
        mut operation: impl FnMut() -> Result<T, HttpError>,
    ) -> Result<T, HttpError> {
        let mut attempt = 1;
        loop {
            match operation() {
                Err(error) if error.is_timeout() && attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        "{} (attempt {}/{}), retrying in {:?}",
                        error, attempt, self.max_attempts, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(5), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(Duration::from_millis(500), Duration::from_secs(2), 5);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(2000));
    }

    #[test]
    fn retries_timeouts_until_success() {
        let mut calls = 0;
        let result = RetryPolicy::immediate(3).execute(|| {
            calls += 1;
            if calls < 3 {
                Err(HttpError::Timeout("uri".to_owned()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::immediate(2).execute(|| {
            calls += 1;
            Err(HttpError::Timeout("uri".to_owned()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn does_not_retry_other_failures() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::immediate(5).execute(|| {
            calls += 1;
            Err(HttpError::Transport("uri".to_owned(), "refused".to_owned()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
