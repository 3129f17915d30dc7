//! Bounded retry with a fixed delay schedule.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TetherError;
use crate::taxonomy::ErrorTaxonomy;

type RetryPredicate = Box<dyn Fn(&TetherError, u32) -> bool + Send + Sync>;
type RetryCallback = Box<dyn Fn(&TetherError, u32, Duration) + Send + Sync>;

/// Retry policy configuration.
///
/// Retryability comes from the injected taxonomy for coded failures,
/// `code >= 5000` for uncoded ones, and is always granted for transport
/// failures and timeouts. The policy never looks at the HTTP method; callers
/// gate non-idempotent requests themselves.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before retry `n` (0-based) is `delay_schedule[n]`.
    pub delay_schedule: Vec<Duration>,
    /// Cap for delays past the end of the schedule.
    pub max_delay: Duration,
    taxonomy: Arc<ErrorTaxonomy>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_schedule: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
            max_delay: Duration::from_secs(30),
            taxonomy: ErrorTaxonomy::shared(),
        }
    }
}

/// Per-call overrides for [`RetryPolicy::execute_with`].
#[derive(Default)]
pub struct RetryOptions {
    max_retries: Option<u32>,
    delay_schedule: Option<Vec<Duration>>,
    should_retry: Option<RetryPredicate>,
    on_retry: Option<RetryCallback>,
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("delay_schedule", &self.delay_schedule)
            .field("should_retry", &self.should_retry.as_ref().map(|_| ".."))
            .field("on_retry", &self.on_retry.as_ref().map(|_| ".."))
            .finish()
    }
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn delay_schedule(mut self, schedule: Vec<Duration>) -> Self {
        self.delay_schedule = Some(schedule);
        self
    }

    /// Replace the retryability check. Receives the error and the 0-based attempt.
    pub fn should_retry(
        mut self,
        predicate: impl Fn(&TetherError, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Some(Box::new(predicate));
        self
    }

    /// Called before each retry with the error, the 1-based retry number and the delay.
    pub fn on_retry(
        mut self,
        callback: impl Fn(&TetherError, u32, Duration) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(callback));
        self
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay_schedule: Vec<Duration>) -> Self {
        Self {
            max_retries,
            delay_schedule,
            ..Self::default()
        }
    }

    pub fn with_taxonomy(mut self, taxonomy: Arc<ErrorTaxonomy>) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn taxonomy(&self) -> &Arc<ErrorTaxonomy> {
        &self.taxonomy
    }

    /// Whether a failure at 0-based `attempt` should be retried.
    pub fn should_retry(&self, error: &TetherError, attempt: u32) -> bool {
        attempt < self.max_retries && self.is_retryable(error)
    }

    /// Retryability ignoring the attempt budget.
    pub fn is_retryable(&self, error: &TetherError) -> bool {
        error.is_retryable_in(&self.taxonomy)
    }

    /// Delay before retrying after the failure of `attempt`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        delay_for(&self.delay_schedule, self.max_delay, attempt)
    }

    /// Execute an async operation with retry.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, TetherError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TetherError>>,
    {
        self.execute_with(operation, RetryOptions::default()).await
    }

    /// Execute with per-call overrides. The operation runs at most
    /// `max_retries + 1` times and the last error is returned.
    pub async fn execute_with<F, Fut, T>(
        &self,
        mut operation: F,
        options: RetryOptions,
    ) -> Result<T, TetherError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TetherError>>,
    {
        let max_retries = options.max_retries.unwrap_or(self.max_retries);
        let schedule = options
            .delay_schedule
            .as_deref()
            .unwrap_or(&self.delay_schedule);
        let mut attempt = 0;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let retryable = match &options.should_retry {
                Some(predicate) => predicate(&error, attempt),
                None => self.is_retryable(&error),
            };
            if attempt >= max_retries || !retryable {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, error = %error, "Giving up after retries");
                }
                return Err(error);
            }

            let delay = delay_for(schedule, self.max_delay, attempt);
            tracing::warn!(
                attempt = attempt + 1,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after error"
            );
            if let Some(callback) = &options.on_retry {
                callback(&error, attempt + 1, delay);
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn delay_for(schedule: &[Duration], max_delay: Duration, attempt: u32) -> Duration {
    if let Some(delay) = schedule.get(attempt as usize) {
        return *delay;
    }
    2u64.checked_pow(attempt)
        .map(Duration::from_secs)
        .unwrap_or(max_delay)
        .min(max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorResponse;

    #[test]
    fn delays_follow_schedule_then_exponential_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_delay(0), Duration::from_secs(1));
        assert_eq!(policy.retry_delay(1), Duration::from_secs(2));
        assert_eq!(policy.retry_delay(2), Duration::from_secs(4));
        assert_eq!(policy.retry_delay(3), Duration::from_secs(8));
        assert_eq!(policy.retry_delay(5), Duration::from_secs(30));
        assert_eq!(policy.retry_delay(200), Duration::from_secs(30));
    }

    #[test]
    fn retryability_uses_taxonomy_then_code_range() {
        let policy = RetryPolicy::default();
        let db = TetherError::api(ErrorResponse::new(5003, "DATABASE_ERROR", "db"));
        let validation = TetherError::api(ErrorResponse::new(4000, "VALIDATION_ERROR", "bad"));
        let uncoded_server = TetherError::api(ErrorResponse::unknown(5099, "boom"));
        let uncoded_client = TetherError::api(ErrorResponse::unknown(409, "conflict"));

        assert!(policy.should_retry(&db, 0));
        assert!(!policy.should_retry(&db, 3));
        assert!(!policy.should_retry(&validation, 0));
        assert!(policy.should_retry(&uncoded_server, 2));
        assert!(!policy.should_retry(&uncoded_client, 0));
        assert!(policy.should_retry(&TetherError::Timeout(10_000), 0));
        assert!(!policy.should_retry(&TetherError::Configuration("x".into()), 0));
    }

    #[test]
    fn injected_taxonomy_overrides_retryability() {
        let mut taxonomy = ErrorTaxonomy::builtin();
        let mut entry = taxonomy.lookup("DATABASE_ERROR").clone();
        entry.retryable = false;
        taxonomy.insert("DATABASE_ERROR", entry);
        let policy = RetryPolicy::default().with_taxonomy(Arc::new(taxonomy));
        let db = TetherError::api(ErrorResponse::new(5003, "DATABASE_ERROR", "db"));
        assert!(!policy.should_retry(&db, 0));
    }
}
