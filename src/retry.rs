//! Retry policy and the attempt loop that applies it.
//!
//! A [`RetryPolicy`] classifies each attempt's outcome and, when the failure is
//! transient, decides how long to wait before the next one. Delays grow
//! linearly: the first retry waits `backoff`, the second `2 * backoff`, and so on.

use std::future::Future;
use std::time::Duration;

use http::StatusCode;

use crate::{Error, Result};

/// Defines how many times and how patiently failed requests are retried.
///
/// # Examples
///
/// ```
/// use callsign::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(1000));
///
/// assert_eq!(policy.backoff_for(0), Duration::from_millis(1000));
/// assert_eq!(policy.backoff_for(1), Duration::from_millis(2000));
/// assert_eq!(policy.backoff_for(2), Duration::from_millis(3000));
/// assert_eq!(policy.total_backoff(), Duration::from_millis(6000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: usize,
    /// Base delay, multiplied by the retry index plus one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given retry budget and base backoff.
    pub fn new(max_retries: usize, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Returns the delay before retry number `attempt` (0 for the first retry).
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt)
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        self.backoff.saturating_mul(factor)
    }

    /// Worst-case time spent sleeping if every retry is used.
    ///
    /// Callers that need a hard ceiling on a request can add this to their
    /// per-attempt timeouts; the client does not enforce it.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_retries).fold(Duration::ZERO, |total, attempt| {
            total.saturating_add(self.backoff_for(attempt))
        })
    }

    /// Decides whether an attempt's outcome is worth another attempt.
    ///
    /// Errors defer to [`Error::is_retryable`]; responses retry on 429 and on
    /// any status of 500 or above.
    pub fn should_retry<T: AttemptOutcome>(&self, outcome: &Result<T>) -> bool {
        match outcome {
            Ok(response) => is_retryable_status(response.status()),
            Err(error) => error.is_retryable(),
        }
    }

    /// Drives attempts until one is conclusive or the budget runs out.
    ///
    /// `attempt_fn` receives the zero-based attempt index and must build the
    /// request from scratch each time. The previous outcome is dropped before
    /// sleeping, which releases any response body it still holds.
    ///
    /// When the budget runs out, a transport error from the final attempt is
    /// returned as is; a retryable status becomes [`Error::MaxRetriesExceeded`].
    pub async fn run<T, F, Fut>(&self, attempt_fn: F) -> Result<T>
    where
        T: AttemptOutcome,
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_while(attempt_fn, || true).await
    }

    /// Like [`run`](Self::run), but consults `can_repeat` after each retryable
    /// outcome. When it returns `false` the outcome is final, exactly as if
    /// the budget had run out, and no backoff is slept.
    pub async fn run_while<T, F, Fut, R>(&self, mut attempt_fn: F, mut can_repeat: R) -> Result<T>
    where
        T: AttemptOutcome,
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
        R: FnMut() -> bool,
    {
        let mut attempt = 0;

        loop {
            let mut outcome = attempt_fn(attempt).await;
            if let Ok(response) = &mut outcome {
                response.record_attempts(attempt + 1);
            }

            if !self.should_retry(&outcome) {
                return outcome;
            }

            match &outcome {
                Ok(response) => tracing::warn!(
                    status = response.status().as_u16(),
                    attempt = attempt,
                    "Retryable status received"
                ),
                Err(error) => tracing::warn!(
                    error = %error,
                    attempt = attempt,
                    "Request failed"
                ),
            }

            let out_of_budget = attempt >= self.max_retries;
            if out_of_budget || !can_repeat() {
                if !out_of_budget {
                    tracing::warn!(attempt = attempt, "Request cannot be sent again");
                }
                return match outcome {
                    Ok(response) => Err(response.into_exhausted(attempt + 1)),
                    Err(error) => Err(error),
                };
            }

            drop(outcome);

            let delay = self.backoff_for(attempt);
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                attempt = attempt,
                "Retrying request after delay"
            );
            tokio::time::sleep(delay).await;

            attempt += 1;
        }
    }
}

/// Returns `true` for 429 and for every status of 500 or above.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500
}

/// A completed attempt, as seen by the retry loop.
///
/// Implemented by the buffered [`Response`](crate::Response) and the
/// [`StreamingResponse`](crate::StreamingResponse).
pub trait AttemptOutcome {
    /// The status code of the response.
    fn status(&self) -> StatusCode;

    /// Stores the number of attempts it took to get this response.
    fn record_attempts(&mut self, attempts: usize);

    /// Converts the final retryable response into the exhaustion error.
    fn into_exhausted(self, attempts: usize) -> Error;
}
