use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and bubbled up without further attempts.
    Fatal { attempt: u32, error: E },
    /// Every allowed attempt failed; `error` is the last one.
    AttemptsExceeded { attempts: u32, error: E },
}

/// Bounded retries with a fixed delay between attempts: no exponential
/// growth, no jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Executes `op` until it succeeds, a failure is classified as fatal, or
    /// `max_attempts` attempts have been made. `op` receives the 1-based
    /// attempt number.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(result) => return Ok(result),
                Err(error) => match classify(&error) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal { attempt, error }),
                    RetryDisposition::Retry => {
                        if attempt >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded {
                                attempts: attempt,
                                error,
                            });
                        }

                        warn!(
                            attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = self.backoff.as_millis() as u64,
                            "Retrying"
                        );
                        sleep(self.backoff).await;
                        attempt += 1;
                    }
                },
            }
        }
    }
}
