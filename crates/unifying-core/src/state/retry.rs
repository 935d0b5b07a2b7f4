//! Bounded retry with an injectable delay.

use std::thread;
use std::time::Duration;

use tracing::debug;

/// Something that can wait. Tests substitute [`NoDelay`].
pub trait Delay: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn sleep(&self, _duration: Duration) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Waited before every attempt, including the first.
    pub delay: Duration,
}

/// How a retried operation failed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// A non-retryable error stopped the loop.
    Aborted { attempt: u32, error: E },
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempts run out.
pub fn retry<T, E, F, R>(
    policy: RetryPolicy,
    delay: &dyn Delay,
    is_retryable: R,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        delay.sleep(policy.delay);
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(error) if is_retryable(&error) => {
                if attempt >= attempts {
                    return Err(RetryError::Exhausted {
                        attempts,
                        last: error,
                    });
                }
                debug!(attempt, error = %error, "Retryable failure");
            }
            Err(error) => return Err(RetryError::Aborted { attempt, error }),
        }
        attempt += 1;
    }
}
