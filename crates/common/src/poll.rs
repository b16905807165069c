//! Bounded polling
//!
//! Every wait in the harness (backend readiness, rendered-page assertions)
//! goes through [`Poll::until`]: a fixed attempt budget, a delay between
//! attempts that may grow geometrically up to a cap, and an outcome that
//! keeps "gave up" apart from "aborted".

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Result of a single probe
#[derive(Debug)]
pub enum Probe<T, E> {
    /// Condition satisfied
    Ready(T),
    /// Not yet; the string says why, for the timeout message
    Pending(String),
    /// Stop immediately, retrying cannot help
    Abort(E),
}

/// Failure of a bounded poll
#[derive(Error, Debug)]
pub enum PollError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("{0}")]
    Aborted(E),
}

/// Attempt budget and pacing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poll {
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: f64,
    pub max_interval: Duration,
}

impl Poll {
    /// Constant delay between attempts
    pub const fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: 1.0,
            max_interval: interval,
        }
    }

    /// Multiply the delay by `factor` after every attempt, never above `cap`
    pub fn with_backoff(mut self, factor: f64, cap: Duration) -> Self {
        self.backoff = factor.max(1.0);
        self.max_interval = cap.max(self.interval);
        self
    }

    /// Backend readiness: 60 attempts, 500 ms apart
    pub const fn readiness() -> Self {
        Self::fixed(60, Duration::from_millis(500))
    }

    /// Rendered-page assertions: starts at 50 ms, backs off to 500 ms
    pub fn assertion_default() -> Self {
        Self::fixed(40, Duration::from_millis(50)).with_backoff(1.5, Duration::from_millis(500))
    }

    /// Upper bound on the time spent sleeping between attempts
    pub fn budget(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut delay = self.interval;
        for _ in 1..self.max_attempts {
            total += delay;
            delay = self.next_delay(delay);
        }
        total
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.backoff).min(self.max_interval)
    }

    /// Run `probe` until it is ready, aborts, or the budget runs out.
    /// The probe receives the 1-based attempt number.
    pub async fn until<T, E, F, Fut>(&self, mut probe: F) -> Result<T, PollError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Probe<T, E>>,
    {
        let mut delay = self.interval;
        let mut last = String::from("no attempt made");

        for attempt in 1..=self.max_attempts {
            match probe(attempt).await {
                Probe::Ready(value) => return Ok(value),
                Probe::Abort(err) => return Err(PollError::Aborted(err)),
                Probe::Pending(reason) => last = reason,
            }

            if attempt < self.max_attempts {
                sleep(delay).await;
                delay = self.next_delay(delay);
            }
        }

        Err(PollError::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}
