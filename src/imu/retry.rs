use std::time::Duration;
use tracing::{debug, warn};

use super::error::ImuError;

pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Bounded retry with a fixed pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Pause between attempts. `None` defers to the driver's poll interval.
    pub interval: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            interval: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Option<Duration>) -> Self {
        Self { attempts, interval }
    }

    /// Runs `attempt` until it succeeds or the attempts are used up.
    /// Returns the number of attempts it took.
    pub fn run<F>(&self, fallback_interval: Duration, mut attempt: F) -> Result<u32, ImuError>
    where
        F: FnMut() -> bool,
    {
        let interval = self.interval.unwrap_or(fallback_interval);
        let attempts = self.attempts.max(1);

        for n in 1..=attempts {
            if attempt() {
                debug!("Succeeded on attempt {}/{}", n, attempts);
                return Ok(n);
            }
            if n < attempts {
                debug!("Attempt {}/{} failed, retrying in {:?}", n, attempts, interval);
                std::thread::sleep(interval);
            }
        }

        warn!("Giving up after {} attempts", attempts);
        Err(ImuError::ReadFailed { attempts })
    }
}
