//! Request deadlines and the remaining-budget calculation.
//!
//! A top-level request creates one [`Deadline`] and hands it to every
//! downstream call. Each call runs under whatever budget is left, so a slow
//! search leaves less time for the page fetch that follows it.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::LookupError;

/// Point in time after which work on behalf of a request is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// Creates a deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
        }
    }

    /// Returns the budget left, or `Timeout` if none remains.
    ///
    /// # Errors
    ///
    /// - `LookupError::Timeout` - The deadline has already passed
    pub fn remaining(&self, operation: &str) -> Result<Duration, LookupError> {
        let now = Instant::now();
        if now >= self.expires_at {
            return Err(LookupError::timeout(operation));
        }
        Ok(self.expires_at - now)
    }

    /// Checks whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Runs `future` with the remaining budget.
    ///
    /// The future is dropped when the budget runs out, which aborts any
    /// request it has in flight.
    ///
    /// # Errors
    ///
    /// - `LookupError::Timeout` - The budget ran out before `future` completed
    /// - Any error produced by `future` itself
    pub async fn run<T, F>(&self, operation: &str, future: F) -> Result<T, LookupError>
    where
        F: Future<Output = Result<T, LookupError>>,
    {
        let budget = self.remaining(operation)?;
        match tokio::time::timeout(budget, future).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::timeout(operation)),
        }
    }
}
