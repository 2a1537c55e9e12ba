//! Readiness polling.
//!
//! The single waiting primitive used by every stage: query a predicate at a
//! fixed interval until it reports ready or the deadline passes. Predicate
//! errors are logged and retried, because remote APIs are routinely flaky
//! while the resources they describe are being provisioned.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::ui;

/// Outcome of one predicate query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// Target state reached.
    Ready(T),
    /// Not there yet; carries the observed state for progress reporting.
    Pending(String),
}

/// Interval and deadline for a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between queries.
    #[serde(with = "secs")]
    pub interval: Duration,
    /// Total wait budget.
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl PollConfig {
    /// Poll every `interval_secs` for at most `timeout_secs`.
    #[must_use]
    pub fn new(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// The wait budget ran out.
///
/// This says nothing about whether the target is reachable, only that it was
/// not reached in time.
#[derive(Debug, Error)]
#[error(
    "Timed out after {}s waiting for {what} ({attempts} checks, last observed: {last_observed})",
    .elapsed.as_secs()
)]
pub struct PollTimeout {
    /// What was being waited for.
    pub what: String,
    /// Time spent waiting.
    pub elapsed: Duration,
    /// Last observed state (or last predicate error).
    pub last_observed: String,
    /// Number of predicate queries issued.
    pub attempts: u32,
}

/// Poll `predicate` until it returns [`Probe::Ready`] or `config.timeout` elapses.
///
/// The predicate is always queried at least once, even with a zero timeout.
///
/// # Errors
///
/// Returns [`PollTimeout`] with the last observed state when the deadline passes.
pub async fn poll_until<T, E, F, Fut>(
    config: &PollConfig,
    what: &str,
    mut predicate: F,
) -> Result<T, PollTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
    E: Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let last_observed = match predicate().await {
            Ok(Probe::Ready(value)) => {
                debug!(
                    what = %what,
                    attempts,
                    elapsed_secs = start.elapsed().as_secs(),
                    "Condition met"
                );
                return Ok(value);
            }
            Ok(Probe::Pending(observed)) => observed,
            Err(e) => {
                warn!(what = %what, attempt = attempts, error = %e, "Readiness check failed, retrying");
                format!("error: {e}")
            }
        };

        let elapsed = start.elapsed();
        ui::print_poll_progress(what, elapsed, &last_observed);

        if elapsed >= config.timeout {
            return Err(PollTimeout {
                what: what.to_string(),
                elapsed,
                last_observed,
                attempts,
            });
        }

        tokio::time::sleep(config.interval.min(config.timeout - elapsed)).await;
    }
}
