//! Wait - Drive a remote resource to a settled state by polling
//!
//! Mutating calls against the control plane return long before the
//! resource is usable. [`wait_for_state`] polls a refresh function until
//! the observed status leaves its pending set and holds a target status
//! for enough consecutive polls, tolerating a bounded number of
//! "not found" answers while the read path catches up.
//!
//! A wait is described by a [`WaitSpec`], built fresh for each operation:
//!
//! ```ignore
//! let spec = WaitSpec::new([Status::Provisioning], [Status::Available, Status::Failed], timeout)
//!     .continuous_target_occurrence(2);
//! match wait_for_state(&spec, || project_status(fetch(id), |r| Ok(r.status))).await? {
//!     Convergence::Reached(record) => { /* settled */ }
//!     Convergence::Failed(record) => { /* the control plane reported a failure */ }
//!     Convergence::Gone => { /* only for specs with an empty target set */ }
//! }
//! ```

mod refresh;

pub use refresh::{Observation, project_status};

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::{debug, trace};
use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::provider::ProviderError;

/// Poll interval used when a spec doesn't set one
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Consecutive "not found" polls tolerated when a spec doesn't set a limit
pub const DEFAULT_NOT_FOUND_TOLERANCE: u32 = 20;

/// A status label drawn from a closed, resource-specific vocabulary
pub trait Status: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync {
    /// Whether this label reports a terminal failure on the remote side
    fn is_failure(&self) -> bool {
        false
    }
}

/// The instant by which a whole operation has to be done
///
/// An operation may wait several times (the control plane request, the
/// resource itself, then each managed service). Every wait gets only what
/// is left of the budget fixed when the operation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Parameters for one convergence attempt
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSpec<L> {
    /// Labels meaning "still working, keep polling"
    pub pending: Vec<L>,
    /// Labels that end the wait. Empty means the wait ends when the
    /// resource disappears.
    pub target: Vec<L>,
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Time to wait before the first poll
    pub delay: Duration,
    /// Consecutive "not found" polls tolerated before absence is final
    pub not_found_tolerance: u32,
    /// Consecutive target observations required before the wait ends
    pub continuous_target_occurrence: u32,
}

impl<L: Status> WaitSpec<L> {
    pub fn new(pending: impl Into<Vec<L>>, target: impl Into<Vec<L>>, timeout: Duration) -> Self {
        Self {
            pending: pending.into(),
            target: target.into(),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            delay: Duration::ZERO,
            not_found_tolerance: DEFAULT_NOT_FOUND_TOLERANCE,
            continuous_target_occurrence: 1,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn not_found_tolerance(mut self, tolerance: u32) -> Self {
        self.not_found_tolerance = tolerance;
        self
    }

    pub fn continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences;
        self
    }

    /// Whether the disappearance of the resource completes this wait
    pub fn absence_is_success(&self) -> bool {
        self.target.is_empty()
    }

    /// Check that no label is both pending and target
    pub fn validate(&self) -> WaitResult<()> {
        match self.pending.iter().find(|l| self.target.contains(l)) {
            Some(label) => Err(WaitError::InvalidSpec(label.to_string())),
            None => Ok(()),
        }
    }

    fn target_names(&self) -> Vec<String> {
        self.target.iter().map(|l| l.to_string()).collect()
    }

    fn expected_names(&self) -> Vec<String> {
        self.pending
            .iter()
            .chain(self.target.iter())
            .map(|l| l.to_string())
            .collect()
    }
}

/// How a wait ended, when it ended without an error
#[derive(Debug, Clone, PartialEq)]
pub enum Convergence<R> {
    /// A target label that isn't a failure was observed
    Reached(R),
    /// A failure label from the target set was observed. The wait itself
    /// succeeded; deciding what the failure means is up to the caller.
    Failed(R),
    /// The resource disappeared and the spec treats that as success
    Gone,
}

impl<R> Convergence<R> {
    pub fn is_reached(&self) -> bool {
        matches!(self, Convergence::Reached(_))
    }

    /// The observed record, if the wait ended on one
    pub fn into_record(self) -> Option<R> {
        match self {
            Convergence::Reached(record) | Convergence::Failed(record) => Some(record),
            Convergence::Gone => None,
        }
    }
}

/// Errors ending a wait before convergence
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("invalid wait: state {0} is both pending and target")]
    InvalidSpec(String),

    #[error("couldn't find resource ({0} consecutive checks)")]
    NotFound(u32),

    #[error("unexpected state '{}', wanted one of [{}]", .state, .expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error(
        "timeout while waiting for state to become [{}] (last state: '{}', timeout: {:?})",
        .target.join(", "),
        .last_state.as_deref().unwrap_or("none"),
        .timeout
    )]
    Timeout {
        last_state: Option<String>,
        target: Vec<String>,
        timeout: Duration,
    },

    #[error(transparent)]
    Refresh(#[from] ProviderError),
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

impl From<WaitError> for ProviderError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Refresh(inner) => inner,
            WaitError::NotFound(_) => ProviderError::not_found(err.to_string()),
            WaitError::Timeout { .. } => ProviderError::timeout(err.to_string()),
            other => ProviderError::new(other.to_string()),
        }
    }
}

pub type WaitResult<T> = Result<T, WaitError>;

/// Poll `refresh` until the observed status settles according to `spec`.
///
/// `refresh` yields `Ok(None)` while the resource is not visible,
/// `Ok(Some((record, status)))` once it is, and `Err` for anything else.
/// Errors are never retried here.
pub async fn wait_for_state<R, L, F, Fut>(spec: &WaitSpec<L>, mut refresh: F) -> WaitResult<Convergence<R>>
where
    L: Status,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<R, L>, ProviderError>>,
{
    spec.validate()?;

    let started = Instant::now();
    let required = spec.continuous_target_occurrence.max(1);
    let mut not_found_streak = 0u32;
    let mut target_streak = 0u32;
    let mut last_state: Option<L> = None;

    debug!(
        "Waiting for state [{}] (timeout: {:?})",
        spec.target_names().join(", "),
        spec.timeout
    );

    if !spec.delay.is_zero() {
        sleep(spec.delay).await;
    }

    loop {
        match refresh().await? {
            None => {
                target_streak = 0;
                not_found_streak += 1;
                if not_found_streak > spec.not_found_tolerance {
                    if spec.absence_is_success() {
                        debug!("Resource is gone after {} checks", not_found_streak);
                        return Ok(Convergence::Gone);
                    }
                    return Err(WaitError::NotFound(not_found_streak));
                }
                trace!(
                    "Resource not found ({}/{}), retrying",
                    not_found_streak, spec.not_found_tolerance
                );
            }
            Some((record, state)) => {
                not_found_streak = 0;
                last_state = Some(state);

                if spec.target.contains(&state) {
                    target_streak += 1;
                    if target_streak >= required {
                        debug!("Reached state {}", state);
                        return Ok(if state.is_failure() {
                            Convergence::Failed(record)
                        } else {
                            Convergence::Reached(record)
                        });
                    }
                    trace!("Observed {} ({}/{})", state, target_streak, required);
                } else if spec.pending.contains(&state) {
                    target_streak = 0;
                    trace!("Still {}", state);
                } else {
                    return Err(WaitError::UnexpectedState {
                        state: state.to_string(),
                        expected: spec.expected_names(),
                    });
                }
            }
        }

        if started.elapsed() + spec.poll_interval > spec.timeout {
            return Err(WaitError::Timeout {
                last_state: last_state.map(|s| s.to_string()),
                target: spec.target_names(),
                timeout: spec.timeout,
            });
        }
        sleep(spec.poll_interval).await;
    }
}
