// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use parking_lot::Mutex;
use serde::Serialize;

/// Status of the circuit for the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    /// Attempts are permitted.
    Closed,
    /// Attempts are refused for the rest of the run.
    Open,
}

impl CircuitStatus {
    /// Returns the stable `snake_case` name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
        }
    }
}

/// Result of a single attempt as seen by the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The attempt succeeded.
    Success,
    /// The attempt failed.
    Failure,
}

impl ExecutionResult {
    /// Maps a success flag onto an execution result.
    #[must_use]
    pub fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Failure }
    }
}

/// What recording an attempt did to the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCircuitResult {
    /// The status did not change.
    Unchanged,
    /// This call opened the circuit.
    Opened {
        /// Consecutive failures that tripped the circuit.
        consecutive_failures: u32,
    },
}

/// Point-in-time view of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct BreakerSnapshot {
    /// Current status.
    pub status: CircuitStatus,
    /// Consecutive failed attempts observed while closed.
    pub consecutive_failures: u32,
    /// Failures that open the circuit.
    pub threshold: u32,
    /// Attempts refused while open.
    pub rejected: u32,
}

/// Halts further attempts once consecutive failures reach a threshold.
///
/// The breaker is shared by every worker of a run. It starts closed, counts consecutive
/// failed attempts across identifiers, resets the count on any success and opens when the count
/// reaches the threshold. An open circuit stays open until the run ends; a new run gets a new
/// breaker.
///
/// # Examples
///
/// ```
/// use timecard::{CircuitBreaker, CircuitStatus, ExecutionResult, ExitCircuitResult};
///
/// let breaker = CircuitBreaker::new(2);
/// assert!(breaker.before_attempt());
///
/// breaker.record_outcome(ExecutionResult::Failure);
/// let result = breaker.record_outcome(ExecutionResult::Failure);
///
/// assert_eq!(result, ExitCircuitResult::Opened { consecutive_failures: 2 });
/// assert!(!breaker.before_attempt());
/// assert_eq!(breaker.snapshot().status, CircuitStatus::Open);
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    threshold: u32,
}

impl CircuitBreaker {
    /// Creates a closed breaker that opens after `threshold` consecutive failures.
    ///
    /// A threshold of zero is treated as one.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            state: Mutex::new(State::Closed { consecutive_failures: 0 }),
            threshold: threshold.max(1),
        }
    }

    /// Returns whether an attempt may start. Refusals are counted while open.
    pub fn before_attempt(&self) -> bool {
        self.state.lock().enter()
    }

    /// Records the result of a finished attempt.
    ///
    /// Returns [`ExitCircuitResult::Opened`] from exactly one call per breaker: the one whose
    /// failure reached the threshold.
    pub fn record_outcome(&self, result: ExecutionResult) -> ExitCircuitResult {
        self.state.lock().exit(result, self.threshold)
    }

    /// Returns whether the circuit is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), State::Open { .. })
    }

    /// Returns a point-in-time view of the breaker.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock();

        match *state {
            State::Closed { consecutive_failures } => BreakerSnapshot {
                status: CircuitStatus::Closed,
                consecutive_failures,
                threshold: self.threshold,
                rejected: 0,
            },
            State::Open {
                consecutive_failures,
                rejected,
            } => BreakerSnapshot {
                status: CircuitStatus::Open,
                consecutive_failures,
                threshold: self.threshold,
                rejected,
            },
        }
    }
}

#[derive(Debug)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { consecutive_failures: u32, rejected: u32 },
}

impl State {
    fn enter(&mut self) -> bool {
        match self {
            Self::Closed { .. } => true,
            Self::Open { rejected, .. } => {
                *rejected = rejected.saturating_add(1);
                false
            }
        }
    }

    fn exit(&mut self, result: ExecutionResult, threshold: u32) -> ExitCircuitResult {
        match self {
            Self::Closed { consecutive_failures } => match result {
                ExecutionResult::Success => {
                    *consecutive_failures = 0;
                    ExitCircuitResult::Unchanged
                }
                ExecutionResult::Failure => {
                    let failures = consecutive_failures.saturating_add(1);

                    if failures >= threshold {
                        *self = Self::Open {
                            consecutive_failures: failures,
                            rejected: 0,
                        };
                        ExitCircuitResult::Opened {
                            consecutive_failures: failures,
                        }
                    } else {
                        *consecutive_failures = failures;
                        ExitCircuitResult::Unchanged
                    }
                }
            },
            // Attempts that started before the circuit opened may still finish; their results
            // cannot change an open circuit.
            Self::Open { .. } => ExitCircuitResult::Unchanged,
        }
    }
}
