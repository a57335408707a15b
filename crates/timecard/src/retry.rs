// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tick::Clock;

use crate::rnd::Rnd;
use crate::stagger::Stagger;
use crate::telemetry::TelemetryHelper;
use crate::{
    ActionOutcome, ActionType, Attempt, AttendanceAction, CircuitBreaker, Disposition, ExecutionResult, ExitCircuitResult, Identifier,
    MetricsAggregator, RunConfig,
};

/// Drives one identifier through bounded attempts with a fixed delay between them.
///
/// Every attempt is gated by the run's [`CircuitBreaker`] and its result is reported back to
/// it. An identifier whose first attempt is refused is [`Disposition::Skipped`]; once an attempt
/// has been made the disposition is always [`Disposition::Completed`] with the terminal attempt.
///
/// A panic inside the action is contained: it counts as a failed attempt and ends the
/// identifier without further retries.
///
/// With stagger enabled, each identifier first waits a random 1 to 20 minutes. The wait is
/// gated by the breaker on both sides: an open circuit after the wait still skips the identifier.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    clock: Clock,
    max_attempts: u32,
    delay: Duration,
    stagger: Option<Arc<Stagger>>,
    telemetry: TelemetryHelper,
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` total attempts, waiting `delay` between them.
    ///
    /// A budget of zero attempts behaves as one.
    #[must_use]
    pub fn new(clock: &Clock, max_attempts: u32, delay: Duration) -> Self {
        Self {
            clock: clock.clone(),
            max_attempts: max_attempts.max(1),
            delay,
            stagger: None,
            telemetry: TelemetryHelper::default(),
        }
    }

    /// Creates a policy from a validated configuration.
    ///
    /// Stagger offsets avoid each other only among identifiers sharing this policy.
    #[must_use]
    pub fn from_config(clock: &Clock, config: &RunConfig) -> Self {
        let policy = Self::new(clock, config.max_attempts(), config.retry_delay());

        if config.stagger() {
            policy.with_stagger(Stagger::new(Rnd::default()))
        } else {
            policy
        }
    }

    #[must_use]
    pub(crate) fn with_stagger(self, stagger: Stagger) -> Self {
        Self {
            stagger: Some(Arc::new(stagger)),
            ..self
        }
    }

    #[must_use]
    pub(crate) fn with_telemetry(self, telemetry: TelemetryHelper) -> Self {
        Self { telemetry, ..self }
    }

    /// Returns the total number of attempts per identifier.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the fixed delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Performs `action_type` for `identifier`, retrying failed attempts.
    ///
    /// Delays and circuit transitions are recorded into `aggregator`; the returned disposition
    /// is not, so the caller decides when an identifier counts as finished.
    pub async fn attempt<A: AttendanceAction>(
        &self,
        action: &A,
        breaker: &CircuitBreaker,
        aggregator: &MetricsAggregator,
        identifier: Identifier,
        action_type: ActionType,
    ) -> Disposition {
        if !breaker.before_attempt() {
            return self.skip(identifier, action_type);
        }

        if let Some(stagger) = &self.stagger {
            let offset = stagger.next_delay();
            self.telemetry.stagger(&identifier, offset.delay, offset.coincided);
            self.clock.delay(offset.delay).await;
            aggregator.record_stagger(offset.delay, offset.coincided);

            if !breaker.before_attempt() {
                return self.skip(identifier, action_type);
            }
        }

        let stopwatch = self.clock.stopwatch();
        let mut attempt = Attempt::first(self.max_attempts);

        let outcome = loop {
            let output = self.execute(action, &identifier, action_type, attempt).await;

            match self.evaluate_attempt(output, attempt, breaker, aggregator) {
                ControlFlow::Continue(state) => {
                    self.clock.delay(self.delay).await;
                    aggregator.record_delay(self.delay);

                    // the circuit may have opened while waiting
                    if !breaker.before_attempt() {
                        break state.outcome;
                    }

                    attempt = state.attempt;
                }
                ControlFlow::Break(outcome) => break outcome,
            }
        };

        let outcome = outcome.with_elapsed(stopwatch.elapsed());
        self.telemetry.identifier_completed(&outcome);

        Disposition::Completed(outcome)
    }

    fn skip(&self, identifier: Identifier, action_type: ActionType) -> Disposition {
        self.telemetry.identifier_skipped(&identifier, action_type);
        Disposition::Skipped { identifier, action_type }
    }

    async fn execute<A: AttendanceAction>(&self, action: &A, identifier: &Identifier, action_type: ActionType, attempt: Attempt) -> AttemptOutput {
        let stopwatch = self.clock.stopwatch();
        let result = AssertUnwindSafe(async { action.perform(identifier, action_type).await })
            .catch_unwind()
            .await;
        let duration = stopwatch.elapsed();
        let number = attempt.number();

        match result {
            Ok(Ok(())) => AttemptOutput {
                outcome: ActionOutcome::succeeded(identifier.clone(), action_type, number, duration),
                faulted: false,
            },
            Ok(Err(error)) => AttemptOutput {
                outcome: ActionOutcome::failed(identifier.clone(), action_type, number, duration, error.to_string()),
                faulted: false,
            },
            Err(payload) => AttemptOutput {
                outcome: ActionOutcome::failed(identifier.clone(), action_type, number, duration, fault_detail(payload.as_ref())),
                faulted: true,
            },
        }
    }

    fn evaluate_attempt(
        &self,
        output: AttemptOutput,
        attempt: Attempt,
        breaker: &CircuitBreaker,
        aggregator: &MetricsAggregator,
    ) -> ControlFlow<ActionOutcome, ContinueRetry> {
        let AttemptOutput { outcome, faulted } = output;

        if let ExitCircuitResult::Opened { consecutive_failures } = breaker.record_outcome(ExecutionResult::from_success(outcome.success)) {
            aggregator.record_circuit_opened();
            self.telemetry
                .circuit_opened(&outcome.identifier, outcome.action_type, consecutive_failures);
        }

        if outcome.success {
            return ControlFlow::Break(outcome);
        }

        self.telemetry.attempt_failed(&outcome, attempt, faulted);

        if faulted || breaker.is_open() {
            return ControlFlow::Break(outcome);
        }

        let Some(next_attempt) = attempt.increment(self.max_attempts) else {
            return ControlFlow::Break(outcome);
        };

        self.telemetry
            .retry(&outcome.identifier, outcome.action_type, attempt, self.delay);

        ControlFlow::Continue(ContinueRetry {
            outcome,
            attempt: next_attempt,
        })
    }
}

/// Result of a single attempt before the retry decision.
struct AttemptOutput {
    outcome: ActionOutcome,
    faulted: bool,
}

/// State passed between attempts when continuing the retry loop.
struct ContinueRetry {
    outcome: ActionOutcome,
    attempt: Attempt,
}

pub(crate) fn fault_detail(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());

    format!("unexpected fault: {message}")
}
