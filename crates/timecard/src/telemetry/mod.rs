// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logs and OpenTelemetry counters for attendance runs.
//!
//! Logs are emitted through `tracing` when enabled on the [`Runner`][crate::Runner]. Counters
//! are emitted when the `metrics` feature is enabled, a meter provider was supplied and the run
//! configuration has metrics turned on.

use std::borrow::Cow;
use std::time::Duration;

use crate::{ActionOutcome, ActionType, Attempt, ExecutionMode, Identifier, RunMetrics};

pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod meter;
#[cfg(test)]
pub(crate) mod testing;

pub(crate) const DEFAULT_RUN_NAME: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunEvent {
    Success,
    Failure,
    Skipped,
    Retry,
    CircuitOpened,
}

impl RunEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
            Self::Retry => "retry",
            Self::CircuitOpened => "circuit_opened",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    pub(crate) run_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    pub(crate) logs_enabled: bool,
}

impl Default for TelemetryHelper {
    fn default() -> Self {
        Self {
            run_name: Cow::Borrowed(DEFAULT_RUN_NAME),
            #[cfg(any(feature = "metrics", test))]
            event_reporter: None,
            logs_enabled: false,
        }
    }
}

impl TelemetryHelper {
    #[cfg(test)]
    pub(crate) fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "unused when metrics feature not used")
    )]
    pub(crate) fn report(&self, event: RunEvent, action_type: ActionType) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(reporter) = &self.event_reporter {
            use attributes::{ACTION_TYPE, EVENT_NAME, RUN_NAME};
            use opentelemetry::KeyValue;

            reporter.add(
                1,
                &[
                    KeyValue::new(RUN_NAME, self.run_name.clone()),
                    KeyValue::new(EVENT_NAME, event.as_str()),
                    KeyValue::new(ACTION_TYPE, action_type.as_str()),
                ],
            );
        }
    }

    pub(crate) fn run_started(&self, identifiers: usize, action_type: ActionType, mode: ExecutionMode) {
        if !self.logs_enabled {
            return;
        }

        let workers = match mode {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel { max_workers } => max_workers,
        };

        tracing::event!(
            name: "timecard.run.started",
            tracing::Level::INFO,
            run.name = %self.run_name,
            attendance.action.type = %action_type,
            run.identifiers = identifiers,
            run.parallel = matches!(mode, ExecutionMode::Parallel { .. }),
            run.workers = workers,
        );
    }

    pub(crate) fn attempt_failed(&self, outcome: &ActionOutcome, attempt: Attempt, faulted: bool) {
        self.report(RunEvent::Failure, outcome.action_type);

        if self.logs_enabled {
            tracing::event!(
                name: "timecard.attempt.failed",
                tracing::Level::WARN,
                run.name = %self.run_name,
                attendance.identifier = %outcome.identifier,
                attendance.action.type = %outcome.action_type,
                attendance.attempt.number = attempt.number(),
                attendance.attempt.is_last = attempt.is_last(),
                attendance.attempt.faulted = faulted,
                attendance.attempt.duration = outcome.duration.as_secs_f32(),
                error.detail = outcome.error_detail.as_deref().unwrap_or_default(),
            );
        }
    }

    pub(crate) fn retry(&self, identifier: &Identifier, action_type: ActionType, attempt: Attempt, delay: Duration) {
        self.report(RunEvent::Retry, action_type);

        if self.logs_enabled {
            tracing::event!(
                name: "timecard.retry",
                tracing::Level::WARN,
                run.name = %self.run_name,
                attendance.identifier = %identifier,
                attendance.attempt.number = attempt.number(),
                attendance.retry.delay = delay.as_secs_f32(),
            );
        }
    }

    pub(crate) fn stagger(&self, identifier: &Identifier, delay: Duration, coincided: bool) {
        if self.logs_enabled {
            tracing::event!(
                name: "timecard.stagger",
                tracing::Level::INFO,
                run.name = %self.run_name,
                attendance.identifier = %identifier,
                attendance.stagger.delay = delay.as_secs_f32(),
                attendance.stagger.coincided = coincided,
            );
        }
    }

    pub(crate) fn circuit_opened(&self, identifier: &Identifier, action_type: ActionType, consecutive_failures: u32) {
        self.report(RunEvent::CircuitOpened, action_type);

        if self.logs_enabled {
            tracing::event!(
                name: "timecard.circuit.opened",
                tracing::Level::ERROR,
                run.name = %self.run_name,
                attendance.identifier = %identifier,
                circuit.consecutive_failures = consecutive_failures,
            );
        }
    }

    pub(crate) fn identifier_skipped(&self, identifier: &Identifier, action_type: ActionType) {
        self.report(RunEvent::Skipped, action_type);

        if self.logs_enabled {
            tracing::event!(
                name: "timecard.identifier.skipped",
                tracing::Level::WARN,
                run.name = %self.run_name,
                attendance.identifier = %identifier,
                attendance.action.type = %action_type,
            );
        }
    }

    pub(crate) fn identifier_completed(&self, outcome: &ActionOutcome) {
        if outcome.success {
            self.report(RunEvent::Success, outcome.action_type);
        }

        if self.logs_enabled {
            tracing::event!(
                name: "timecard.identifier.completed",
                tracing::Level::INFO,
                run.name = %self.run_name,
                attendance.identifier = %outcome.identifier,
                attendance.action.type = %outcome.action_type,
                attendance.success = outcome.success,
                attendance.attempts = outcome.attempt_number,
                attendance.elapsed = outcome.elapsed.as_secs_f32(),
            );
        }
    }

    pub(crate) fn worker_fault(&self, detail: &str) {
        if self.logs_enabled {
            tracing::event!(
                name: "timecard.worker.fault",
                tracing::Level::ERROR,
                run.name = %self.run_name,
                error.detail = detail,
            );
        }
    }

    pub(crate) fn run_completed(&self, metrics: &RunMetrics) {
        if self.logs_enabled {
            tracing::event!(
                name: "timecard.run.completed",
                tracing::Level::INFO,
                run.name = %self.run_name,
                run.successes = metrics.successes,
                run.failures = metrics.failures,
                run.skipped = metrics.skipped,
                run.success_rate = metrics.success_rate,
                run.circuit_opened = metrics.circuit_opened,
                run.elapsed = metrics.elapsed.as_secs_f32(),
            );
        }
    }
}
