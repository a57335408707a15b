// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use jiff::Timestamp;
use parking_lot::Mutex;
use serde::Serialize;
use tick::Clock;

use crate::retry::fault_detail;
use crate::telemetry::TelemetryHelper;
use crate::{
    ActionOutcome, ActionType, AttendanceAction, BreakerSnapshot, CircuitBreaker, Disposition, ExecutionMode, Identifier, MetricsAggregator,
    OutcomeRecord, RetryPolicy, RunConfig, RunMetrics,
};

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct RunReport {
    /// The action performed for every identifier.
    pub action_type: ActionType,
    /// The run summary.
    pub metrics: RunMetrics,
    /// The breaker state at the end of the run.
    pub breaker: BreakerSnapshot,
    /// One record per input identifier, in input order.
    pub outcomes: Vec<OutcomeRecord>,
}

/// Dispatches identifiers through the retry policy and circuit breaker.
///
/// A runner is configured once and may execute many runs. Each call to [`Runner::run`] gets a
/// fresh circuit breaker and metrics aggregator, so nothing carries over between runs.
///
/// In [`ExecutionMode::Sequential`] identifiers are processed one at a time on the caller's task.
/// In [`ExecutionMode::Parallel`] up to `max_workers` tokio tasks pull identifiers from a shared
/// queue; the caller must be inside a tokio runtime.
///
/// # Examples
///
/// ```
/// use timecard::{ActionError, ActionFn, ActionType, Identifier, RunConfig, Runner};
/// use tick::Clock;
///
/// # async fn run(clock: Clock) {
/// let action = ActionFn::new(|_: Identifier, _: ActionType| async { Ok::<(), ActionError>(()) });
///
/// let runner = Runner::new(action, RunConfig::default(), &clock).name("morning_batch").enable_logs();
/// let report = runner.run(vec![Identifier::new("123456789")], ActionType::CheckIn).await;
///
/// assert_eq!(report.metrics.successes, 1);
/// # }
/// ```
#[derive(Debug)]
pub struct Runner<A> {
    action: Arc<A>,
    config: RunConfig,
    clock: Clock,
    telemetry: TelemetryHelper,
}

impl<A: AttendanceAction> Runner<A> {
    /// Creates a runner for `action` with the given configuration.
    #[must_use]
    pub fn new(action: A, config: RunConfig, clock: &Clock) -> Self {
        Self {
            action: Arc::new(action),
            config,
            clock: clock.clone(),
            telemetry: TelemetryHelper::default(),
        }
    }

    /// Sets the run name used in logs and metrics. Prefer `snake_case`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.telemetry.run_name = name.into();
        self
    }

    /// Enables structured logging of run events.
    #[must_use]
    pub fn enable_logs(mut self) -> Self {
        self.telemetry.logs_enabled = true;
        self
    }

    /// Enables OpenTelemetry counters with the given meter provider.
    ///
    /// Has no effect when the configuration has metrics turned off.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        use crate::telemetry::meter;

        if self.config.metrics_enabled() {
            self.telemetry.event_reporter = Some(meter::create_attendance_event_counter(&meter::create_meter(provider)));
        }

        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Performs `action_type` for every identifier and returns the report.
    ///
    /// Every identifier ends up exactly once in the report, either completed or skipped, and
    /// `outcomes` follow the input order whatever the completion order was.
    pub async fn run(&self, identifiers: Vec<Identifier>, action_type: ActionType) -> RunReport {
        let mode = self.config.mode();
        self.telemetry.run_started(identifiers.len(), action_type, mode);

        let shared = Arc::new(RunShared {
            action: Arc::clone(&self.action),
            policy: RetryPolicy::from_config(&self.clock, &self.config).with_telemetry(self.telemetry.clone()),
            breaker: CircuitBreaker::new(self.config.breaker_threshold()),
            aggregator: MetricsAggregator::new(&self.clock),
            telemetry: self.telemetry.clone(),
            action_type,
            queue: Mutex::new(identifiers.iter().cloned().enumerate().collect()),
            slots: Mutex::new(vec![None; identifiers.len()]),
        });

        match mode {
            ExecutionMode::Sequential => work(Arc::clone(&shared)).await,
            ExecutionMode::Parallel { max_workers } => self.run_parallel(&shared, max_workers).await,
        }

        let dispositions = self.collect(&shared, identifiers);
        let metrics = shared.aggregator.finalize();
        self.telemetry.run_completed(&metrics);

        let timestamp = self.clock.system_time_as::<Timestamp>();

        RunReport {
            action_type,
            metrics,
            breaker: shared.breaker.snapshot(),
            outcomes: dispositions.iter().map(|d| OutcomeRecord::new(d, timestamp)).collect(),
        }
    }

    async fn run_parallel(&self, shared: &Arc<RunShared<A>>, max_workers: u32) {
        let pending = shared.queue.lock().len();
        let workers = usize::try_from(max_workers).unwrap_or(usize::MAX).min(pending);

        let handles: Vec<_> = (0..workers).map(|_| tokio::spawn(work(Arc::clone(shared)))).collect();

        for handle in handles {
            if let Err(error) = handle.await {
                let detail = match error.try_into_panic() {
                    Ok(payload) => fault_detail(&*payload),
                    Err(error) => error.to_string(),
                };

                self.telemetry.worker_fault(&detail);
            }
        }
    }

    /// Takes the finished dispositions in input order. An identifier left without one, because
    /// its worker faulted or was cancelled while processing it, is recorded as a failure.
    fn collect(&self, shared: &RunShared<A>, identifiers: Vec<Identifier>) -> Vec<Disposition> {
        let slots = std::mem::take(&mut *shared.slots.lock());

        slots
            .into_iter()
            .zip(identifiers)
            .map(|(slot, identifier)| {
                slot.unwrap_or_else(|| {
                    let disposition = Disposition::Completed(ActionOutcome::failed(
                        identifier,
                        shared.action_type,
                        1,
                        std::time::Duration::ZERO,
                        "unexpected fault: worker interrupted while processing",
                    ));
                    shared.aggregator.record(&disposition);
                    disposition
                })
            })
            .collect()
    }
}

/// State shared by the workers of one run.
#[derive(Debug)]
struct RunShared<A> {
    action: Arc<A>,
    policy: RetryPolicy,
    breaker: CircuitBreaker,
    aggregator: MetricsAggregator,
    telemetry: TelemetryHelper,
    action_type: ActionType,
    queue: Mutex<VecDeque<(usize, Identifier)>>,
    slots: Mutex<Vec<Option<Disposition>>>,
}

impl<A> RunShared<A> {
    fn next(&self) -> Option<(usize, Identifier)> {
        self.queue.lock().pop_front()
    }

    fn finish(&self, index: usize, disposition: Disposition) {
        self.aggregator.record(&disposition);

        if let Some(slot) = self.slots.lock().get_mut(index) {
            *slot = Some(disposition);
        }
    }
}

/// Drains the queue. A fault outside the action loses only the identifier in flight; the
/// worker reports it and carries on with the rest of the queue.
async fn work<A: AttendanceAction>(shared: Arc<RunShared<A>>) {
    while let Err(payload) = AssertUnwindSafe(drain(&shared)).catch_unwind().await {
        shared.telemetry.worker_fault(&fault_detail(&*payload));
    }
}

async fn drain<A: AttendanceAction>(shared: &RunShared<A>) {
    while let Some((index, identifier)) = shared.next() {
        let disposition = shared
            .policy
            .attempt(&*shared.action, &shared.breaker, &shared.aggregator, identifier, shared.action_type)
            .await;

        shared.finish(index, disposition);
    }
}
