// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};
use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tick::{Clock, Stopwatch};

use crate::Disposition;
use crate::outcome::serialize_secs;

/// Summary of one run.
///
/// `successes + failures + skipped == total_identifiers` always holds. Skipped identifiers
/// are excluded from `success_rate` and `average_duration`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct RunMetrics {
    /// Identifiers that reached a terminal disposition.
    pub total_identifiers: u32,
    /// Identifiers whose terminal attempt succeeded.
    pub successes: u32,
    /// Identifiers whose permitted attempts all failed.
    pub failures: u32,
    /// Identifiers never attempted because the circuit was open.
    pub skipped: u32,
    /// Attempts made across all identifiers.
    pub attempts: u32,
    /// `successes / (successes + failures)`, or `0.0` when nothing was attempted.
    pub success_rate: f64,
    /// Time spent on attempted identifiers, summed.
    #[serde(serialize_with = "serialize_secs")]
    pub total_duration: Duration,
    /// `total_duration / (successes + failures)`, or zero when nothing was attempted.
    #[serde(serialize_with = "serialize_secs")]
    pub average_duration: Duration,
    /// Retry delays that were waited out.
    pub delays_applied: u32,
    /// Time spent waiting in retry delays.
    #[serde(serialize_with = "serialize_secs")]
    pub delay_time: Duration,
    /// Stagger waits before first attempts; not included in `delays_applied`.
    pub stagger_delays: u32,
    /// Time spent in stagger waits.
    #[serde(serialize_with = "serialize_secs")]
    pub stagger_time: Duration,
    /// Stagger offsets that could not avoid one already used in the run.
    pub stagger_coincidences: u32,
    /// Whether the circuit opened during the run.
    pub circuit_opened: bool,
    /// Wall-clock time of the run.
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl RunMetrics {
    /// Returns the number of identifiers that were attempted.
    #[must_use]
    pub fn attempted(&self) -> u32 {
        self.successes.saturating_add(self.failures)
    }
}

impl Display for RunMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} identifiers: {} succeeded, {} failed, {} skipped; success rate {:.1}%; {} attempts, {} retry delays; elapsed {:.1}s",
            self.total_identifiers,
            self.successes,
            self.failures,
            self.skipped,
            self.success_rate * 100.0,
            self.attempts,
            self.delays_applied,
            self.elapsed.as_secs_f64(),
        )?;

        if self.stagger_delays > 0 {
            write!(
                f,
                "; {} stagger delays totalling {}m, {} coincided",
                self.stagger_delays,
                self.stagger_time.as_secs() / 60,
                self.stagger_coincidences
            )?;
        }

        if self.circuit_opened {
            f.write_str("; circuit opened")?;
        }

        Ok(())
    }
}

/// Collects counters and timings for one run.
///
/// The aggregator is shared by every worker of a run; all updates go through one lock.
/// [`finalize`][Self::finalize] freezes the summary: the first call computes it, later calls
/// return the same value and later records no longer change it.
#[derive(Debug)]
pub struct MetricsAggregator {
    tally: Mutex<Tally>,
    stopwatch: Stopwatch,
    finalized: OnceLock<RunMetrics>,
}

#[derive(Debug, Default)]
struct Tally {
    successes: u32,
    failures: u32,
    skipped: u32,
    attempts: u32,
    total_duration: Duration,
    delays_applied: u32,
    delay_time: Duration,
    stagger_delays: u32,
    stagger_time: Duration,
    stagger_coincidences: u32,
    circuit_opened: bool,
}

impl MetricsAggregator {
    /// Creates an empty aggregator; the run's elapsed time is measured from here.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self {
            tally: Mutex::new(Tally::default()),
            stopwatch: clock.stopwatch(),
            finalized: OnceLock::new(),
        }
    }

    /// Records the terminal disposition of one identifier.
    pub fn record(&self, disposition: &Disposition) {
        if self.finalized.get().is_some() {
            return;
        }

        let mut tally = self.tally.lock();

        match disposition {
            Disposition::Completed(outcome) => {
                if outcome.success {
                    tally.successes = tally.successes.saturating_add(1);
                } else {
                    tally.failures = tally.failures.saturating_add(1);
                }

                tally.attempts = tally.attempts.saturating_add(outcome.attempt_number);
                tally.total_duration = tally.total_duration.saturating_add(outcome.elapsed);
            }
            Disposition::Skipped { .. } => tally.skipped = tally.skipped.saturating_add(1),
        }
    }

    /// Records a retry delay that was waited out.
    pub fn record_delay(&self, delay: Duration) {
        let mut tally = self.tally.lock();
        tally.delays_applied = tally.delays_applied.saturating_add(1);
        tally.delay_time = tally.delay_time.saturating_add(delay);
    }

    /// Records a stagger wait before a first attempt.
    pub fn record_stagger(&self, delay: Duration, coincided: bool) {
        let mut tally = self.tally.lock();
        tally.stagger_delays = tally.stagger_delays.saturating_add(1);
        tally.stagger_time = tally.stagger_time.saturating_add(delay);

        if coincided {
            tally.stagger_coincidences = tally.stagger_coincidences.saturating_add(1);
        }
    }

    /// Records that the circuit opened.
    pub fn record_circuit_opened(&self) {
        self.tally.lock().circuit_opened = true;
    }

    /// Returns the run summary, computing it on the first call.
    pub fn finalize(&self) -> RunMetrics {
        self.finalized.get_or_init(|| self.tally.lock().summarize(self.stopwatch.elapsed())).clone()
    }
}

impl Tally {
    fn summarize(&self, elapsed: Duration) -> RunMetrics {
        let attempted = self.successes.saturating_add(self.failures);

        let success_rate = if attempted == 0 {
            0.0
        } else {
            f64::from(self.successes) / f64::from(attempted)
        };

        RunMetrics {
            total_identifiers: attempted.saturating_add(self.skipped),
            successes: self.successes,
            failures: self.failures,
            skipped: self.skipped,
            attempts: self.attempts,
            success_rate,
            total_duration: self.total_duration,
            average_duration: self.total_duration.checked_div(attempted).unwrap_or_default(),
            delays_applied: self.delays_applied,
            delay_time: self.delay_time,
            stagger_delays: self.stagger_delays,
            stagger_time: self.stagger_time,
            stagger_coincidences: self.stagger_coincidences,
            circuit_opened: self.circuit_opened,
            elapsed,
        }
    }
}
