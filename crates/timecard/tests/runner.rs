// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for attendance runs using only public API.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rstest::rstest;
use tick::{Clock, ClockControl};
use timecard::{
    ActionError, ActionFn, ActionType, AttendanceAction, CircuitStatus, Identifier, OutcomeStatus, RunConfig, RunSettings, Runner,
};

fn clock() -> Clock {
    ClockControl::new().auto_advance_timers(true).to_clock()
}

fn ids(count: usize) -> Vec<Identifier> {
    (1..=count).map(|n| Identifier::new(format!("{n}{n}{n}{n}{n}{n}{n}{n}{n}"))).collect()
}

fn config(settings: RunSettings) -> RunConfig {
    settings.validate().unwrap()
}

/// Fails every call for the listed identifiers, counting all invocations.
fn failing_for(failing: &[Identifier], calls: &Arc<AtomicU32>) -> impl AttendanceAction {
    let failing: HashSet<Identifier> = failing.iter().cloned().collect();
    let calls = Arc::clone(calls);

    ActionFn::new(move |identifier: Identifier, _: ActionType| {
        calls.fetch_add(1, Ordering::SeqCst);
        let fails = failing.contains(&identifier);
        async move {
            if fails {
                Err(ActionError::from_message("attendance portal unavailable"))
            } else {
                Ok(())
            }
        }
    })
}

#[tokio::test]
async fn circuit_opens_and_skips_remaining() {
    let identifiers = ids(3);
    let calls = Arc::new(AtomicU32::new(0));
    let runner = Runner::new(
        failing_for(&identifiers[..2], &calls),
        config(RunSettings {
            max_attempts: 1,
            circuit_breaker_threshold: 2,
            ..RunSettings::default()
        }),
        &clock(),
    );

    let report = runner.run(identifiers, ActionType::CheckIn).await;

    assert_eq!(report.metrics.successes, 0);
    assert_eq!(report.metrics.failures, 2);
    assert_eq!(report.metrics.skipped, 1);
    assert!(report.metrics.circuit_opened);
    assert_eq!(report.breaker.status, CircuitStatus::Open);
    assert_eq!(report.outcomes[2].status, OutcomeStatus::Skipped);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn transient_failures_recover_after_delay() {
    let seen: Arc<Mutex<HashMap<Identifier, u32>>> = Arc::default();
    let calls = Arc::clone(&seen);
    let action = ActionFn::new(move |identifier: Identifier, _: ActionType| {
        let call = {
            let mut seen = calls.lock();
            let count = seen.entry(identifier).or_default();
            *count += 1;
            *count
        };
        async move {
            if call == 1 {
                Err(ActionError::from_message("session expired"))
            } else {
                Ok(())
            }
        }
    });

    let runner = Runner::new(
        action,
        config(RunSettings {
            max_attempts: 2,
            retry_delay_secs: 30,
            circuit_breaker_threshold: 3,
            ..RunSettings::default()
        }),
        &clock(),
    );

    let report = runner.run(ids(2), ActionType::CheckOut).await;

    assert_eq!(report.metrics.successes, 2);
    assert_eq!(report.metrics.failures, 0);
    assert_eq!(report.metrics.delays_applied, 2);
    assert_eq!(report.metrics.delay_time, Duration::from_secs(60));
    assert_eq!(report.metrics.attempts, 4);
    assert!(!report.metrics.circuit_opened);
    assert!((report.metrics.success_rate - 1.0).abs() < f64::EPSILON);
    assert!(report.outcomes.iter().all(|record| record.attempts == 2));
}

#[tokio::test]
async fn zero_attempts_means_single_attempt() {
    let identifiers = ids(1);
    let calls = Arc::new(AtomicU32::new(0));
    let runner = Runner::new(
        failing_for(&identifiers, &calls),
        config(RunSettings {
            max_attempts: 0,
            ..RunSettings::default()
        }),
        &clock(),
    );

    let report = runner.run(identifiers, ActionType::CheckIn).await;

    assert_eq!(report.metrics.failures, 1);
    assert_eq!(report.outcomes[0].attempts, 1);
    assert_eq!(report.metrics.delays_applied, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_invocations_after_circuit_opens() {
    let identifiers = ids(5);
    let calls = Arc::new(AtomicU32::new(0));
    let runner = Runner::new(
        failing_for(&identifiers, &calls),
        config(RunSettings {
            max_attempts: 3,
            circuit_breaker_threshold: 1,
            ..RunSettings::default()
        }),
        &clock(),
    );

    let report = runner.run(identifiers, ActionType::CheckIn).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.metrics.failures, 1);
    assert_eq!(report.metrics.skipped, 4);
    assert_eq!(report.metrics.delays_applied, 0);
    assert_eq!(report.breaker.rejected, 4);
}

#[rstest]
#[case::sequential_all_pass(false, 1, 3, 3, 0)]
#[case::sequential_half_fail(false, 1, 2, 3, 3)]
#[case::sequential_all_fail(false, 1, 3, 2, 6)]
#[case::parallel_all_pass(true, 4, 3, 3, 0)]
#[case::parallel_half_fail(true, 3, 2, 5, 3)]
#[case::parallel_all_fail(true, 6, 1, 2, 6)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_identifier_has_one_disposition(
    #[case] parallel: bool,
    #[case] max_workers: u32,
    #[case] max_attempts: u32,
    #[case] threshold: u32,
    #[case] failing: usize,
) {
    let identifiers = ids(6);
    let calls = Arc::new(AtomicU32::new(0));
    let runner = Runner::new(
        failing_for(&identifiers[..failing], &calls),
        config(RunSettings {
            parallel,
            max_workers,
            max_attempts,
            circuit_breaker_threshold: threshold,
            ..RunSettings::default()
        }),
        &clock(),
    );

    let report = runner.run(identifiers.clone(), ActionType::CheckIn).await;
    let metrics = &report.metrics;

    assert_eq!(metrics.successes + metrics.failures + metrics.skipped, 6);
    assert_eq!(metrics.total_identifiers, 6);
    assert_eq!(metrics.attempts, calls.load(Ordering::SeqCst));
    assert_eq!(report.outcomes.len(), 6);

    for (record, identifier) in report.outcomes.iter().zip(&identifiers) {
        assert_eq!(&record.identifier, identifier);
        assert!(record.attempts <= max_attempts);

        if record.status == OutcomeStatus::Skipped {
            assert_eq!(record.attempts, 0);
        } else {
            assert!(record.attempts >= 1);
        }
    }
}

#[tokio::test]
async fn single_worker_matches_sequential() {
    let identifiers = ids(4);
    let failing = [identifiers[1].clone(), identifiers[2].clone()];
    let settings = RunSettings {
        max_attempts: 2,
        circuit_breaker_threshold: 3,
        ..RunSettings::default()
    };

    let sequential_calls = Arc::new(AtomicU32::new(0));
    let sequential = Runner::new(failing_for(&failing, &sequential_calls), config(settings.clone()), &clock())
        .run(identifiers.clone(), ActionType::CheckIn)
        .await;

    let parallel_calls = Arc::new(AtomicU32::new(0));
    let parallel = Runner::new(
        failing_for(&failing, &parallel_calls),
        config(RunSettings {
            parallel: true,
            max_workers: 1,
            ..settings
        }),
        &clock(),
    )
    .run(identifiers, ActionType::CheckIn)
    .await;

    let statuses = |report: &timecard::RunReport| report.outcomes.iter().map(|r| (r.status, r.attempts)).collect::<Vec<_>>();

    assert_eq!(statuses(&sequential), statuses(&parallel));
    assert_eq!(sequential.metrics.successes, parallel.metrics.successes);
    assert_eq!(sequential.metrics.failures, parallel.metrics.failures);
    assert_eq!(sequential.metrics.skipped, parallel.metrics.skipped);
    assert_eq!(sequential.metrics.attempts, parallel.metrics.attempts);
    assert_eq!(sequential.metrics.delays_applied, parallel.metrics.delays_applied);
    assert_eq!(sequential.metrics.circuit_opened, parallel.metrics.circuit_opened);
    assert_eq!(sequential_calls.load(Ordering::SeqCst), parallel_calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn report_serializes_masked() {
    let identifiers = ids(2);
    let calls = Arc::new(AtomicU32::new(0));
    let runner = Runner::new(
        failing_for(&identifiers[1..], &calls),
        config(RunSettings {
            max_attempts: 1,
            ..RunSettings::default()
        }),
        &clock(),
    );

    let report = runner.run(identifiers, ActionType::CheckOut).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["action_type"], "check_out");
    assert_eq!(json["metrics"]["successes"], 1);
    assert_eq!(json["metrics"]["failures"], 1);
    assert_eq!(json["breaker"]["status"], "closed");
    assert_eq!(json["outcomes"][0]["identifier"], "1111*****");
    assert_eq!(json["outcomes"][1]["status"], "failure");
    assert!(json["outcomes"][1]["error"].as_str().unwrap().starts_with("attendance portal unavailable"));
    assert!(!json.to_string().contains("222222222"));
}
