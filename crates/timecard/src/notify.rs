// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use jiff::civil::Date;
use serde::Serialize;

use crate::{Identifier, OutcomeRecord, OutcomeStatus, RunReport};

/// A notification for a human operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// One-line summary.
    pub subject: String,
    /// Full text.
    pub body: String,
}

impl Message {
    /// Creates a message from its parts.
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Summarizes a finished run, listing every identifier masked.
    #[must_use]
    pub fn run_summary(report: &RunReport) -> Self {
        let metrics = &report.metrics;

        let subject = if metrics.failures == 0 && metrics.skipped == 0 {
            format!("{} completed for {} identifiers", report.action_type, metrics.total_identifiers)
        } else {
            format!(
                "{} finished with problems: {} failed, {} skipped of {}",
                report.action_type, metrics.failures, metrics.skipped, metrics.total_identifiers
            )
        };

        let lines: Vec<_> = report
            .outcomes
            .iter()
            .map(|record| {
                let line = format!("{} {} after {} attempts", record.identifier, record.status, record.attempts);
                match &record.error {
                    Some(error) => format!("{line}: {error}"),
                    None => line,
                }
            })
            .collect();

        Self::new(subject, format!("{metrics}\n\n{}", lines.join("\n")))
    }

    /// Reports the result of one identifier, or `None` for an identifier that was skipped.
    #[must_use]
    pub fn identifier_outcome(record: &OutcomeRecord) -> Option<Self> {
        let OutcomeRecord {
            timestamp,
            identifier,
            action_type,
            attempts,
            ..
        } = record;

        match record.status {
            OutcomeStatus::Success => Some(Self::new(
                format!("{action_type} recorded for {identifier}"),
                format!("{action_type} for {identifier} was recorded at {timestamp} after {attempts} attempts."),
            )),
            OutcomeStatus::Failure => Some(Self::new(
                format!("Problem recording {action_type} for {identifier}"),
                format!(
                    "{action_type} for {identifier} could not be recorded after {attempts} attempts: {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ),
            )),
            OutcomeStatus::Skipped => None,
        }
    }

    /// Announces that no run happens because `day` is a holiday.
    #[must_use]
    pub fn holiday(day: Date, name: &str, identifiers: &[Identifier]) -> Self {
        let masked: Vec<_> = identifiers.iter().map(Identifier::masked).collect();

        Self::new(
            format!("Scheduled notice: {name}"),
            format!(
                "{day} is a holiday ({name}); no attendance will be recorded.\nConfigured identifiers: {} ({})",
                identifiers.len(),
                masked.join(", ")
            ),
        )
    }

    /// Announces that `identifier` is excluded from processing.
    #[must_use]
    pub fn excluded(identifier: &Identifier) -> Self {
        Self::new(
            format!("Excluded identifier {identifier}"),
            format!("{identifier} is on the exclusion list and was not processed. Remove it from the list to resume processing."),
        )
    }
}

/// Delivers messages to a destination such as an e-mail address.
pub trait Notifier: Send + Sync {
    /// Delivers `message` to `destination`.
    fn notify(&self, destination: &str, message: &Message) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, destination: &str, message: &Message) -> Result<(), NotifyError> {
        tracing::event!(
            name: "timecard.notification",
            tracing::Level::INFO,
            notification.destination = destination,
            notification.subject = %message.subject,
            notification.body = %message.body,
        );

        Ok(())
    }
}

/// A message could not be delivered.
#[ohno::error]
#[display("failed to deliver notification to {destination}")]
pub struct NotifyError {
    destination: String,
}

impl NotifyError {
    /// Creates a delivery error for `destination` caused by `cause`.
    pub fn delivery_failed(destination: impl Into<String>, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(destination, cause)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use tick::ClockControl;
    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;
    use crate::telemetry::testing::LogCapture;
    use crate::{ActionError, ActionFn, ActionType, RunSettings, Runner};

    async fn report(failing: &'static str) -> RunReport {
        let action = ActionFn::new(move |id: Identifier, _: ActionType| {
            async move {
                if id.as_str() == failing {
                    Err(ActionError::from_message("portal timeout"))
                } else {
                    Ok(())
                }
            }
        });
        let config = RunSettings {
            max_attempts: 1,
            ..RunSettings::default()
        }
        .validate()
        .unwrap();

        Runner::new(action, config, &ClockControl::new().auto_advance_timers(true).to_clock())
            .run(vec!["111111111".into(), "222222222".into()], ActionType::CheckIn)
            .await
    }

    #[tokio::test]
    async fn summary_of_clean_run() {
        let message = Message::run_summary(&report("none").await);

        assert_eq!(message.subject, "check_in completed for 2 identifiers");
        assert!(message.body.contains("1111***** success after 1 attempts"));
        assert!(!message.body.contains("111111111"));
    }

    #[tokio::test]
    async fn summary_lists_failures() {
        let message = Message::run_summary(&report("222222222").await);

        assert_eq!(message.subject, "check_in finished with problems: 1 failed, 0 skipped of 2");
        assert!(message.body.contains("2222***** failure after 1 attempts"));
        assert!(message.body.contains("portal timeout"));
    }

    #[tokio::test]
    async fn identifier_outcomes_follow_status() {
        let report = report("222222222").await;

        let success = Message::identifier_outcome(&report.outcomes[0]).unwrap();
        assert_eq!(success.subject, "check_in recorded for 1111*****");
        assert!(success.body.contains("after 1 attempts"));

        let failure = Message::identifier_outcome(&report.outcomes[1]).unwrap();
        assert_eq!(failure.subject, "Problem recording check_in for 2222*****");
        assert!(failure.body.contains("could not be recorded after 1 attempts: portal timeout"));
        assert!(!failure.body.contains("222222222"));
    }

    #[test]
    fn skipped_identifier_has_no_outcome_message() {
        let disposition = crate::Disposition::Skipped {
            identifier: "123456789".into(),
            action_type: ActionType::CheckOut,
        };
        let record = OutcomeRecord::new(&disposition, jiff::Timestamp::UNIX_EPOCH);

        assert_eq!(Message::identifier_outcome(&record), None);
    }

    #[test]
    fn holiday_message_masks_identifiers() {
        let message = Message::holiday(date(2025, 9, 18), "Independencia Nacional", &["123456789".into()]);

        assert_eq!(message.subject, "Scheduled notice: Independencia Nacional");
        assert!(message.body.contains("2025-09-18"));
        assert!(message.body.contains("1234*****"));
        assert!(!message.body.contains("123456789"));
    }

    #[test]
    fn excluded_message_masks_identifier() {
        let message = Message::excluded(&"123456789".into());

        assert_eq!(message.subject, "Excluded identifier 1234*****");
    }

    #[tokio::test]
    async fn log_notifier_logs_message() {
        let log_capture = LogCapture::new();
        let _guard = log_capture.subscriber().set_default();

        LogNotifier
            .notify("ops@example.com", &Message::new("subject line", "body text"))
            .await
            .unwrap();

        log_capture.assert_contains("ops@example.com");
        log_capture.assert_contains("subject line");
    }

    #[test]
    fn notify_error_names_destination() {
        let error = NotifyError::delivery_failed("ops@example.com", "connection refused");

        assert!(error.to_string().contains("failed to deliver notification to ops@example.com"));
    }
}
