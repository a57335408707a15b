// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use jiff::Timestamp;
use serde::{Serialize, Serializer};

use crate::{ActionType, Identifier};

/// The result of driving one identifier through the retry policy.
///
/// `error_detail` is `Some` exactly when `success` is `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ActionOutcome {
    /// The identifier the action was performed for.
    pub identifier: Identifier,
    /// The action that was performed.
    pub action_type: ActionType,
    /// Whether the terminal attempt succeeded.
    pub success: bool,
    /// Latency of the terminal attempt.
    pub duration: Duration,
    /// Total time spent on the identifier, including every attempt and retry delay.
    pub elapsed: Duration,
    /// Failure description of the terminal attempt.
    pub error_detail: Option<String>,
    /// The 1-based number of the terminal attempt.
    pub attempt_number: u32,
}

impl ActionOutcome {
    pub(crate) fn succeeded(identifier: Identifier, action_type: ActionType, attempt_number: u32, duration: Duration) -> Self {
        Self {
            identifier,
            action_type,
            success: true,
            duration,
            elapsed: duration,
            error_detail: None,
            attempt_number,
        }
    }

    pub(crate) fn failed(
        identifier: Identifier,
        action_type: ActionType,
        attempt_number: u32,
        duration: Duration,
        error_detail: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            action_type,
            success: false,
            duration,
            elapsed: duration,
            error_detail: Some(error_detail.into()),
            attempt_number,
        }
    }

    #[must_use]
    pub(crate) fn with_elapsed(self, elapsed: Duration) -> Self {
        Self { elapsed, ..self }
    }
}

/// The terminal result of one identifier within one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// At least one attempt was made.
    Completed(ActionOutcome),
    /// No attempt was made because the circuit was open.
    Skipped {
        /// The identifier that was skipped.
        identifier: Identifier,
        /// The action that would have been performed.
        action_type: ActionType,
    },
}

impl Disposition {
    /// Returns the identifier this disposition belongs to.
    #[must_use]
    pub fn identifier(&self) -> &Identifier {
        match self {
            Self::Completed(outcome) => &outcome.identifier,
            Self::Skipped { identifier, .. } => identifier,
        }
    }

    /// Returns the action type this disposition belongs to.
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Completed(outcome) => outcome.action_type,
            Self::Skipped { action_type, .. } => *action_type,
        }
    }

    /// Returns the outcome when at least one attempt was made.
    #[must_use]
    pub fn outcome(&self) -> Option<&ActionOutcome> {
        match self {
            Self::Completed(outcome) => Some(outcome),
            Self::Skipped { .. } => None,
        }
    }

    /// Returns the status reported for this disposition.
    #[must_use]
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::Completed(outcome) if outcome.success => OutcomeStatus::Success,
            Self::Completed(_) => OutcomeStatus::Failure,
            Self::Skipped { .. } => OutcomeStatus::Skipped,
        }
    }
}

/// Reported status of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The action succeeded.
    Success,
    /// Every permitted attempt failed.
    Failure,
    /// The circuit was open before the first attempt.
    Skipped,
}

impl OutcomeStatus {
    /// Returns the name used in logs and records.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
        }
    }
}

impl Display for OutcomeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the outcome log.
///
/// Records serialize to a flat JSON object with the identifier masked and the duration in
/// fractional seconds, suitable for appending to a JSON-lines file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct OutcomeRecord {
    /// When the record was produced.
    pub timestamp: Timestamp,
    /// The identifier, serialized masked.
    pub identifier: Identifier,
    /// The action performed.
    pub action_type: ActionType,
    /// The reported status.
    pub status: OutcomeStatus,
    /// Total time spent on the identifier.
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    /// Number of attempts made; zero for skipped identifiers.
    pub attempts: u32,
    /// Failure description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutcomeRecord {
    /// Builds the record for `disposition`, stamped with `timestamp`.
    #[must_use]
    pub fn new(disposition: &Disposition, timestamp: Timestamp) -> Self {
        let (duration, attempts, error) = match disposition {
            Disposition::Completed(outcome) => (outcome.elapsed, outcome.attempt_number, outcome.error_detail.clone()),
            Disposition::Skipped { .. } => (Duration::ZERO, 0, Some("circuit open".to_owned())),
        };

        Self {
            timestamp,
            identifier: disposition.identifier().clone(),
            action_type: disposition.action_type(),
            status: disposition.status(),
            duration,
            attempts,
            error,
        }
    }
}

pub(crate) fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    fn identifier() -> Identifier {
        Identifier::new("123456789")
    }

    #[test]
    fn status_distinguishes_failure_from_skip() {
        let success = Disposition::Completed(ActionOutcome::succeeded(identifier(), ActionType::CheckIn, 1, Duration::ZERO));
        let failure = Disposition::Completed(ActionOutcome::failed(
            identifier(),
            ActionType::CheckIn,
            2,
            Duration::ZERO,
            "boom",
        ));
        let skipped = Disposition::Skipped {
            identifier: identifier(),
            action_type: ActionType::CheckIn,
        };

        assert_eq!(success.status(), OutcomeStatus::Success);
        assert_eq!(failure.status(), OutcomeStatus::Failure);
        assert_eq!(skipped.status(), OutcomeStatus::Skipped);
        assert!(skipped.outcome().is_none());
    }

    #[test]
    fn failed_outcome_carries_detail() {
        let outcome = ActionOutcome::failed(identifier(), ActionType::CheckOut, 3, Duration::from_millis(5), "timeout")
            .with_elapsed(Duration::from_secs(61));

        assert!(!outcome.success);
        assert_eq!(outcome.error_detail.as_deref(), Some("timeout"));
        assert_eq!(outcome.duration, Duration::from_millis(5));
        assert_eq!(outcome.elapsed, Duration::from_secs(61));
    }

    #[test]
    fn record_serializes_masked_and_in_seconds() {
        let outcome = ActionOutcome::succeeded(identifier(), ActionType::CheckIn, 2, Duration::from_millis(250))
            .with_elapsed(Duration::from_millis(1500));
        let record = OutcomeRecord::new(&Disposition::Completed(outcome), Timestamp::UNIX_EPOCH);

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();

        assert_eq!(json["identifier"], "1234*****");
        assert_eq!(json["action_type"], "check_in");
        assert_eq!(json["status"], "success");
        assert_eq!(json["duration"], 1.5);
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn skipped_record_has_no_attempts() {
        let disposition = Disposition::Skipped {
            identifier: identifier(),
            action_type: ActionType::CheckOut,
        };
        let record = OutcomeRecord::new(&disposition, Timestamp::UNIX_EPOCH);

        assert_eq!(record.status, OutcomeStatus::Skipped);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.duration, Duration::ZERO);
        assert_eq!(record.error.as_deref(), Some("circuit open"));
    }
}
