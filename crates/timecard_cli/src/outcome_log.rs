// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::Path;

use timecard::OutcomeRecord;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Appends `records` to the file at `path`, one JSON document per line.
pub(crate) async fn append(path: &Path, records: &[OutcomeRecord]) -> Result<(), OutcomeLogError> {
    let failed = |cause: Box<dyn std::error::Error + Send + Sync>| OutcomeLogError::caused_by(path.display().to_string(), cause);

    let mut lines = String::new();
    for record in records {
        lines.push_str(&serde_json::to_string(record).map_err(|error| failed(error.into()))?);
        lines.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|error| failed(error.into()))?;

    file.write_all(lines.as_bytes()).await.map_err(|error| failed(error.into()))?;
    file.flush().await.map_err(|error| failed(error.into()))
}

/// Outcome records could not be written.
#[ohno::error]
#[display("failed to append outcomes to {path}")]
pub(crate) struct OutcomeLogError {
    path: String,
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use tick::ClockControl;
    use timecard::{ActionError, ActionFn, ActionType, Identifier, RunSettings, Runner};

    use super::*;

    async fn records() -> Vec<OutcomeRecord> {
        let action = ActionFn::new(|identifier: Identifier, _: ActionType| async move {
            if identifier.as_str() == "222222222" {
                Err(ActionError::from_message("rejected"))
            } else {
                Ok(())
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
            .outcomes
    }

    #[tokio::test]
    async fn appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outcomes.jsonl");
        let records = records().await;

        append(&path, &records).await.unwrap();
        append(&path, &records[..1]).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["identifier"], "1111*****");
        assert_eq!(lines[0]["status"], "success");
        assert_eq!(lines[1]["status"], "failure");
        assert_eq!(lines[2]["identifier"], "1111*****");
        assert!(!content.contains("222222222"));
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("outcomes.jsonl");

        let error = append(&path, &[]).await.unwrap_err();

        assert!(error.to_string().starts_with("failed to append outcomes to"));
    }
}
