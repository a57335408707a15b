// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use timecard::{ActionError, ActionType, AttendanceAction, Identifier};
use tokio::process::Command;
use tracing::Level;

/// Performs attendance through an external command or simulates it.
#[derive(Debug, Clone)]
pub(crate) enum PortalAction {
    /// Runs `<program> <args..> <action> <identifier>`; exit status 0 means success.
    Command { program: String, args: Vec<String> },
    /// Logs the action and succeeds without side effects.
    Simulated,
}

impl PortalAction {
    /// Builds a command action from a whitespace-separated command line.
    pub(crate) fn command(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_owned);
        let program = parts.next()?;

        Some(Self::Command {
            program,
            args: parts.collect(),
        })
    }

    async fn run_command(program: &str, args: &[String], identifier: &Identifier, action_type: ActionType) -> Result<(), ActionError> {
        let output = Command::new(program)
            .args(args)
            .arg(action_type.as_str())
            .arg(identifier.as_str())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ActionError::from_message)?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();

        if detail.is_empty() {
            Err(ActionError::from_message(format!("attendance command failed with {}", output.status)))
        } else {
            // commands may echo their arguments
            Err(ActionError::from_message(detail.replace(identifier.as_str(), &identifier.masked())))
        }
    }
}

impl AttendanceAction for PortalAction {
    async fn perform(&self, identifier: &Identifier, action_type: ActionType) -> Result<(), ActionError> {
        match self {
            Self::Command { program, args } => Self::run_command(program, args, identifier, action_type).await,
            Self::Simulated => {
                tracing::event!(
                    name: "timecard.action.simulated",
                    Level::INFO,
                    attendance.identifier = %identifier,
                    attendance.action.type = %action_type,
                );

                Ok(())
            }
        }
    }
}
