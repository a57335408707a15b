// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::Identifier;

/// First local hour (inclusive) at which attendance is recorded as a check-in.
const CHECK_IN_FROM_HOUR: i8 = 5;

/// Local hour (exclusive) at which check-ins stop and check-outs begin.
const CHECK_IN_UNTIL_HOUR: i8 = 12;

/// The kind of attendance mark performed for every identifier of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Start of the working day.
    CheckIn,
    /// End of the working day.
    CheckOut,
}

impl ActionType {
    /// Picks the action for a local hour of the day: check-in from 05:00 until 11:59, check-out
    /// otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use timecard::ActionType;
    ///
    /// assert_eq!(ActionType::for_hour(8), ActionType::CheckIn);
    /// assert_eq!(ActionType::for_hour(18), ActionType::CheckOut);
    /// ```
    #[must_use]
    pub fn for_hour(hour: i8) -> Self {
        if (CHECK_IN_FROM_HOUR..CHECK_IN_UNTIL_HOUR).contains(&hour) {
            Self::CheckIn
        } else {
            Self::CheckOut
        }
    }

    /// Returns the stable `snake_case` name used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::CheckOut => "check_out",
        }
    }
}

impl Display for ActionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed attendance action.
///
/// The engine treats every `ActionError` alike: it is retried while attempts remain and the
/// circuit is closed, and its message becomes the error detail of the outcome.
///
/// # Examples
///
/// ```
/// use timecard::ActionError;
///
/// let error = ActionError::from_message("portal returned 503");
/// assert!(error.to_string().contains("portal returned 503"));
/// ```
#[ohno::error]
pub struct ActionError {}

impl ActionError {
    /// Creates an action error from any message or error value.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

/// Performs one attendance action for one identifier.
///
/// Implementations drive the external attendance portal. The engine measures the latency of
/// each call and decides on retries; implementations should not retry on their own.
pub trait AttendanceAction: Send + Sync + 'static {
    /// Performs `action_type` for `identifier`.
    fn perform(&self, identifier: &Identifier, action_type: ActionType) -> impl Future<Output = Result<(), ActionError>> + Send;
}

/// Adapts an async closure into an [`AttendanceAction`].
///
/// # Examples
///
/// ```
/// use timecard::{ActionError, ActionFn, ActionType, Identifier};
///
/// let action = ActionFn::new(|id: Identifier, _action: ActionType| async move {
///     if id.as_str().ends_with('k') {
///         Ok(())
///     } else {
///         Err(ActionError::from_message("rejected"))
///     }
/// });
/// # let _ = action;
/// ```
pub struct ActionFn<F>(F);

impl<F> ActionFn<F> {
    /// Wraps `f`, which receives an owned identifier and the action type.
    #[must_use]
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(Identifier, ActionType) -> Fut,
    {
        Self(f)
    }
}

impl<F> Debug for ActionFn<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionFn").finish_non_exhaustive()
    }
}

impl<F, Fut> AttendanceAction for ActionFn<F>
where
    F: Fn(Identifier, ActionType) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ActionError>> + Send,
{
    fn perform(&self, identifier: &Identifier, action_type: ActionType) -> impl Future<Output = Result<(), ActionError>> + Send {
        (self.0)(identifier.clone(), action_type)
    }
}
