// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Key used to annotate the name of a run.
///
/// Values reported under this dimension should be short and concise, preferably in `snake_case`.
/// Examples: `morning_batch`, `evening_batch`.
#[cfg(any(feature = "metrics", test))]
pub(crate) const RUN_NAME: &str = "attendance.run.name";

/// Key used to annotate the specific attendance event being emitted.
///
/// Examples: `success`, `retry`, `circuit_opened`.
#[cfg(any(feature = "metrics", test))]
pub(crate) const EVENT_NAME: &str = "attendance.event.name";

/// Key used to annotate the action type of the run.
#[cfg(any(feature = "metrics", test))]
pub(crate) const ACTION_TYPE: &str = "attendance.action.type";
