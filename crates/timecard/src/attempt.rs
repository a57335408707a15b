// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// A single attempt of an attendance action for one identifier.
///
/// Attempts are numbered from 1. The last attempt is the one after which the retry policy
/// gives up, regardless of the outcome.
///
/// # Examples
///
/// ```
/// use timecard::Attempt;
///
/// let attempt = Attempt::new(1, false);
/// assert!(attempt.is_first());
/// assert!(!attempt.is_last());
/// assert_eq!(attempt.number(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    number: u32,
    is_last: bool,
}

impl Default for Attempt {
    fn default() -> Self {
        Self::new(1, true)
    }
}

impl Attempt {
    /// Creates an attempt with the given 1-based number.
    #[must_use]
    pub fn new(number: u32, is_last: bool) -> Self {
        Self { number, is_last }
    }

    /// Returns the first attempt of a run with `max_attempts` total attempts.
    ///
    /// A budget of zero still permits one attempt.
    #[must_use]
    pub(crate) fn first(max_attempts: u32) -> Self {
        Self::new(1, max_attempts <= 1)
    }

    /// Returns true for attempt number 1.
    #[must_use]
    pub fn is_first(self) -> bool {
        self.number == 1
    }

    /// Returns true if no further attempt is permitted after this one.
    #[must_use]
    pub fn is_last(self) -> bool {
        self.is_last
    }

    /// Returns the 1-based attempt number.
    #[must_use]
    pub fn number(self) -> u32 {
        self.number
    }

    pub(crate) fn increment(self, max_attempts: u32) -> Option<Self> {
        let next = self.number.saturating_add(1);

        if next > max_attempts {
            return None;
        }

        Some(Self::new(next, next == max_attempts))
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.number.fmt(f)
    }
}
