// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::ops::RangeInclusive;

/// Source of the random stagger offsets.
///
/// Not cryptographically secure; offsets only need to look irregular.
#[derive(Clone, Default)]
pub(crate) enum Rnd {
    #[default]
    Real,

    #[cfg(test)]
    Scripted(std::sync::Arc<parking_lot::Mutex<std::collections::VecDeque<u32>>>),
}

impl Debug for Rnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => f.write_str("Real"),
            #[cfg(test)]
            Self::Scripted(_) => f.write_str("Scripted"),
        }
    }
}

impl Rnd {
    /// Yields `values` in order, then repeats the last one.
    #[cfg(test)]
    pub fn scripted(values: impl IntoIterator<Item = u32>) -> Self {
        Self::Scripted(std::sync::Arc::new(parking_lot::Mutex::new(values.into_iter().collect())))
    }

    pub fn next_in(&self, range: RangeInclusive<u32>) -> u32 {
        match self {
            Self::Real => fastrand::u32(range),
            #[cfg(test)]
            Self::Scripted(values) => {
                let mut values = values.lock();
                let value = if values.len() > 1 { values.pop_front() } else { values.front().copied() };
                value.unwrap_or(*range.start()).clamp(*range.start(), *range.end())
            }
        }
    }
}
