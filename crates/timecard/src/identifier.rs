// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Number of leading characters that stay visible when an identifier is masked.
const VISIBLE_PREFIX: usize = 4;

const MASK_CHAR: char = '*';

/// An employee identifier processed by a run.
///
/// The raw value is only reachable through [`Identifier::as_str`], which is what an
/// [`AttendanceAction`][crate::AttendanceAction] uses to talk to the attendance portal. Every
/// other representation (`Display`, `Debug`, serialization) shows the masked form, so
/// identifiers can be logged and reported without leaking them.
///
/// # Examples
///
/// ```
/// use timecard::Identifier;
///
/// let id = Identifier::new("12345678k");
/// assert_eq!(id.as_str(), "12345678k");
/// assert_eq!(id.to_string(), "1234*****");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// Creates an identifier from its raw value.
    #[must_use]
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    /// Returns the raw, unmasked value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the masked form: the first four characters followed by one `*` per remaining
    /// character. Identifiers of four characters or fewer are masked entirely.
    #[must_use]
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}

fn mask(value: &str) -> String {
    let len = value.chars().count();

    if len <= VISIBLE_PREFIX {
        return MASK_CHAR.to_string().repeat(len);
    }

    value
        .chars()
        .take(VISIBLE_PREFIX)
        .chain(std::iter::repeat_n(MASK_CHAR, len - VISIBLE_PREFIX))
        .collect()
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.masked())
    }
}

impl Debug for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Identifier").field(&self.masked()).finish()
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.masked())
    }
}
