// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::Identifier;

const RUT_LENGTH: std::ops::RangeInclusive<usize> = 8..=9;

/// Checks the format of raw identifier strings before a run.
pub trait IdentifierValidator {
    /// Returns the identifier when `raw` is well formed.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidIdentifier`] error when `raw` is malformed.
    fn validate(&self, raw: &str) -> Result<Identifier, InvalidIdentifier>;
}

/// Validates Chilean RUTs written without dots or dash.
///
/// A valid RUT is 8 or 9 characters long, all digits except the final check character, which is
/// a digit or a lowercase `k`.
///
/// # Examples
///
/// ```
/// use timecard::{IdentifierValidator, RutValidator};
///
/// assert!(RutValidator.validate("12345678k").is_ok());
/// assert!(RutValidator.validate("12.345.678-K").is_err());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RutValidator;

impl IdentifierValidator for RutValidator {
    fn validate(&self, raw: &str) -> Result<Identifier, InvalidIdentifier> {
        if is_valid_rut(raw) {
            Ok(Identifier::new(raw))
        } else {
            Err(InvalidIdentifier::new(Identifier::new(raw).masked()))
        }
    }
}

fn is_valid_rut(raw: &str) -> bool {
    if !RUT_LENGTH.contains(&raw.len()) {
        return false;
    }

    let Some((check, body)) = raw.as_bytes().split_last() else {
        return false;
    };

    body.iter().all(u8::is_ascii_digit) && (check.is_ascii_digit() || *check == b'k')
}

/// An identifier failed format validation.
///
/// The offending value is kept masked.
#[ohno::error]
#[display("identifier {masked} is not well formed")]
pub struct InvalidIdentifier {
    masked: String,
}
