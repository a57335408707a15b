// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use timecard::{Identifier, IdentifierValidator, RunConfig, RunSettings, RutValidator};

const MAX_IDENTIFIERS: usize = 10;

/// Destination used when `NOTIFY_TO` is not set.
pub(crate) const DEFAULT_DESTINATION: &str = "operator";

/// Everything the program reads from its environment.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) active: bool,
    pub(crate) debug: bool,
    pub(crate) run: RunConfig,
    pub(crate) identifiers: Vec<Identifier>,
    pub(crate) exceptions: Vec<Identifier>,
    pub(crate) notify_to: Option<String>,
    /// Identifier whose notices also go to `special_notify_to`, stored without its `k` check digit.
    pub(crate) special_identifier: Option<String>,
    pub(crate) special_notify_to: Option<String>,
    pub(crate) command: Option<String>,
    pub(crate) outcome_log: Option<PathBuf>,
}

impl Settings {
    pub(crate) fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which returns the value of a variable if it is set.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let get = |key: &str| lookup(key).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty());

        let debug = flag(get("DEBUG_MODE"), false);
        let defaults = RunSettings::default();
        let run = RunSettings {
            parallel: flag(get("PARALLEL_EXECUTION"), defaults.parallel),
            max_workers: number("MAX_WORKERS", get("MAX_WORKERS"), defaults.max_workers)?,
            max_attempts: number("RETRY_ATTEMPTS", get("RETRY_ATTEMPTS"), defaults.max_attempts)?,
            retry_delay_secs: number("RETRY_DELAY_SECONDS", get("RETRY_DELAY_SECONDS"), defaults.retry_delay_secs)?,
            circuit_breaker_threshold: number(
                "CIRCUIT_BREAKER_THRESHOLD",
                get("CIRCUIT_BREAKER_THRESHOLD"),
                defaults.circuit_breaker_threshold,
            )?,
            enable_metrics: flag(get("ENABLE_METRICS"), defaults.enable_metrics),
            stagger: !debug,
        };
        let run = run.validate().map_err(|error| SettingsError::caused_by(error.setting(), error))?;

        let identifiers = match (get("ACTIVE_RUTS_B64"), get("ACTIVE_RUTS")) {
            (Some(encoded), _) => active_identifiers("ACTIVE_RUTS_B64", &decode("ACTIVE_RUTS_B64", &encoded)?)?,
            (None, Some(json)) => active_identifiers("ACTIVE_RUTS", &json)?,
            (None, None) => {
                return Err(SettingsError::caused_by("ACTIVE_RUTS", "neither ACTIVE_RUTS_B64 nor ACTIVE_RUTS is set"));
            }
        };

        let exceptions = match get("EXCEPTIONS_RUTS") {
            Some(json) => list("EXCEPTIONS_RUTS", &json)?.iter().map(|raw| Identifier::new(normalize(raw))).collect(),
            None => Vec::new(),
        };

        let special_identifier = match get("SPECIAL_RUT_B64") {
            Some(encoded) => Some(comparable(&decode("SPECIAL_RUT_B64", &encoded)?)),
            None => None,
        };

        Ok(Self {
            active: flag(get("CLOCK_IN_ACTIVE"), false),
            debug,
            run,
            identifiers,
            exceptions,
            notify_to: get("NOTIFY_TO"),
            special_identifier,
            special_notify_to: get("SPECIAL_NOTIFY_TO"),
            command: get("ATTENDANCE_COMMAND"),
            outcome_log: get("OUTCOME_LOG").map(PathBuf::from),
        })
    }

    /// Splits the identifiers into those to process and those on the exception list.
    pub(crate) fn partition(&self) -> (Vec<Identifier>, Vec<Identifier>) {
        self.identifiers
            .iter()
            .cloned()
            .partition(|identifier| !self.exceptions.contains(identifier))
    }

    pub(crate) fn primary_destination(&self) -> &str {
        self.notify_to.as_deref().unwrap_or(DEFAULT_DESTINATION)
    }

    /// Where notices about `identifier` go: always the primary destination, plus the special
    /// destination when `identifier` is the special identifier.
    pub(crate) fn destinations(&self, identifier: &Identifier) -> Vec<&str> {
        let mut destinations = vec![self.primary_destination()];

        let is_special = self
            .special_identifier
            .as_deref()
            .is_some_and(|special| comparable(identifier.as_str()) == special);

        if is_special {
            destinations.extend(self.special_notify_to.as_deref());
        }

        destinations
    }

    /// Holiday notices go to every configured destination.
    pub(crate) fn holiday_destinations(&self) -> Vec<&str> {
        let mut destinations = vec![self.primary_destination()];
        destinations.extend(self.special_notify_to.as_deref());
        destinations
    }
}

fn flag(value: Option<String>, default: bool) -> bool {
    value.map_or(default, |value| value.eq_ignore_ascii_case("true"))
}

fn number<T>(variable: &'static str, value: Option<String>, default: T) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.map_or(Ok(default), |value| value.parse().map_err(|error| SettingsError::caused_by(variable, error)))
}

fn decode(variable: &'static str, encoded: &str) -> Result<String, SettingsError> {
    let bytes = STANDARD.decode(encoded).map_err(|error| SettingsError::caused_by(variable, error))?;
    String::from_utf8(bytes).map_err(|error| SettingsError::caused_by(variable, error))
}

fn list(variable: &'static str, json: &str) -> Result<Vec<String>, SettingsError> {
    serde_json::from_str(json).map_err(|error| SettingsError::caused_by(variable, error))
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Identifiers match with or without a trailing `k`.
fn comparable(raw: &str) -> String {
    normalize(raw).trim_end_matches('k').to_owned()
}

fn active_identifiers(variable: &'static str, json: &str) -> Result<Vec<Identifier>, SettingsError> {
    let raw = list(variable, json)?;

    if raw.len() > MAX_IDENTIFIERS {
        return Err(SettingsError::caused_by(
            variable,
            format!("at most {MAX_IDENTIFIERS} identifiers are supported, got {}", raw.len()),
        ));
    }

    if raw.is_empty() {
        return Err(SettingsError::caused_by(variable, "no identifiers to process"));
    }

    raw.iter()
        .map(|raw| RutValidator.validate(&normalize(raw)).map_err(|error| SettingsError::caused_by(variable, error)))
        .collect()
}

/// An environment variable holds a value that cannot be used.
#[ohno::error]
#[display("invalid value for {variable}")]
pub(crate) struct SettingsError {
    variable: &'static str,
}
