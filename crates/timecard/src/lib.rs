// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Resilient batch execution of attendance actions.
//!
//! A run performs one [`ActionType`] (check-in or check-out) for a list of [`Identifier`]s.
//! Each identifier is driven through a [`RetryPolicy`] with bounded attempts and a fixed delay.
//! A run-wide [`CircuitBreaker`] watches consecutive failures and, once it opens, every
//! identifier not yet attempted is skipped instead of hitting a failing backend. The
//! [`MetricsAggregator`] turns the terminal results into a [`RunMetrics`] summary.
//!
//! The [`Runner`] ties these together and executes identifiers either sequentially or on a
//! bounded pool of tokio tasks, producing a [`RunReport`] with one [`OutcomeRecord`] per input
//! identifier in input order. With [`RunSettings::stagger`] set, each identifier first waits a
//! random 1 to 20 minutes so that marks do not arrive in a regular pattern.
//!
//! # Quick Start
//!
//! ```rust
//! use timecard::{ActionError, ActionFn, ActionType, Identifier, RunSettings, Runner};
//! use tick::Clock;
//!
//! # async fn run(clock: Clock) -> Result<(), timecard::ConfigError> {
//! let config = RunSettings {
//!     parallel: true,
//!     max_workers: 2,
//!     max_attempts: 3,
//!     ..RunSettings::default()
//! }
//! .validate()?;
//!
//! let action = ActionFn::new(|identifier: Identifier, action_type: ActionType| async move {
//!     // talk to the attendance portal here
//!     println!("{action_type} for {identifier}");
//!     Ok::<(), ActionError>(())
//! });
//!
//! let report = Runner::new(action, config, &clock)
//!     .name("morning_batch")
//!     .enable_logs()
//!     .run(vec!["123456789".into(), "98765432k".into()], ActionType::CheckIn)
//!     .await;
//!
//! println!("{}", report.metrics);
//! # Ok(())
//! # }
//! ```
//!
//! Identifiers are personal data. Their `Display`, `Debug` and serialized forms are always
//! masked, so logs, reports and notifications never carry the full value.
//!
//! # Features
//!
//! - `metrics`: Emits the `attendance.event` OpenTelemetry counter through
//!   [`Runner::enable_metrics`].

mod action;
mod attempt;
mod breaker;
mod calendar;
mod config;
mod identifier;
mod metrics;
mod notify;
mod outcome;
mod retry;
mod rnd;
mod runner;
mod stagger;
mod telemetry;
mod validator;

pub use action::{ActionError, ActionFn, ActionType, AttendanceAction};
pub use attempt::Attempt;
pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitStatus, ExecutionResult, ExitCircuitResult};
pub use calendar::{HolidayCalendar, StaticCalendar};
pub use config::{ConfigError, ExecutionMode, RunConfig, RunSettings};
pub use identifier::Identifier;
pub use metrics::{MetricsAggregator, RunMetrics};
pub use notify::{LogNotifier, Message, Notifier, NotifyError};
pub use outcome::{ActionOutcome, Disposition, OutcomeRecord, OutcomeStatus};
pub use retry::RetryPolicy;
pub use runner::{RunReport, Runner};
pub use validator::{IdentifierValidator, InvalidIdentifier, RutValidator};
