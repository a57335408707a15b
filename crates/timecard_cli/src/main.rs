// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Records attendance for the configured identifiers.
//!
//! The program is meant to run from a scheduler a few times a day. Configuration comes from
//! environment variables:
//!
//! - `CLOCK_IN_ACTIVE`: marking happens only when this is `true`.
//! - `ACTIVE_RUTS_B64` or `ACTIVE_RUTS`: JSON array of identifiers, optionally base64 encoded.
//!   One of them is required.
//! - `EXCEPTIONS_RUTS`: JSON array of identifiers to leave out of the run.
//! - `PARALLEL_EXECUTION`, `MAX_WORKERS`, `RETRY_ATTEMPTS`, `RETRY_DELAY_SECONDS`,
//!   `CIRCUIT_BREAKER_THRESHOLD`, `ENABLE_METRICS`: execution settings.
//! - `ATTENDANCE_COMMAND`: command invoked as `<command> <check_in|check_out> <identifier>`.
//! - `DEBUG_MODE`: simulate the attendance action without the random stagger wait; logs
//!   default to debug level.
//! - `NOTIFY_TO`: destination of notifications.
//! - `SPECIAL_RUT_B64` and `SPECIAL_NOTIFY_TO`: notices about this base64 encoded identifier,
//!   and holiday notices, also go to the second destination.
//! - `OUTCOME_LOG`: file that receives one JSON line per identifier and run.
//!
//! Logs are filtered through `RUST_LOG`.

use clap::{Parser, ValueEnum};
use ohno::AppError;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_stdout::MetricExporter;
use tick::Clock;
use timecard::{ActionType, LogNotifier, Message, Notifier, Runner, StaticCalendar};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod outcome_log;
mod portal;
mod schedule;
mod settings;

use crate::outcome_log::append;
use crate::portal::PortalAction;
use crate::schedule::Plan;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "timecard", version, about = "Records attendance for the configured identifiers")]
struct Cli {
    /// Perform this action instead of deriving it from the local hour
    #[arg(long, value_enum)]
    action: Option<ActionArg>,

    /// Simulate the attendance action instead of running `ATTENDANCE_COMMAND`
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ActionArg {
    CheckIn,
    CheckOut,
}

impl From<ActionArg> for ActionType {
    fn from(value: ActionArg) -> Self {
        match value {
            ActionArg::CheckIn => Self::CheckIn,
            ActionArg::CheckOut => Self::CheckOut,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let meter_provider = configure_telemetry(settings.debug);

    let result = run(&cli, &settings, &meter_provider, &Clock::new_tokio(), &LogNotifier).await;

    meter_provider.force_flush()?;
    result
}

/// Runs every step through to the summary; the first failed step is returned at the end.
async fn run(
    cli: &Cli,
    settings: &Settings,
    meter_provider: &SdkMeterProvider,
    clock: &Clock,
    notifier: &impl Notifier,
) -> Result<(), AppError> {
    if !settings.active {
        tracing::event!(name: "timecard.inactive", Level::INFO, "attendance marking is disabled");
        return Ok(());
    }

    let mut problems = Problems::default();

    let now = schedule::local_now(clock)?;
    let action_type = match schedule::plan(&now, &StaticCalendar::chile_2025(), cli.action.map(ActionType::from)) {
        Plan::Holiday { day, name } => {
            tracing::event!(name: "timecard.holiday", Level::INFO, holiday.date = %day, holiday.name = %name);

            let message = Message::holiday(day, &name, &settings.identifiers);
            for destination in settings.holiday_destinations() {
                problems.note(notifier.notify(destination, &message).await);
            }

            return problems.into_result();
        }
        Plan::Run(action_type) => action_type,
    };

    let (identifiers, excluded) = settings.partition();
    for identifier in &excluded {
        let message = Message::excluded(identifier);
        for destination in settings.destinations(identifier) {
            problems.note(notifier.notify(destination, &message).await);
        }
    }

    let config = if cli.dry_run {
        settings.run.clone().without_stagger()
    } else {
        settings.run.clone()
    };

    let runner = Runner::new(select_action(cli, settings), config, clock)
        .name(action_type.as_str())
        .enable_logs()
        .enable_metrics(meter_provider);

    let report = runner.run(identifiers, action_type).await;

    let document = serde_json::to_string(&report)?;
    tracing::event!(name: "timecard.report", Level::INFO, report = %document);

    if let Some(path) = &settings.outcome_log {
        problems.note(append(path, &report.outcomes).await);
    }

    for record in &report.outcomes {
        if let Some(message) = Message::identifier_outcome(record) {
            for destination in settings.destinations(&record.identifier) {
                problems.note(notifier.notify(destination, &message).await);
            }
        }
    }

    problems.note(notifier.notify(settings.primary_destination(), &Message::run_summary(&report)).await);
    problems.into_result()
}

/// Keeps the first error of steps that must not stop the ones after them.
#[derive(Debug, Default)]
struct Problems(Option<AppError>);

impl Problems {
    fn note<E>(&mut self, result: Result<(), E>)
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let Err(error) = result {
            tracing::event!(name: "timecard.step.failed", Level::ERROR, error = %error);

            if self.0.is_none() {
                self.0 = Some(AppError::from(error));
            }
        }
    }

    fn into_result(self) -> Result<(), AppError> {
        self.0.map_or(Ok(()), Err)
    }
}

fn select_action(cli: &Cli, settings: &Settings) -> PortalAction {
    if cli.dry_run || settings.debug {
        return PortalAction::Simulated;
    }

    match settings.command.as_deref().and_then(PortalAction::command) {
        Some(action) => action,
        None => {
            tracing::event!(
                name: "timecard.action.unconfigured",
                Level::WARN,
                "ATTENDANCE_COMMAND is not set, simulating the attendance action"
            );
            PortalAction::Simulated
        }
    }
}

fn configure_telemetry(debug: bool) -> SdkMeterProvider {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    SdkMeterProvider::builder().with_periodic_exporter(MetricExporter::default()).build()
}
