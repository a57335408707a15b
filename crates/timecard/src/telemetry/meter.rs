// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Counter, Meter, MeterProvider};

const SCOPE: &str = env!("CARGO_PKG_NAME");
const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

/// Counter name; every run event increments it once, distinguished by attributes.
pub(crate) const ATTENDANCE_EVENT: &str = "attendance.event";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    let scope = InstrumentationScope::builder(SCOPE)
        .with_version(SCOPE_VERSION)
        .with_schema_url(SCHEMA_URL)
        .build();

    meter_provider.meter_with_scope(scope)
}

pub(crate) fn create_attendance_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter(ATTENDANCE_EVENT)
        .with_description("Attendance run events: successes, failures, retries, skips and circuit openings.")
        .with_unit("{event}")
        .build()
}
