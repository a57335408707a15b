// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use jiff::civil::Date;
use jiff::{Timestamp, Zoned};
use tick::Clock;
use timecard::{ActionType, HolidayCalendar};

/// Time zone of the attendance portal; holidays and the action type follow its local time.
pub(crate) const TIME_ZONE: &str = "America/Santiago";

/// What the program does today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Plan {
    /// Nothing is marked on a public holiday.
    Holiday { day: Date, name: String },
    /// Perform this action for every identifier.
    Run(ActionType),
}

pub(crate) fn local_now(clock: &Clock) -> Result<Zoned, jiff::Error> {
    clock.system_time_as::<Timestamp>().in_tz(TIME_ZONE)
}

/// Decides today's plan. An explicit `action` overrides the hour of the day but never a holiday.
pub(crate) fn plan(now: &Zoned, calendar: &impl HolidayCalendar, action: Option<ActionType>) -> Plan {
    let day = now.date();

    if let Some(name) = calendar.holiday(day) {
        return Plan::Holiday {
            day,
            name: name.to_owned(),
        };
    }

    Plan::Run(action.unwrap_or_else(|| ActionType::for_hour(now.hour())))
}
