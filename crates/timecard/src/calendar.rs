// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use jiff::civil::{Date, date};

/// Answers whether a date is a public holiday, on which no run should happen.
pub trait HolidayCalendar {
    /// Returns the holiday name when `day` is a holiday.
    fn holiday(&self, day: Date) -> Option<&str>;
}

/// A fixed list of holidays.
///
/// # Examples
///
/// ```
/// use jiff::civil::date;
/// use timecard::{HolidayCalendar, StaticCalendar};
///
/// let calendar = StaticCalendar::chile_2025();
/// assert_eq!(calendar.holiday(date(2025, 9, 18)), Some("Independencia Nacional"));
/// assert_eq!(calendar.holiday(date(2025, 9, 17)), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCalendar {
    holidays: BTreeMap<Date, String>,
}

impl StaticCalendar {
    /// Creates a calendar from `(date, name)` pairs.
    #[must_use]
    pub fn new<I, S>(holidays: I) -> Self
    where
        I: IntoIterator<Item = (Date, S)>,
        S: Into<String>,
    {
        Self {
            holidays: holidays.into_iter().map(|(day, name)| (day, name.into())).collect(),
        }
    }

    /// The Chilean public holidays of 2025.
    #[must_use]
    pub fn chile_2025() -> Self {
        Self::new([
            (date(2025, 1, 1), "Año Nuevo"),
            (date(2025, 4, 18), "Viernes Santo"),
            (date(2025, 4, 19), "Sábado Santo"),
            (date(2025, 5, 1), "Día Nacional del Trabajo"),
            (date(2025, 5, 21), "Día de las Glorias Navales"),
            (date(2025, 6, 29), "San Pedro y San Pablo"),
            (date(2025, 7, 16), "Día de la Virgen del Carmen"),
            (date(2025, 8, 15), "Asunción de la Virgen"),
            (date(2025, 9, 18), "Independencia Nacional"),
            (date(2025, 9, 19), "Día de las Glorias del Ejército"),
            (date(2025, 12, 8), "Inmaculada Concepción"),
            (date(2025, 12, 25), "Navidad"),
        ])
    }

    /// Returns the number of holidays in the calendar.
    #[must_use]
    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    /// Returns true if the calendar has no holidays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }
}

impl HolidayCalendar for StaticCalendar {
    fn holiday(&self, day: Date) -> Option<&str> {
        self.holidays.get(&day).map(String::as_str)
    }
}
