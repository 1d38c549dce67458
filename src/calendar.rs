use chrono::{Datelike, Duration, NaiveDate};

use crate::models::Bucket;

/// Buckets a date by ISO week, calendar month and calendar year.
///
/// The year is always the calendar year of `date`, even when its ISO week
/// belongs to the neighbouring year.
pub fn bucket(date: NaiveDate) -> Bucket {
    Bucket {
        week: iso_week(date),
        month: date.month(),
        year: date.year(),
    }
}

/// ISO-8601 week number: the week containing the date's Thursday.
pub fn iso_week(date: NaiveDate) -> u32 {
    let offset = i64::from(date.weekday().num_days_from_monday());
    let thursday = date + Duration::days(3 - offset);
    (thursday.ordinal0() + 1).div_ceil(7)
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "Unknown",
    }
}
