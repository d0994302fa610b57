//! Resolution of date/time cells into a single instant
//!
//! Metering exports encode time in several ways: a full spreadsheet serial in
//! one cell, a serial day plus a fractional-day time in two cells, ISO text,
//! day-first text, or any mix of these across the date and time columns.
//! [`resolve_timestamp`] matches on the cell variants explicitly, and every
//! accepted instant has its seconds zeroed.

use crate::grid::CellValue;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Days from the spreadsheet epoch (1899-12-30) to the Unix epoch
pub const UNIX_EPOCH_SERIAL: f64 = 25569.0;

/// Resolved instants must be strictly after this year
pub const MIN_PLAUSIBLE_YEAR: i32 = 1990;

const MS_PER_DAY: f64 = 86_400_000.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

// Beyond this a serial is far outside any calendar chrono can represent usefully
const MAX_SERIAL_MAGNITUDE: f64 = 3_000_000.0;

const NATIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const NATIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Resolve a date cell and an optional separate time cell into one instant.
///
/// Returns `None` when the cells cannot be read as a calendar instant or when
/// the year is not after [`MIN_PLAUSIBLE_YEAR`]; the caller skips such rows.
/// A blank time cell is treated the same as no time cell.
pub fn resolve_timestamp(date: &CellValue, time: Option<&CellValue>) -> Option<NaiveDateTime> {
    if date.is_blank() {
        return None;
    }
    let time = time.filter(|t| !t.is_blank());

    let resolved = match (date, time) {
        (CellValue::Number(serial), None) => from_serial(*serial),
        (CellValue::Text(text), None) => parse_native(text).or_else(|| parse_day_first(text)),
        (CellValue::Number(day), Some(CellValue::Number(fraction))) => {
            from_serial(day.trunc() + fraction.fract())
        }
        (date, Some(time)) => {
            let day = resolve_date_part(date)?;
            let (hour, minute) = resolve_time_part(time)?;
            combine(day, hour, minute)
        }
        (CellValue::Blank, None) => None,
    };

    resolved
        .and_then(zero_seconds)
        .filter(|ts| ts.year() > MIN_PLAUSIBLE_YEAR)
}

/// Convert a spreadsheet day serial (days since 1899-12-30) to an instant.
///
/// The fraction is rounded to whole milliseconds; seconds are not zeroed here.
pub fn from_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial.abs() > MAX_SERIAL_MAGNITUDE {
        return None;
    }
    let millis = ((serial - UNIX_EPOCH_SERIAL) * MS_PER_DAY).round() as i64;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// ISO-8601 style text, with or without an offset
fn parse_native(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = NATIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt);
    }
    NATIVE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `DD/MM/YYYY HH:MM` style text with any of `/ - . :` or spaces between parts
fn parse_day_first(text: &str) -> Option<NaiveDateTime> {
    let tokens = numeric_tokens(text, &['/', '-', '.', ':', ' ', '\t']);
    if tokens.len() < 5 {
        return None;
    }
    let (day, month, year) = (tokens[0], tokens[1], tokens[2]);
    let (hour, minute) = (tokens[3], tokens[4]);

    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?.and_hms_opt(hour, minute, 0)
}

/// Date half of a split date/time pair
fn resolve_date_part(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Number(serial) => from_serial(*serial).map(|dt| dt.date()),
        CellValue::Text(text) => parse_native(text)
            .map(|dt| dt.date())
            .or_else(|| parse_date_tokens(text)),
        CellValue::Blank => None,
    }
}

/// Best-effort DD/MM/YYYY or YYYY/MM/DD: a leading token above 1000 is taken
/// as the year, otherwise the third token is.
fn parse_date_tokens(text: &str) -> Option<NaiveDate> {
    let tokens = numeric_tokens(text, &['/', '-', '.', ' ', '\t']);
    if tokens.len() < 3 {
        return None;
    }

    let (year, month, day) = if tokens[0] > 1000 {
        (tokens[0], tokens[1], tokens[2])
    } else {
        (tokens[2], tokens[1], tokens[0])
    };
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Time half of a split date/time pair, as (hour, minute)
fn resolve_time_part(cell: &CellValue) -> Option<(u32, u32)> {
    match cell {
        CellValue::Number(fraction) => {
            if !fraction.is_finite() || *fraction < 0.0 {
                return None;
            }
            let seconds = (fraction.fract() * SECONDS_PER_DAY).round() as u32;
            Some((seconds / 3600, (seconds % 3600) / 60))
        }
        CellValue::Text(text) => {
            // "2024-01-01 14:30" style cells carry the time in the last token
            let clock = text.split_whitespace().last()?;
            let mut parts = clock.split(':');
            let hour = parts.next()?.trim().parse::<u32>().ok()?;
            let minute = parts.next()?.trim().parse::<u32>().ok()?;
            Some((hour, minute))
        }
        CellValue::Blank => None,
    }
}

/// Set hour and minute on a day; out-of-range values roll over into the next day
fn combine(day: NaiveDate, hour: u32, minute: u32) -> Option<NaiveDateTime> {
    day.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::hours(i64::from(hour)))?
        .checked_add_signed(Duration::minutes(i64::from(minute)))
}

fn zero_seconds(ts: NaiveDateTime) -> Option<NaiveDateTime> {
    ts.with_second(0)?.with_nanosecond(0)
}

/// Leading numeric tokens; parsing stops at the first non-numeric one
fn numeric_tokens(text: &str, separators: &[char]) -> Vec<u32> {
    text.trim()
        .split(|c| separators.contains(&c))
        .filter(|t| !t.is_empty())
        .map_while(|t| t.parse::<u32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn test_serial_without_time() {
        assert_eq!(
            resolve_timestamp(&CellValue::Number(45000.0), None),
            Some(at(2023, 3, 15, 0, 0))
        );
        assert_eq!(
            resolve_timestamp(&CellValue::Number(45000.5), None),
            Some(at(2023, 3, 15, 12, 0))
        );
    }

    #[test]
    fn test_serial_rounding_noise_is_zeroed() {
        let serial = 45000.0 + 14.0 / 24.0 + 0.0003 / 86_400.0;
        let ts = resolve_timestamp(&CellValue::Number(serial), None).unwrap();
        assert_eq!(ts, at(2023, 3, 15, 14, 0));

        let just_below = 45000.0 + 14.0 / 24.0 - 0.0003 / 86_400.0;
        let ts = resolve_timestamp(&CellValue::Number(just_below), None).unwrap();
        assert_eq!(ts, at(2023, 3, 15, 14, 0));
    }

    #[test]
    fn test_serial_matches_epoch_offset() {
        let epoch = at(1970, 1, 1, 0, 0);
        for day in (34000..48000).step_by(997) {
            for minute in [0u32, 59, 721, 1439] {
                let serial = day as f64 + f64::from(minute * 60 + 17) / 86_400.0;
                let expected = epoch
                    + Duration::days(day - UNIX_EPOCH_SERIAL as i64)
                    + Duration::minutes(i64::from(minute));
                assert_eq!(
                    resolve_timestamp(&CellValue::Number(serial), None),
                    Some(expected),
                    "serial {serial}"
                );
            }
        }
    }

    #[test]
    fn test_serial_date_with_text_time() {
        assert_eq!(
            resolve_timestamp(&CellValue::Number(45000.0), Some(&text("14:30"))),
            Some(at(2023, 3, 15, 14, 30))
        );
    }

    #[test]
    fn test_both_numeric() {
        assert_eq!(
            resolve_timestamp(&CellValue::Number(45000.0), Some(&CellValue::Number(0.5))),
            Some(at(2023, 3, 15, 12, 0))
        );
        // Date fraction is discarded in favour of the time cell
        assert_eq!(
            resolve_timestamp(&CellValue::Number(45000.9), Some(&CellValue::Number(0.25))),
            Some(at(2023, 3, 15, 6, 0))
        );
    }

    #[test]
    fn test_iso_text() {
        assert_eq!(
            resolve_timestamp(&text("2024-01-01T08:15:00"), None),
            Some(at(2024, 1, 1, 8, 15))
        );
        assert_eq!(
            resolve_timestamp(&text("2024-01-01 08:45"), None),
            Some(at(2024, 1, 1, 8, 45))
        );
        assert_eq!(
            resolve_timestamp(&text("2024-01-01T08:15:42+01:00"), None),
            Some(at(2024, 1, 1, 8, 15))
        );
        assert_eq!(
            resolve_timestamp(&text("2024-06-30"), None),
            Some(at(2024, 6, 30, 0, 0))
        );
    }

    #[test]
    fn test_day_first_text_fallback() {
        assert_eq!(
            resolve_timestamp(&text("15/03/2023 14:30"), None),
            Some(at(2023, 3, 15, 14, 30))
        );
        assert_eq!(
            resolve_timestamp(&text("01-02-2024 23:45"), None),
            Some(at(2024, 2, 1, 23, 45))
        );
        // Too few tokens without a time cell
        assert_eq!(resolve_timestamp(&text("15/03/2023"), None), None);
    }

    #[test]
    fn test_text_date_with_text_time() {
        assert_eq!(
            resolve_timestamp(&text("15/03/2023"), Some(&text("14:30:59"))),
            Some(at(2023, 3, 15, 14, 30))
        );
        assert_eq!(
            resolve_timestamp(&text("2023/03/15"), Some(&text("06:05"))),
            Some(at(2023, 3, 15, 6, 5))
        );
        assert_eq!(
            resolve_timestamp(&text("2023.03.15"), Some(&text("06:05"))),
            Some(at(2023, 3, 15, 6, 5))
        );
        assert_eq!(
            resolve_timestamp(&text("15/03/2023 00:00"), Some(&text("06:05"))),
            Some(at(2023, 3, 15, 6, 5))
        );
    }

    #[test]
    fn test_text_date_with_numeric_time() {
        assert_eq!(
            resolve_timestamp(&text("15/03/2023"), Some(&CellValue::Number(0.604166666))),
            Some(at(2023, 3, 15, 14, 30))
        );
    }

    #[test]
    fn test_time_rolls_over_midnight() {
        assert_eq!(
            resolve_timestamp(&text("15/03/2023"), Some(&text("24:15"))),
            Some(at(2023, 3, 16, 0, 15))
        );
    }

    #[test]
    fn test_blank_time_cell_is_ignored() {
        assert_eq!(
            resolve_timestamp(&CellValue::Number(45000.25), Some(&CellValue::Blank)),
            Some(at(2023, 3, 15, 6, 0))
        );
        assert_eq!(
            resolve_timestamp(&CellValue::Number(45000.25), Some(&text("  "))),
            Some(at(2023, 3, 15, 6, 0))
        );
    }

    #[test]
    fn test_unresolvable_is_none() {
        assert_eq!(resolve_timestamp(&CellValue::Blank, None), None);
        assert_eq!(resolve_timestamp(&CellValue::Blank, Some(&text("10:00"))), None);
        assert_eq!(resolve_timestamp(&text("Total"), None), None);
        assert_eq!(resolve_timestamp(&text("15/03/2023"), Some(&text("noon"))), None);
        assert_eq!(resolve_timestamp(&text("31/02/2023"), Some(&text("10:00"))), None);
        assert_eq!(resolve_timestamp(&CellValue::Number(f64::NAN), None), None);
    }

    #[test]
    fn test_old_years_rejected() {
        // 1984-11-14
        assert_eq!(resolve_timestamp(&CellValue::Number(31000.0), None), None);
        assert_eq!(resolve_timestamp(&text("1990-12-31T23:59"), None), None);
        assert!(resolve_timestamp(&text("1991-01-01T00:00"), None).is_some());
        // Small row numbers in a date column are not dates
        assert_eq!(resolve_timestamp(&CellValue::Number(12.0), None), None);
    }

    #[test]
    fn test_two_digit_year_is_rejected() {
        assert_eq!(resolve_timestamp(&text("15/03/23"), Some(&text("10:00"))), None);
    }
}
