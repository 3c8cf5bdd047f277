//! Planning-month arithmetic.
//!
//! Planned implementation months are stored as the last calendar day of the
//! month; the quarter is derived from it.

use time::{Date, Duration, Month};

const MONTH_NAMES: [(&str, u8); 13] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("sept", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

pub fn last_day_of_month(year: i32, month: u8) -> Option<Date> {
    let month = Month::try_from(month).ok()?;
    let day = time::util::days_in_year_month(year, month);
    Date::from_calendar_date(year, month, day).ok()
}

pub fn quarter_of(date: Date) -> u8 {
    (u8::from(date.month()) - 1) / 3 + 1
}

/// Normalises any date to the end of its month.
pub fn month_end(date: Date) -> Date {
    last_day_of_month(date.year(), u8::from(date.month())).unwrap_or(date)
}

/// Serial of 9999-12-31, the last day a spreadsheet can show.
const MAX_SERIAL: f64 = 2_958_465.0;

/// Spreadsheet serial day numbers count from 1899-12-30.
pub fn excel_serial_to_date(serial: f64) -> Option<Date> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = Date::from_calendar_date(1899, Month::December, 30).ok()?;
    epoch.checked_add(Duration::days(serial.trunc() as i64))
}

/// Parses the month spellings found in planning sheets: `Aug-26`,
/// `August 2026`, `2026-08`, `2026-08-15`, `15/08/2026`, `08/2026`.
/// Returns the last day of the named month.
pub fn parse_planned_month(raw: &str) -> Option<Date> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    let (year, month) = if text.chars().any(|c| c.is_ascii_alphabetic()) {
        parse_named_month(text)?
    } else if text.contains('/') {
        parse_slashed(text)?
    } else {
        parse_iso(text)?
    };
    last_day_of_month(year, month)
}

fn month_from_name(token: &str) -> Option<u8> {
    let lower = token.to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .find(|(name, _)| *name == lower || (lower.len() == 3 && name.starts_with(&lower)))
        .map(|(_, n)| *n)
}

fn expand_year(token: &str) -> Option<i32> {
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match token.len() {
        2 => token.parse::<i32>().ok().map(|yy| 2000 + yy),
        4 => token.parse().ok(),
        _ => None,
    }
}

fn parse_named_month(text: &str) -> Option<(i32, u8)> {
    let tokens: Vec<&str> = text
        .split(|c: char| c == '-' || c == ' ' || c == '/' || c == '.' || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    let month = tokens.iter().find_map(|t| month_from_name(t))?;
    let year = tokens.iter().rev().find_map(|t| expand_year(t))?;
    Some((year, month))
}

fn parse_slashed(text: &str) -> Option<(i32, u8)> {
    let parts: Vec<&str> = text.split('/').map(str::trim).collect();
    let (month, year) = match parts.as_slice() {
        [_day, month, year] => (month, year),
        [month, year] => (month, year),
        _ => return None,
    };
    let month: u8 = month.parse().ok()?;
    let year = expand_year(year)?;
    (1..=12).contains(&month).then_some((year, month))
}

fn parse_iso(text: &str) -> Option<(i32, u8)> {
    // Drop any time-of-day suffix such as `2026-08-15 00:00:00`.
    let date_part = text.split(|c| c == ' ' || c == 'T').next()?;
    let mut parts = date_part.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    if let Some(day) = parts.next() {
        let day: u8 = day.parse().ok()?;
        if !(1..=31).contains(&day) {
            return None;
        }
    }
    if parts.next().is_some() || !(1..=12).contains(&month) || year < 1000 {
        return None;
    }
    Some((year, month))
}
