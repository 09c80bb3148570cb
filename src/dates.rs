use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::reader::{looks_like_excel_date, Cell};

/// Statement date formats tried in order. Day-first conventions come
/// before month-first so ambiguous values resolve the same way every
/// run.
pub const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y", "%d/%m/%y", "%d-%m-%Y", "%d-%m-%y",
    "%Y-%m-%d", "%Y/%m/%d", "%Y%m%d",
    "%d.%m.%Y", "%d.%m.%y",
    "%m/%d/%Y", "%m/%d/%y",
    "%d %b %Y", "%d %b %y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug).
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial as i64))
}

/// Best-effort date detection for a raw string: excel serial window,
/// then the fixed format table, then datetime fallbacks. Strategies run
/// in order; the first hit wins.
pub fn detect_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(number) = trimmed.parse::<f64>() {
        if looks_like_excel_date(number) {
            return excel_serial_to_date(number);
        }
        // A bare number is only date-like as an 8-digit Ymd literal.
        if trimmed.len() == 8 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return NaiveDate::parse_from_str(trimmed, "%Y%m%d").ok();
        }
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }

    None
}

/// Date detection over a normalized cell. Numbers are only dates when
/// they fall in the excel serial window.
pub fn detect_date_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Null => None,
        Cell::Number(n) => {
            if looks_like_excel_date(*n) {
                excel_serial_to_date(*n)
            } else {
                None
            }
        }
        Cell::Text(s) => detect_date(s),
    }
}
