use chrono::{Duration, NaiveDate};

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Tolerant numeric parse: thousands commas, trailing `%`, `(x)` negatives.
/// Anything unreadable is zero.
pub fn number_or_zero(raw: &str) -> f64 {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let s = compact.strip_suffix('%').unwrap_or(&compact);
    if s.is_empty() {
        return 0.0;
    }
    let value = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => inner.parse::<f64>().map(|n| -n),
        None => s.parse::<f64>(),
    };
    match value {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Integer-coded columns go through the same tolerant parse, then drop the fraction
/// (`"1,234"` → 1234, `"(7)"` → -7, `"12.7"` → 12).
pub fn int_or_zero(raw: &str) -> i64 {
    let n = number_or_zero(raw).trunc();
    if n.abs() < i64::MAX as f64 {
        n as i64
    } else {
        0
    }
}

/// Digits only, left-padded to 13.
pub fn pad13(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits:0>13}")
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Part {
    /// One to four digits; fewer than three are century-corrected.
    Year4,
    /// One or two digits, century-corrected.
    Year2,
    Month,
    Day,
    /// English month abbreviation, case-insensitive.
    MonthName,
}

struct DateFormat {
    sep: char,
    parts: [Part; 3],
}

use Part::*;

/// Candidate layouts in priority order; the first one that yields a real date wins.
const DATE_FORMATS: &[DateFormat] = &[
    // yyyy-MM-dd
    DateFormat { sep: '-', parts: [Year4, Month, Day] },
    // MM/dd/yyyy, M/d/yyyy
    DateFormat { sep: '/', parts: [Month, Day, Year4] },
    // M/d/yy
    DateFormat { sep: '/', parts: [Month, Day, Year2] },
    // dd/MM/yyyy, d/M/yyyy
    DateFormat { sep: '/', parts: [Day, Month, Year4] },
    // d/M/yy
    DateFormat { sep: '/', parts: [Day, Month, Year2] },
    // yyyy/M/d
    DateFormat { sep: '/', parts: [Year4, Month, Day] },
    // dd-MMM-yy
    DateFormat { sep: '-', parts: [Day, MonthName, Year2] },
    // dd-MMM-yyyy
    DateFormat { sep: '-', parts: [Day, MonthName, Year4] },
];

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn all_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// Two-digit years: 70..=99 land in the 1900s, the rest in the 2000s.
pub fn coerce_century(year: i32) -> i32 {
    if year >= 100 {
        year
    } else if year >= 70 {
        1900 + year
    } else {
        2000 + year
    }
}

impl DateFormat {
    fn parse(&self, s: &str) -> Option<NaiveDate> {
        let fields: Vec<&str> = s.split(self.sep).collect();
        if fields.len() != 3 {
            return None;
        }
        let (mut y, mut m, mut d) = (None, None, None);
        for (part, field) in self.parts.iter().zip(&fields) {
            match part {
                Year4 if all_digits(field, 1, 4) => y = field.parse().ok().map(coerce_century),
                Year2 if all_digits(field, 1, 2) => y = field.parse().ok().map(coerce_century),
                Month if all_digits(field, 1, 2) => m = field.parse().ok(),
                Day if all_digits(field, 1, 2) => d = field.parse().ok(),
                MonthName => {
                    let lower = field.to_ascii_lowercase();
                    m = MONTH_NAMES
                        .iter()
                        .position(|name| *name == lower)
                        .map(|i| i as u32 + 1);
                }
                _ => return None,
            }
        }
        NaiveDate::from_ymd_opt(y?, m?, d?)
    }
}

fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Days since 1899-12-30; no correction for the 1900 leap-year quirk.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial.abs() > 3_000_000.0 {
        return None;
    }
    let days = serial.floor() as i64;
    excel_epoch()?.checked_add_signed(Duration::days(days))
}

/// Normalise a date cell to `yyyy-MM-dd`. `None` means the row should be skipped.
pub fn parse_date_to_iso(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| fmt.parse(s))
        .or_else(|| s.parse::<f64>().ok().and_then(excel_serial_to_date))?;
    Some(date.format("%Y-%m-%d").to_string())
}
