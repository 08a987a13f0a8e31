// Utility helpers for parsing, calendar math and basic statistics.
//
// This module centralizes all the "dirty" CSV/number/date handling so the
// rest of the code can assume clean, typed values.
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in CSV exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters, apart from the
///   exponent in scientific notation such as `1e3`.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// True when a cell is absent or whitespace only.
pub fn is_blank(s: Option<&str>) -> bool {
    s.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Exports from the collection system are not consistent about timestamps;
/// accept plain dates and the usual datetime spellings and keep the date.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Parse a target-customer flag. Accepts `1/0`, `true/false`, `y/n`, `yes/no`.
pub fn parse_flag(s: Option<&str>) -> Option<bool> {
    let s = s?.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "1.0" | "true" | "t" | "y" | "yes" => Some(true),
        "0" | "0.0" | "false" | "f" | "n" | "no" => Some(false),
        _ => None,
    }
}

pub fn floor_to_month(d: NaiveDate) -> NaiveDate {
    // Day 1 exists in every month, so `with_day(1)` cannot fail.
    d.with_day(1).unwrap_or(d)
}

/// Start of the month before the one containing `d`.
pub fn previous_month_start(d: NaiveDate) -> Option<NaiveDate> {
    floor_to_month(d).checked_sub_months(Months::new(1))
}

pub fn month_label(d: NaiveDate) -> String {
    d.format("%Y-%m").to_string()
}

/// Divide, returning 0 instead of NaN/inf when the denominator is 0.
pub fn safe_ratio(num: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        return 0.0;
    }
    let r = num / denom;
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Sample standard deviation (n - 1 denominator). `None` below two samples,
/// where the estimate is undefined.
pub fn sample_std_dev(v: &[f64]) -> Option<f64> {
    if v.len() < 2 {
        return None;
    }
    let mean = average(v);
    let ss: f64 = v.iter().map(|x| (x - mean).powi(2)).sum();
    Some((ss / (v.len() - 1) as f64).sqrt())
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    // Avoid rendering "-0" for values that round to zero.
    let is_zero = s.chars().all(|c| c == '0' || c == '.');
    if n.is_sign_negative() && !is_zero {
        format!("-{}", res)
    } else {
        res
    }
}

/// Render a ratio (0.125) as a percentage string ("12.5%").
pub fn format_pct(ratio: f64, decimals: usize) -> String {
    format!("{}%", format_number(ratio * 100.0, decimals))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}
