//! Compact number formatting shared by every view and export.
//!
//! Nothing else in the crate formats report values; metric cards, axis ticks,
//! data-point labels, the HTML export and the PDF capture all go through here.

use time::{macros::format_description, Date, OffsetDateTime};

/// Suffix for values scaled by one hundred million.
pub const HUNDRED_MILLION_UNIT: &str = "億";
/// Suffix for values scaled by ten thousand.
pub const TEN_THOUSAND_UNIT: &str = "万";

const HUNDRED_MILLION: f64 = 100_000_000.0;
const TEN_THOUSAND: f64 = 10_000.0;
const MAX_FRACTION_DIGITS: i32 = 3;

/// Format a value with the hundred-million / ten-thousand unit markers.
///
/// Absent and non-finite values render as an empty string.
pub fn format_compact(value: Option<f64>) -> String {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return String::new();
    };
    let abs = v.abs();
    if abs >= HUNDRED_MILLION {
        format!("{}{}", to_fixed(v / HUNDRED_MILLION, 1), HUNDRED_MILLION_UNIT)
    } else if abs >= TEN_THOUSAND {
        format!("{}{}", to_fixed(v / TEN_THOUSAND, 0), TEN_THOUSAND_UNIT)
    } else {
        format_grouped(v)
    }
}

/// Thousands-grouped rendering with up to three fraction digits, trailing
/// zeros trimmed (`1234.5` -> `1,234.5`).
pub fn format_grouped(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let scale = 10f64.powi(MAX_FRACTION_DIGITS);
    let scaled = (value.abs() * scale).round();
    let int_part = (scaled / scale).trunc();
    let frac = (scaled - int_part * scale).round() as u64;

    let mut out = String::new();
    if value < 0.0 && scaled > 0.0 {
        out.push('-');
    }
    out.push_str(&group_digits(int_part as u64));
    if frac > 0 {
        let digits = format!("{:0width$}", frac, width = MAX_FRACTION_DIGITS as usize);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

/// Fixed-point rendering that rounds halves away from zero (`2.5` -> `3`).
fn to_fixed(value: f64, digits: i32) -> String {
    let factor = 10f64.powi(digits);
    let rounded = (value.abs() * factor).round() / factor;
    let sign = if value < 0.0 && rounded != 0.0 { "-" } else { "" };
    format!("{sign}{:.*}", digits as usize, rounded)
}

/// Date shown in report headers: the day the backend processed the job when
/// it says so, today otherwise.
pub fn report_date(processed_at: Option<&str>) -> String {
    let day = format_description!("[year]-[month]-[day]");
    processed_at
        .and_then(|s| s.get(..10))
        .and_then(|s| Date::parse(s, &day).ok())
        .unwrap_or_else(|| {
            OffsetDateTime::now_local()
                .unwrap_or_else(|_| OffsetDateTime::now_utc())
                .date()
        })
        .format(&day)
        .unwrap_or_default()
}

fn group_digits(n: u64) -> String {
    let raw = n.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_million_branch_keeps_one_decimal() {
        assert_eq!(format_compact(Some(150_000_000.0)), "1.5億");
        assert_eq!(format_compact(Some(100_000_000.0)), "1.0億");
        assert_eq!(format_compact(Some(-250_000_000.0)), "-2.5億");
    }

    #[test]
    fn ten_thousand_branch_rounds_half_up() {
        assert_eq!(format_compact(Some(25_000.0)), "3万");
        assert_eq!(format_compact(Some(10_000.0)), "1万");
        assert_eq!(format_compact(Some(99_994_999.0)), "9999万");
        assert_eq!(format_compact(Some(-35_000.0)), "-4万");
    }

    #[test]
    fn small_values_are_grouped() {
        assert_eq!(format_compact(Some(999.0)), "999");
        assert_eq!(format_compact(Some(9_999.0)), "9,999");
        assert_eq!(format_compact(Some(1_234.5)), "1,234.5");
        assert_eq!(format_compact(Some(0.12345)), "0.123");
        assert_eq!(format_compact(Some(-42.0)), "-42");
        assert_eq!(format_compact(Some(0.0)), "0");
    }

    #[test]
    fn absent_and_non_finite_are_empty() {
        assert_eq!(format_compact(None), "");
        assert_eq!(format_compact(Some(f64::NAN)), "");
        assert_eq!(format_compact(Some(f64::INFINITY)), "");
    }

    #[test]
    fn report_date_prefers_processing_day() {
        assert_eq!(report_date(Some("2024-05-01T00:00:00")), "2024-05-01");
        let today = report_date(None);
        assert_eq!(today.len(), 10);
        assert_eq!(report_date(Some("garbage")), today);
    }

    #[test]
    fn grouped_handles_large_counts() {
        assert_eq!(format_grouped(1_234_567.0), "1,234,567");
        assert_eq!(format_grouped(100.0), "100");
        assert_eq!(format_grouped(0.30000000000000004), "0.3");
    }
}
