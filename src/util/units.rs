//! Units parsing and formatting utilities
//!
//! Parses human-readable database sizes and renders byte counts and
//! microsecond timings for the console report. The formatters are
//! display-only; no arithmetic is done on their output.

use crate::{BenchError, Result};

const KIB: u64 = 1024;

/// Parse a human-readable size string into bytes
///
/// Accepts `<number>[.<fraction>]<unit>` where unit is one of `""`, `B`,
/// `K`/`KB`, `M`/`MB`, `G`/`GB`, `T`/`TB` (case-insensitive). Multipliers
/// are binary: `1K` is 1024 bytes.
///
/// # Examples
/// ```
/// use pirbench::util::units::parse_size;
///
/// assert_eq!(parse_size("1GB").unwrap(), 1 << 30);
/// assert_eq!(parse_size("100KB").unwrap(), 100 * 1024);
/// assert_eq!(parse_size("123").unwrap(), 123);
/// ```
pub fn parse_size(input: &str) -> Result<u64> {
    let normalized = input.trim().to_uppercase();

    let (number_part, unit_part) = split_number_and_unit(&normalized).ok_or_else(|| {
        BenchError::InvalidFormat(format!(
            "{} (use formats like 1GB, 500MB, 100KB)",
            input.trim()
        ))
    })?;

    let tier = match unit_part {
        "" | "B" => 0,
        "K" | "KB" => 1,
        "M" | "MB" => 2,
        "G" | "GB" => 3,
        "T" | "TB" => 4,
        _ => {
            return Err(BenchError::InvalidFormat(format!(
                "{} (unknown unit '{}')",
                input.trim(),
                unit_part
            )))
        }
    };

    let number = parse_number(number_part)?;
    let multiplier = KIB.pow(tier) as f64;

    Ok((number * multiplier) as u64)
}

/// Parse the numeric portion of a size expression
pub(crate) fn parse_number(number_part: &str) -> Result<f64> {
    number_part
        .parse::<f64>()
        .map_err(|_| BenchError::InvalidNumber(number_part.to_string()))
}

/// Split `<digits>[.<digits>][ws]<rest>` into its number and unit parts.
/// Returns `None` when the leading number is missing or malformed.
fn split_number_and_unit(input: &str) -> Option<(&str, &str)> {
    let bytes = input.as_bytes();
    let digits_end = |from: usize| {
        let mut end = from;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        end
    };

    let mut end = digits_end(0);
    if end == 0 {
        return None;
    }

    if end < bytes.len() && bytes[end] == b'.' {
        let fraction_end = digits_end(end + 1);
        if fraction_end == end + 1 {
            return None;
        }
        end = fraction_end;
    }

    Some((&input[..end], input[end..].trim_start()))
}

/// Format bytes into human-readable size with binary units
///
/// # Examples
/// ```
/// use pirbench::util::units::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["KB", "MB", "GB", "TB"];

    if bytes < KIB {
        return format!("{} B", bytes);
    }

    let mut divisor = KIB;
    let mut unit_index = 0;
    let mut remaining = bytes / KIB;
    while remaining >= KIB && unit_index < UNITS.len() - 1 {
        divisor *= KIB;
        unit_index += 1;
        remaining /= KIB;
    }

    format!("{:.2} {}", bytes as f64 / divisor as f64, UNITS[unit_index])
}

/// Format a microsecond count as `us`, `ms` or `s`
///
/// # Examples
/// ```
/// use pirbench::util::units::format_time;
///
/// assert_eq!(format_time(500), "500.00 us");
/// assert_eq!(format_time(1500), "1.50 ms");
/// assert_eq!(format_time(2_500_000), "2.50 s");
/// ```
pub fn format_time(us: i64) -> String {
    if us < 1_000 {
        format!("{:.2} us", us as f64)
    } else if us < 1_000_000 {
        format!("{:.2} ms", us as f64 / 1_000.0)
    } else {
        format!("{:.2} s", us as f64 / 1_000_000.0)
    }
}
