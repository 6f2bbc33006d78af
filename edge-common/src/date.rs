//! HTTP date formatting.
//!
//! spec.md §9 calls out that `Last-Modified` and `Expires` intentionally use
//! two different day-of-month formats (`02` vs `2`) and that reproducing
//! this on-the-wire quirk is load-bearing for existing clients, so both
//! formats are hand-written rather than delegated to a single helper.

use chrono::{TimeZone, Utc};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Formats a unix timestamp as `Mon, 02 Jan 2006 15:04:05 GMT` (two-digit day).
///
/// Used for `Last-Modified` and `ETag` derivation.
pub fn format_gmt_two_digit_day(unix_time: i64) -> String {
    let dt = Utc.timestamp_opt(unix_time, 0).single().unwrap_or_default();
    format!(
        "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
        WEEKDAYS[dt.format("%w").to_string().parse::<usize>().unwrap_or(0)],
        dt.format("%d").to_string().parse::<u32>().unwrap_or(1),
        MONTHS[(dt.format("%m").to_string().parse::<usize>().unwrap_or(1)).saturating_sub(1)],
        dt.format("%Y"),
        dt.format("%H").to_string().parse::<u32>().unwrap_or(0),
        dt.format("%M").to_string().parse::<u32>().unwrap_or(0),
        dt.format("%S").to_string().parse::<u32>().unwrap_or(0),
    )
}

/// Formats a unix timestamp as `Mon, 2 Jan 2006 15:04:05 GMT` (single-digit day).
///
/// Used for `Expires`, matching the original implementation's legacy format.
pub fn format_gmt_single_digit_day(unix_time: i64) -> String {
    let dt = Utc.timestamp_opt(unix_time, 0).single().unwrap_or_default();
    format!(
        "{}, {} {} {} {:02}:{:02}:{:02} GMT",
        WEEKDAYS[dt.format("%w").to_string().parse::<usize>().unwrap_or(0)],
        dt.format("%d").to_string().parse::<u32>().unwrap_or(1),
        MONTHS[(dt.format("%m").to_string().parse::<usize>().unwrap_or(1)).saturating_sub(1)],
        dt.format("%Y"),
        dt.format("%H").to_string().parse::<u32>().unwrap_or(0),
        dt.format("%M").to_string().parse::<u32>().unwrap_or(0),
        dt.format("%S").to_string().parse::<u32>().unwrap_or(0),
    )
}

/// Returns the current unix timestamp (seconds).
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}
