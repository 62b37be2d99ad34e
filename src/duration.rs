//! Human-readable durations for summary panels and phase charts.

const SECOND_MS: u64 = 1_000;
const MINUTE_MS: u64 = 60 * SECOND_MS;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Formats milliseconds as `1d 2h 20m 5s`.
///
/// Leading zero units are dropped; once a non-zero unit has been written every
/// smaller unit follows, so `3_605_000` renders as `1h 0m 5s`. Sub-second
/// remainders are truncated and zero renders as `0s`. Negative input is
/// treated as zero.
pub fn format_duration_ms(ms: i64) -> String {
    let mut rest = ms.max(0) as u64;
    let days = rest / DAY_MS;
    rest %= DAY_MS;
    let hours = rest / HOUR_MS;
    rest %= HOUR_MS;
    let minutes = rest / MINUTE_MS;
    rest %= MINUTE_MS;
    let seconds = rest / SECOND_MS;

    let units = [(days, "d"), (hours, "h"), (minutes, "m")];
    let mut parts: Vec<String> = Vec::with_capacity(4);
    for (value, suffix) in units {
        if value > 0 || !parts.is_empty() {
            parts.push(format!("{}{}", value, suffix));
        }
    }
    parts.push(format!("{}s", seconds));
    parts.join(" ")
}

/// Same as [`format_duration_ms`] for unsigned counters.
pub fn format_duration(ms: u64) -> String {
    format_duration_ms(i64::try_from(ms).unwrap_or(i64::MAX))
}
