//! Time display helpers

/// How much of a timestamp to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePrecision {
    /// M:SS
    Seconds,
    /// M:SS.mmm
    Milliseconds,
}

/// Format seconds as minutes and seconds, e.g. `1:05.250`
pub fn format_time(seconds: f64, precision: TimePrecision) -> String {
    let sign = if seconds < 0.0 { "-" } else { "" };
    let total_ms = (seconds.abs() * 1000.0).round() as u64;

    let minutes = total_ms / 60_000;
    let secs = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;

    match precision {
        TimePrecision::Seconds => format!("{sign}{minutes}:{secs:02}"),
        TimePrecision::Milliseconds => format!("{sign}{minutes}:{secs:02}.{millis:03}"),
    }
}
