use std::time::Duration;

/// Format a `Duration` as a human-readable string with automatic unit scaling.
///
/// Produces output like `1.94ms`, `2.34s`, `150.00µs` using Rust's Debug format.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// Whole and fractional seconds, as written to the elapsed-time file.
pub fn fmt_seconds(d: Duration) -> String {
    format!("{:.2}", d.as_secs_f64())
}
