//! ISO 8601 duration parsing for `contentDetails.duration` values.

/// Parse an ISO 8601 duration such as `PT1H2M3S` or `P1DT30M` into whole
/// seconds. Fractional seconds are truncated. Returns `None` when the value
/// is not a duration.
pub fn parse_iso8601_duration(value: &str) -> Option<i64> {
    let duration = value.trim().parse::<iso8601::Duration>().ok()?;
    let duration: std::time::Duration = duration.into();
    i64::try_from(duration.as_secs()).ok()
}
