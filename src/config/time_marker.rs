//! Time marker parsing for offset queries.

use anyhow::Context;
use chrono::DateTime;
use ktail_kafka::TimeMarker;

/// Parse "latest", "earliest", milliseconds since the epoch, or an RFC 3339
/// timestamp.
pub fn parse_time_marker(s: &str) -> anyhow::Result<TimeMarker> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "latest" => return Ok(TimeMarker::Latest),
        "earliest" => return Ok(TimeMarker::Earliest),
        _ => {}
    }

    if let Ok(ms) = s.parse::<i64>() {
        if ms < 0 {
            anyhow::bail!("Negative timestamp {ms}; use 'latest' or 'earliest'");
        }
        return Ok(TimeMarker::At(ms));
    }

    let timestamp = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid time marker: {s}"))?;
    Ok(TimeMarker::At(timestamp.timestamp_millis()))
}
