//! Duration parsing utilities.

use anyhow::Context;
use std::time::Duration;

/// Parse a poll interval like "500ms", "2s", "1m", "250" into a duration.
/// Supports:
/// - Plain numbers (interpreted as milliseconds): "250"
/// - Milliseconds suffix: "500ms"
/// - Seconds suffix: "2s"
/// - Minutes suffix: "1m"
pub fn parse_poll_interval(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    // "ms" has to be checked before the single-letter suffixes
    if let Some(num_str) = s.strip_suffix("ms") {
        let millis: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid milliseconds value: {num_str}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(num_str) = s.strip_suffix('s') {
        let secs: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid seconds value: {num_str}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(num_str) = s.strip_suffix('m') {
        let minutes: u64 = num_str
            .parse()
            .with_context(|| format!("Invalid minutes value: {num_str}"))?;
        return Ok(Duration::from_secs(minutes * 60));
    }

    // No suffix - treat as milliseconds
    s.parse::<u64>()
        .map(Duration::from_millis)
        .with_context(|| format!("Invalid duration value: {s}"))
}
