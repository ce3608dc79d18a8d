//! Utility functions for hedgerpc

use crate::common::{Error, Result};
use std::path::Path;
use std::time::Duration;

/// Parse duration string (e.g., "250ms", "6s", "5m", "1h")
///
/// A bare number is read as milliseconds, matching the `*_ms` config fields.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::InvalidConfig("empty duration".into()));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (num_str, unit) = s.split_at(split);

    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "" | "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => Duration::from_secs(num * 60),
        "h" => Duration::from_secs(num * 3600),
        _ => {
            return Err(Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Parse a replica list: one URI per line, blank lines and `#` comments skipped
pub fn parse_replica_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a replica list file
pub fn load_replica_addresses(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let replicas = parse_replica_list(&contents);
    tracing::debug!(
        "Loaded {} replica addresses from {}",
        replicas.len(),
        path.as_ref().display()
    );
    Ok(replicas)
}
