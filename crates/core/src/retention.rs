//! Retention policy naming and duration strings.
//!
//! A whisper archive keeps `seconds_per_point * points` seconds of data. The
//! target retention policy for that archive is named after that duration
//! using InfluxQL duration units, so the same string is both the policy name
//! and a valid `DURATION` literal.

use std::time::Duration;

use crate::error::{Error, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Canonical retention policy name for an archive retention.
///
/// Largest units first, zero components omitted: `86400s` is `1d`, `5400s`
/// is `1h30m`. Sub-second precision is dropped.
pub fn retention_policy_name(retention: Duration) -> String {
    let mut secs = retention.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut name = String::new();
    for (unit, label) in [(DAY, 'd'), (HOUR, 'h'), (MINUTE, 'm'), (1, 's')] {
        let n = secs / unit;
        if n > 0 {
            name.push_str(&n.to_string());
            name.push(label);
            secs %= unit;
        }
    }
    name
}

/// Parse a duration string such as `500ms`, `10s`, `1h30m` or `52w`.
///
/// Units: `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`, `d`, `w`. A bare `0` is
/// accepted.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::config("empty duration"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(Error::config(format!("invalid duration {:?}", input)));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| Error::config(format!("invalid duration {:?}", input)))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ns" => Duration::from_nanos(amount),
            "us" | "µs" => Duration::from_micros(amount),
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount * MINUTE),
            "h" => Duration::from_secs(amount * HOUR),
            "d" => Duration::from_secs(amount * DAY),
            "w" => Duration::from_secs(amount * 7 * DAY),
            "" => {
                return Err(Error::config(format!(
                    "missing unit in duration {:?}",
                    input
                )))
            }
            other => {
                return Err(Error::config(format!(
                    "unknown unit {:?} in duration {:?}",
                    other, input
                )))
            }
        };
        total += part;
    }

    Ok(total)
}
