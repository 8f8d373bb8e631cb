//! XMLTV timestamp parsing and formatting
//!
//! Entry `start`/`stop` attributes carry `YYYYMMDDHHMMSS` with an optional
//! `±HHMM` UTC-offset suffix. Stages re-derive parsed times from the
//! attribute text on every use; nothing caches a parsed form on the
//! document.

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;

/// Parse an XMLTV timestamp like `20231215203000 +1300`.
///
/// When the offset suffix is absent the timestamp is interpreted in
/// `default_tz` (the feed's configured timezone).
pub fn parse_xmltv_datetime(
    value: &str,
    default_tz: &Tz,
) -> Result<DateTime<FixedOffset>, String> {
    let mut parts = value.split_whitespace();
    let stamp = parts
        .next()
        .ok_or_else(|| format!("empty timestamp '{}'", value))?;
    let offset = parts.next();

    if stamp.len() < 14 || !stamp.is_ascii() {
        return Err(format!(
            "timestamp '{}' is not in YYYYMMDDHHMMSS form",
            value
        ));
    }

    let naive = NaiveDateTime::parse_from_str(&stamp[..14], "%Y%m%d%H%M%S")
        .map_err(|e| format!("invalid timestamp '{}': {}", value, e))?;

    match offset {
        Some(suffix) => {
            let offset = parse_utc_offset(suffix)?;
            match offset.from_local_datetime(&naive) {
                LocalResult::Single(dt) => Ok(dt),
                _ => Err(format!("unrepresentable timestamp '{}'", value)),
            }
        }
        None => match default_tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Ok(dt.fixed_offset()),
            // DST fold: take the earlier reading
            LocalResult::Ambiguous(dt, _) => Ok(dt.fixed_offset()),
            LocalResult::None => Err(format!(
                "timestamp '{}' does not exist in timezone {}",
                value, default_tz
            )),
        },
    }
}

/// Format a datetime back into the XMLTV attribute form, offset included
pub fn format_xmltv_datetime(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y%m%d%H%M%S %z").to_string()
}

/// Parse a `±HHMM` UTC-offset suffix into a `FixedOffset`
fn parse_utc_offset(suffix: &str) -> Result<FixedOffset, String> {
    let re = Regex::new(r"^([+-])(\d{2})(\d{2})$").map_err(|e| format!("invalid regex: {}", e))?;
    let caps = re
        .captures(suffix)
        .ok_or_else(|| format!("invalid UTC offset '{}'", suffix))?;

    let hours: i32 = caps[2].parse().map_err(|_| format!("bad offset '{}'", suffix))?;
    let minutes: i32 = caps[3].parse().map_err(|_| format!("bad offset '{}'", suffix))?;
    let seconds = hours * 3600 + minutes * 60;
    let seconds = if &caps[1] == "-" { -seconds } else { seconds };

    FixedOffset::east_opt(seconds).ok_or_else(|| format!("UTC offset '{}' out of range", suffix))
}
