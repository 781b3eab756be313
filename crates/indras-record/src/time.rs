//! Timestamp parsing for `Time` comparisons

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
    // ctime
    "%a %b %e %H:%M:%S %Y",
];

/// Parse a timestamp as stored in a record or written in a query
///
/// Accepts seconds since the Unix epoch, RFC 3339, `YYYY-MM-DD hh:mm:ss`,
/// `YYYY.MM.DD hh:mm:ss`, ctime output (naive forms are read as UTC), and
/// offsets from now such as `+30`, `-5m` or `-2d`.
pub fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(offset) = text.strip_prefix('+') {
        return relative(offset, 1);
    }
    if let Some(offset) = text.strip_prefix('-') {
        return relative(offset, -1);
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        let seconds: i64 = text.parse().ok()?;
        return DateTime::from_timestamp(seconds, 0);
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

fn relative(offset: &str, sign: i64) -> Option<DateTime<Utc>> {
    let split = offset
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(offset.len());
    let (digits, unit) = offset.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let amount: i64 = digits.parse().ok()?;
    let scale = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 604_800,
        _ => return None,
    };
    let seconds = amount.checked_mul(scale)?.checked_mul(sign)?;
    Utc::now().checked_add_signed(TimeDelta::try_seconds(seconds)?)
}
