//! Date normalization for board date cells.
//!
//! Boards print dates in many shapes (`2024-03-15`, `2024.03.15.`,
//! `2024/3/5 14:02`, `2024년 3월 15일`, RFC 3339 with offsets). Everything is
//! reduced to a naive local datetime; offset-carrying inputs are converted to
//! UTC first. Results outside `[MIN_YEAR, MAX_YEAR]` are rejected so a stray
//! view counter glued to a date can never become a post date.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

/// Date embedded in free cell text. `\d{1,2}` stops trailing digits such as
/// `2021-02-242937` from leaking into the day.
static DATE_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}[-./\s]\d{1,2}[-./\s]\d{1,2})").unwrap());

static TOLERANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})\s*[-./\s]\s*(\d{1,2})\s*[-./\s]\s*(\d{1,2})\.?(?:[\sT]+(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\.\d+)?)?$",
    )
    .unwrap()
});

static KOREAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*년\s*(\d{1,2})\s*월\s*(\d{1,2})\s*일(?:\s*(\d{1,2})\s*시(?:\s*(\d{1,2})\s*분)?)?")
        .unwrap()
});

static COMPACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap());

/// Offset-aware formats tried before the tolerant pass.
const AWARE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Normalize a free-form date string.
///
/// Returns `None` for empty input, unparseable input, or a year outside
/// `[MIN_YEAR, MAX_YEAR]`.
pub fn normalize_date(input: &str) -> Option<NaiveDateTime> {
    normalize_date_with(input, None)
}

/// Like [`normalize_date`], trying a site-specific `strftime` format first.
pub fn normalize_date_with(input: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    // Fast path
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return in_range(d.and_time(NaiveTime::MIN));
    }

    if let Some(fmt) = format {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return in_range(dt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return in_range(d.and_time(NaiveTime::MIN));
        }
    }

    if let Some(dt) = parse_aware(s) {
        return in_range(dt);
    }

    parse_tolerant(s).and_then(in_range)
}

/// Find the first date-looking run in cell text and normalize it.
///
/// Returns the parsed value (if any) and the matched text, or the trimmed
/// cell text when nothing matched.
pub fn extract_date(cell_text: &str, format: Option<&str>) -> (Option<NaiveDateTime>, String) {
    let text = cell_text.trim();
    if let Some(m) = DATE_IN_TEXT.find(text) {
        let matched = m.as_str().to_string();
        return (normalize_date_with(&matched, format), matched);
    }
    if let Some(caps) = KOREAN.captures(text) {
        let matched = caps.get(0).map(|m| m.as_str()).unwrap_or(text).to_string();
        return (normalize_date_with(&matched, format), matched);
    }
    (normalize_date_with(text, format), text.to_string())
}

fn parse_aware(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    None
}

fn parse_tolerant(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim_end_matches('.').trim();

    if let Some(caps) = TOLERANT.captures(s) {
        let date = ymd(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str())?;
        let time = match caps.get(4) {
            Some(h) => NaiveTime::from_hms_opt(
                h.as_str().parse().ok()?,
                caps.get(5)?.as_str().parse().ok()?,
                caps.get(6).map(|m| m.as_str().parse().ok()).unwrap_or(Some(0))?,
            )?,
            None => NaiveTime::MIN,
        };
        return Some(date.and_time(time));
    }

    if let Some(caps) = KOREAN.captures(s) {
        let date = ymd(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str())?;
        let hour: u32 = caps.get(4).map(|m| m.as_str().parse().ok()).unwrap_or(Some(0))?;
        let minute: u32 = caps.get(5).map(|m| m.as_str().parse().ok()).unwrap_or(Some(0))?;
        return Some(date.and_time(NaiveTime::from_hms_opt(hour, minute, 0)?));
    }

    if let Some(caps) = COMPACT.captures(s) {
        let date = ymd(caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str())?;
        return Some(date.and_time(NaiveTime::MIN));
    }

    None
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn in_range(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    let year = dt.year();
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Some(dt)
    } else {
        None
    }
}

/// Parse a CLI date bound (`YYYY-MM-DD`) and check it is in range.
pub fn parse_bound(s: &str) -> Option<NaiveDate> {
    let d = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
    (MIN_YEAR..=MAX_YEAR).contains(&d.year()).then_some(d)
}
