//! Text cleanup helpers for scraped cell content.

use std::sync::LazyLock;

use regex::Regex;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Marker boards put in the number cell of pinned notices.
pub const NOTICE_MARKER: &str = "공지";

/// Collapse runs of whitespace (including NBSP) to single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse whitespace, mapping empty results to `None`.
pub fn non_empty(s: &str) -> Option<String> {
    let cleaned = collapse_whitespace(s);
    if cleaned.is_empty() || cleaned == "-" {
        None
    } else {
        Some(cleaned)
    }
}

/// Keep at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Parse a view counter cell: strip thousands separators, take the first
/// run of digits. Defaults to 0.
pub fn extract_views(cell_text: &str) -> u64 {
    let stripped = cell_text.replace(',', "");
    DIGITS
        .find(&stripped)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Default pinned-notice check on the number cell.
pub fn is_notice_number(number: &str) -> bool {
    let number = number.trim();
    number.is_empty() || number.contains(NOTICE_MARKER)
}

/// Normalize multi-line body text: trim each line, drop blank runs.
pub fn clean_body_text(s: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in s.lines() {
        let line = collapse_whitespace(line);
        if line.is_empty() {
            if out.last().map(|l| !l.is_empty()).unwrap_or(false) {
                out.push(String::new());
            }
        } else {
            out.push(line);
        }
    }
    while out.last().map(|l| l.is_empty()).unwrap_or(false) {
        out.pop();
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b\u{a0}c  "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" - "), None);
        assert_eq!(non_empty(" 총무과 "), Some("총무과".to_string()));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("가나다라", 2), "가나");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_extract_views() {
        assert_eq!(extract_views("1,234"), 1234);
        assert_eq!(extract_views("조회 56회"), 56);
        assert_eq!(extract_views(""), 0);
        assert_eq!(extract_views("-"), 0);
    }

    #[test]
    fn test_notice_number() {
        assert!(is_notice_number(""));
        assert!(is_notice_number("  "));
        assert!(is_notice_number("[공지]"));
        assert!(!is_notice_number("17"));
    }

    #[test]
    fn test_clean_body_text() {
        let body = "  첫 줄  \n\n\n   둘째   줄\n  \n";
        assert_eq!(clean_body_text(body), "첫 줄\n\n둘째 줄");
    }
}
