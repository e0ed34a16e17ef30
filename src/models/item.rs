//! Board rows as produced by list-page parsing.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters boards commonly use as stable post identifiers.
const ID_PARAMS: &[&str] = &[
    "nttId", "nttNo", "bbsSn", "boardSeq", "seq", "idx", "articleNo", "bIdx", "num", "no", "id",
    "key", "uid",
];

/// Meeting metadata carried by minutes boards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_date: Option<NaiveDate>,
}

impl MeetingInfo {
    pub fn is_empty(&self) -> bool {
        self.session.is_none()
            && self.meeting_order.is_none()
            && self.meeting_type.is_none()
            && self.meeting_date.is_none()
    }
}

/// One row of a board list page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Row number as displayed; empty for pinned notices.
    pub number: String,
    pub title: String,
    pub department: Option<String>,
    /// `None` when the date cell could not be parsed.
    pub post_date: Option<NaiveDateTime>,
    pub post_date_str: String,
    pub views: Option<u64>,
    pub has_attachment: bool,
    pub detail_url: Option<String>,
    pub docid: Option<String>,
    /// Set by plugins that recognise notice rows by markup (CSS class, icon).
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingInfo>,
}

impl ListItem {
    pub fn new(number: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Stable identifier for the DOCID index.
    ///
    /// Uses the plugin-supplied id, then a well-known id query parameter of
    /// the detail URL, then a hash of the detail URL, then a hash of the row.
    pub fn effective_docid(&self) -> String {
        if let Some(id) = self.docid.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return id.to_string();
        }

        if let Some(url) = self.detail_url.as_deref() {
            if let Some(id) = id_from_url(url) {
                return id;
            }
            return short_hash(url);
        }

        short_hash(&format!(
            "{}|{}|{}",
            self.number.trim(),
            self.title.trim(),
            self.post_date_str.trim()
        ))
    }
}

/// Extract a post id from well-known query parameters.
pub fn id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    for wanted in ID_PARAMS {
        if let Some((_, v)) = pairs
            .iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(wanted) && !v.trim().is_empty())
        {
            return Some(v.trim().to_string());
        }
    }
    None
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("h{}", &digest[..16])
}

/// Inclusive date bounds for a harvest.
///
/// `start` doubles as the cutoff: rows strictly older end the walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// True when the post date lies strictly before the cutoff.
    pub fn is_before_cutoff(&self, post_date: NaiveDateTime) -> bool {
        match self.start {
            Some(start) => post_date.date() < start,
            None => false,
        }
    }

    /// True when the post date lies after the end bound.
    pub fn is_after_end(&self, post_date: NaiveDateTime) -> bool {
        match self.end {
            Some(end) => post_date.date() > end,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_docid_prefers_plugin_value() {
        let mut item = ListItem::new("1", "title");
        item.docid = Some(" 12345 ".to_string());
        item.detail_url = Some("https://a.go.kr/view.do?nttId=999".to_string());
        assert_eq!(item.effective_docid(), "12345");
    }

    #[test]
    fn test_docid_from_query_param() {
        let mut item = ListItem::new("1", "title");
        item.detail_url = Some("https://a.go.kr/view.do?menu=3&nttId=999&page=1".to_string());
        assert_eq!(item.effective_docid(), "999");
    }

    #[test]
    fn test_docid_hash_is_stable() {
        let mut item = ListItem::new("1", "title");
        item.detail_url = Some("https://a.go.kr/board/view/77".to_string());
        let first = item.effective_docid();
        assert!(first.starts_with('h'));
        assert_eq!(first.len(), 17);
        assert_eq!(first, item.effective_docid());

        let bare = ListItem::new("2", "other");
        assert_ne!(bare.effective_docid(), first);
    }

    #[test]
    fn test_cutoff_is_exclusive() {
        let range = DateRange::new(Some(date("2024-03-10")), Some(date("2024-03-20")));
        let on_cutoff = date("2024-03-10").and_hms_opt(0, 0, 0).unwrap();
        let before = date("2024-03-09").and_hms_opt(23, 59, 0).unwrap();
        let after_end = date("2024-03-21").and_hms_opt(0, 0, 0).unwrap();

        assert!(!range.is_before_cutoff(on_cutoff));
        assert!(range.is_before_cutoff(before));
        assert!(range.is_after_end(after_end));
        assert!(!range.is_after_end(on_cutoff));
    }

    #[test]
    fn test_meeting_info_empty() {
        assert!(MeetingInfo::default().is_empty());
        let info = MeetingInfo {
            session: Some("제301회".into()),
            ..Default::default()
        };
        assert!(!info.is_empty());
    }
}
