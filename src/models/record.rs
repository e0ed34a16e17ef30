//! Enriched records and their persisted JSONL shape.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::ListItem;
use crate::config::SiteDescriptor;
use crate::utils::text::truncate_chars;

/// Maximum characters kept in `content_preview`.
pub const PREVIEW_CHARS: usize = 500;

/// A list item after detail-page enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub item: ListItem,
    pub forest_office: Option<String>,
    pub manager: Option<String>,
    pub contact: Option<String>,
    pub content_preview: Option<String>,
    pub attachments: Vec<String>,
    pub full_content: Option<String>,
    pub html_content: Option<String>,
}

impl EnrichedRecord {
    /// Wrap a bare list row (detail missing or failed).
    pub fn from_item(item: ListItem) -> Self {
        Self {
            item,
            ..Default::default()
        }
    }

    /// Set the full text and derive the preview from it.
    pub fn set_content(&mut self, text: String) {
        if text.trim().is_empty() {
            self.full_content = None;
            self.content_preview = None;
            return;
        }
        self.content_preview = Some(truncate_chars(&text, PREVIEW_CHARS));
        self.full_content = Some(text);
    }
}

/// Column values carried alongside the canonical JSONL keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordCells {
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_date: Option<NaiveDateTime>,
    pub post_date_str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    pub has_attachment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forest_office: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// One JSONL line. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub code: String,
    pub council: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_type: Option<String>,
    pub title: String,
    pub detail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docid: Option<String>,
    pub cells: RecordCells,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl OutputRecord {
    pub fn new(
        site: &SiteDescriptor,
        record: EnrichedRecord,
        docid: String,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let EnrichedRecord {
            item,
            forest_office,
            manager,
            contact,
            content_preview,
            attachments,
            full_content,
            html_content,
        } = record;
        let meeting = item.meeting.unwrap_or_default();

        Self {
            code: site.code.clone(),
            council: site.display_name.clone(),
            session: meeting.session,
            meeting_date: meeting.meeting_date,
            meeting_order: meeting.meeting_order,
            meeting_type: meeting.meeting_type,
            title: item.title,
            detail_url: item.detail_url,
            docid: Some(docid),
            cells: RecordCells {
                number: item.number,
                department: item.department,
                post_date: item.post_date,
                post_date_str: item.post_date_str,
                views: item.views,
                has_attachment: item.has_attachment,
                forest_office,
                manager,
                contact,
                content_preview,
                attachments,
            },
            full_content,
            html_content,
            fetched_at,
        }
    }

    /// Date shown in the digest: post date, else meeting date, else raw text.
    pub fn display_date(&self) -> String {
        if let Some(d) = self.cells.post_date {
            return d.format("%Y-%m-%d").to_string();
        }
        if let Some(d) = self.meeting_date {
            return d.format("%Y-%m-%d").to_string();
        }
        self.cells.post_date_str.clone()
    }
}
