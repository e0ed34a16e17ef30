//! Council meeting minutes boards.
//!
//! Rows carry session, meeting order, meeting type and meeting date columns.
//! Many of these boards open a minute through an `onclick` handler or a
//! `data-*` attribute rather than a link, so the docid is taken from there
//! and the detail URL is built from the site's `detail_template`.

use scraper::ElementRef;

use super::detail::find_label;
use super::standard_table::{enrich_common, row_to_item};
use super::table::{parse_board_table, Column, ColumnMap, TableRow};
use super::{template_params, BoardPlugin};
use crate::config::SiteDescriptor;
use crate::error::Result;
use crate::models::{DateRange, EnrichedRecord, ListItem, MeetingInfo};
use crate::scrapers::Document;
use crate::utils::dates::normalize_date;
use crate::utils::text::{non_empty, NOTICE_MARKER};

pub const NAME: &str = "council_minutes_v1";

const DATA_ID_ATTRS: &[&str] = &["data-id", "data-idx", "data-seq", "data-key", "data-no"];

pub struct CouncilMinutes {
    site: SiteDescriptor,
}

impl CouncilMinutes {
    pub fn new(site: &SiteDescriptor) -> Self {
        Self { site: site.clone() }
    }

    fn row_to_minute(&self, row: &TableRow<'_>, columns: &ColumnMap) -> ListItem {
        let mut item = row_to_item(&self.site, row, columns);

        let meeting = MeetingInfo {
            session: row.text(columns, Column::Session).and_then(|t| non_empty(&t)),
            meeting_order: row.text(columns, Column::MeetingOrder).and_then(|t| non_empty(&t)),
            meeting_type: row.text(columns, Column::MeetingType).and_then(|t| non_empty(&t)),
            meeting_date: item.post_date.map(|d| d.date()),
        };

        if columns.get(Column::Title).is_none() {
            item.title = [&meeting.session, &meeting.meeting_order, &meeting.meeting_type]
                .into_iter()
                .flatten()
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
        }

        if item.docid.is_none() {
            if let Some(id) = data_id(row.row) {
                if item.detail_url.is_none() {
                    item.detail_url = self.site.detail_from_args(std::slice::from_ref(&id));
                }
                item.docid = Some(id);
            }
        }

        if !meeting.is_empty() {
            item.meeting = Some(meeting);
        }
        item
    }
}

/// First `data-*` id attribute on the row or any element inside it.
fn data_id(row: ElementRef<'_>) -> Option<String> {
    row.descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|el| {
            DATA_ID_ATTRS
                .iter()
                .find_map(|attr| el.value().attr(attr))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
}

impl BoardPlugin for CouncilMinutes {
    fn name(&self) -> &str {
        NAME
    }

    fn build_params(&self, page: u32, range: &DateRange) -> Vec<(String, String)> {
        let range = self.server_date_filter().apply(range);
        template_params(&self.site, page, &range, "pageIndex")
    }

    /// Minutes lists rarely have a number column, so a blank number does
    /// not mark a notice here.
    fn is_pinned(&self, item: &ListItem) -> bool {
        item.pinned || item.number.contains(NOTICE_MARKER)
    }

    fn parse_list(&self, doc: &Document) -> Result<Vec<ListItem>> {
        let html = doc.html();
        let Some(table) = parse_board_table(&html) else {
            return Ok(Vec::new());
        };
        Ok(table
            .rows
            .iter()
            .map(|row| self.row_to_minute(row, &table.columns))
            .filter(|item| !item.title.is_empty())
            .collect())
    }

    fn parse_detail(&self, doc: &Document, item: ListItem) -> Result<EnrichedRecord> {
        let (mut record, pairs) = enrich_common(doc, item);

        // Fill meeting fields the list did not show from the detail header.
        let mut meeting = record.item.meeting.take().unwrap_or_default();
        if meeting.session.is_none() {
            meeting.session = find_label(&pairs, &["회기", "대수"]);
        }
        if meeting.meeting_order.is_none() {
            meeting.meeting_order = find_label(&pairs, &["차수"]);
        }
        if meeting.meeting_type.is_none() {
            meeting.meeting_type = find_label(&pairs, &["회의명", "위원회", "회의구분"]);
        }
        if meeting.meeting_date.is_none() {
            meeting.meeting_date = find_label(&pairs, &["회의일", "개회일", "일시"])
                .and_then(|v| normalize_date(&v))
                .map(|d| d.date());
        }
        if !meeting.is_empty() {
            record.item.meeting = Some(meeting);
        }
        Ok(record)
    }
}
