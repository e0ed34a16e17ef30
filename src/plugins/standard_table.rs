//! Generic `<table>` board.

use tracing::warn;

use super::detail::{extract_attachments, extract_content, find_label, label_pairs};
use super::table::{
    cell_has_attachment, element_text, first_link, parse_board_table, row_has_attachment_icon,
    Column, ColumnMap, TableRow,
};
use super::{resolve_link, template_params, BoardPlugin};
use crate::config::SiteDescriptor;
use crate::error::Result;
use crate::models::{DateRange, EnrichedRecord, ListItem};
use crate::scrapers::Document;
use crate::utils::dates::extract_date;
use crate::utils::text::{extract_views, non_empty};

pub const NAME: &str = "standard_table_v1";

pub(crate) const MANAGER_LABELS: &[&str] = &["담당자", "작성자"];
pub(crate) const CONTACT_LABELS: &[&str] = &["연락처", "전화", "문의", "TEL", "Tel"];

pub struct StandardTable {
    site: SiteDescriptor,
}

impl StandardTable {
    pub fn new(site: &SiteDescriptor) -> Self {
        Self { site: site.clone() }
    }
}

/// Convert a table row into a list item using the canonical columns.
pub(crate) fn row_to_item(site: &SiteDescriptor, row: &TableRow<'_>, columns: &ColumnMap) -> ListItem {
    let number = row.text(columns, Column::Number).unwrap_or_default();

    let title_cell = row
        .cell(columns, Column::Title)
        .or_else(|| row.cells.get(1).copied());
    let title = title_cell.map(element_text).unwrap_or_default();

    let (href, onclick) = title_cell
        .and_then(first_link)
        .or_else(|| first_link(row.row))
        .unwrap_or((None, row.row.value().attr("onclick").map(str::to_string)));
    let (detail_url, docid) = resolve_link(site, href.as_deref(), onclick.as_deref());

    let (post_date, post_date_str) = match row.text(columns, Column::Date) {
        Some(text) => {
            let (parsed, matched) = extract_date(&text, site.date_format.as_deref());
            if parsed.is_none() && !text.is_empty() && text != "-" {
                warn!("{}: unparseable date cell '{}'", site.code, text);
            }
            (parsed, matched)
        }
        None => (None, String::new()),
    };

    let has_attachment = match row.cell(columns, Column::Attachment) {
        Some(cell) => cell_has_attachment(cell),
        None => row_has_attachment_icon(row.row),
    };

    ListItem {
        pinned: row.has_notice_class(),
        number,
        title,
        department: row.text(columns, Column::Department).and_then(|t| non_empty(&t)),
        post_date,
        post_date_str,
        views: row.text(columns, Column::Views).map(|t| extract_views(&t)),
        has_attachment,
        detail_url,
        docid,
        meeting: None,
    }
}

/// Parse list rows with the standard column mapping.
pub(crate) fn parse_table_list(site: &SiteDescriptor, doc: &Document) -> Vec<ListItem> {
    let html = doc.html();
    let Some(table) = parse_board_table(&html) else {
        return Vec::new();
    };
    table
        .rows
        .iter()
        .map(|row| row_to_item(site, row, &table.columns))
        .filter(|item| !item.title.is_empty())
        .collect()
}

/// Body, attachments and contact fields shared by the table boards.
pub(crate) fn enrich_common(doc: &Document, item: ListItem) -> (EnrichedRecord, Vec<(String, String)>) {
    let html = doc.html();
    let pairs = label_pairs(&html);

    let mut record = EnrichedRecord::from_item(item);
    if let Some(content) = extract_content(&html) {
        record.set_content(content.text);
        record.html_content = Some(content.html);
    }
    record.attachments = extract_attachments(&html, &doc.url);
    record.manager = find_label(&pairs, MANAGER_LABELS);
    record.contact = find_label(&pairs, CONTACT_LABELS);

    if record.item.has_attachment && record.attachments.is_empty() {
        warn!("No attachment links found on {}", doc.url);
    }
    (record, pairs)
}

impl BoardPlugin for StandardTable {
    fn name(&self) -> &str {
        NAME
    }

    fn build_params(&self, page: u32, range: &DateRange) -> Vec<(String, String)> {
        let range = self.server_date_filter().apply(range);
        template_params(&self.site, page, &range, "pageIndex")
    }

    fn parse_list(&self, doc: &Document) -> Result<Vec<ListItem>> {
        Ok(parse_table_list(&self.site, doc))
    }

    fn parse_detail(&self, doc: &Document, item: ListItem) -> Result<EnrichedRecord> {
        let (record, _) = enrich_common(doc, item);
        Ok(record)
    }
}
