//! Human-readable Markdown digest rendered from a site's records.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::jsonl::read_records;
use crate::config::SiteDescriptor;
use crate::error::Result;
use crate::models::OutputRecord;
use crate::repository::write_atomic;

/// Render the digest: a header, then one `##` section per record.
pub fn render_digest(site: &SiteDescriptor, records: &[OutputRecord], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} ({})", site.display_name, site.code);
    let _ = writeln!(out);
    let _ = writeln!(out, "- Harvested: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "- Records: {}", records.len());

    for record in records {
        let _ = writeln!(out);
        let title = if record.title.trim().is_empty() {
            "(untitled)"
        } else {
            record.title.as_str()
        };
        let _ = writeln!(out, "## {}", title.replace('\n', " "));
        let _ = writeln!(out);

        let date = record.display_date();
        if !date.is_empty() {
            let _ = writeln!(out, "- Date: {}", date);
        }
        if let Some(kind) = record.meeting_type.as_deref() {
            let _ = writeln!(out, "- Meeting: {}", kind);
        }
        if let Some(url) = record.detail_url.as_deref() {
            let _ = writeln!(out, "- URL: <{}>", url);
        }
        if !record.cells.attachments.is_empty() {
            let _ = writeln!(out, "- Attachments: {}", record.cells.attachments.len());
        }
    }
    out
}

/// Re-render `<code>.md` from the whole JSONL file.
pub fn write_digest(site: &SiteDescriptor, jsonl: &Path, digest: &Path) -> Result<usize> {
    let records = read_records(jsonl)?;
    let text = render_digest(site, &records, Utc::now());
    write_atomic(digest, text.as_bytes())?;
    Ok(records.len())
}
