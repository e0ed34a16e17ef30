//! Periodic copies of a site's output during long runs.

use chrono::Utc;
use tracing::info;

use super::jsonl::read_records;
use super::markdown::render_digest;
use super::SitePaths;
use crate::config::SiteDescriptor;
use crate::error::Result;
use crate::repository::write_atomic;

/// Copy the JSONL file and a fresh digest to
/// `snapshots/<code>.p<NNNN>.jsonl|.md`.
pub fn write_snapshot(site: &SiteDescriptor, paths: &SitePaths, page: u32) -> Result<()> {
    std::fs::create_dir_all(&paths.snapshots)?;

    let jsonl_target = paths.snapshot(page, "jsonl");
    match std::fs::read(&paths.jsonl) {
        Ok(bytes) => write_atomic(&jsonl_target, &bytes)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => write_atomic(&jsonl_target, b"")?,
        Err(e) => return Err(e.into()),
    }

    let records = read_records(&paths.jsonl)?;
    let digest = render_digest(site, &records, Utc::now());
    write_atomic(&paths.snapshot(page, "md"), digest.as_bytes())?;

    info!("{}: snapshot at page {} ({} records)", site.code, page, records.len());
    Ok(())
}
