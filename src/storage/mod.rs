//! Output files under the output directory.
//!
//! Per site: `<code>.jsonl`, `<code>.md`, `<code>.checkpoint.json`,
//! `<code>.docids` and periodic snapshots. Per run: `_progress.json`,
//! `_summary.json` and `_errors.log`.

pub mod jsonl;
pub mod markdown;
pub mod progress;
pub mod snapshot;

use std::path::{Path, PathBuf};

pub use jsonl::{read_records, JsonlWriter};
pub use markdown::{render_digest, write_digest};
pub use progress::{ErrorLog, ProgressFile, ProgressSnapshot, RunSummary, RunTotals, SiteProgress};
pub use snapshot::write_snapshot;

pub const PROGRESS_FILE: &str = "_progress.json";
pub const SUMMARY_FILE: &str = "_summary.json";
pub const ERRORS_FILE: &str = "_errors.log";
pub const SNAPSHOT_DIR: &str = "snapshots";

/// File locations for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePaths {
    pub code: String,
    pub jsonl: PathBuf,
    pub digest: PathBuf,
    pub checkpoint: PathBuf,
    pub docids: PathBuf,
    pub lock: PathBuf,
    pub snapshots: PathBuf,
}

impl SitePaths {
    pub fn new(output_dir: &Path, code: &str) -> Self {
        Self {
            code: code.to_string(),
            jsonl: output_dir.join(format!("{}.jsonl", code)),
            digest: output_dir.join(format!("{}.md", code)),
            checkpoint: output_dir.join(format!("{}.checkpoint.json", code)),
            docids: output_dir.join(format!("{}.docids", code)),
            lock: output_dir.join(format!("{}.checkpoint.json.lock", code)),
            snapshots: output_dir.join(SNAPSHOT_DIR),
        }
    }

    /// `snapshots/<code>.p<NNNN>.<ext>`
    pub fn snapshot(&self, page: u32, ext: &str) -> PathBuf {
        self.snapshots.join(format!("{}.p{:04}.{}", self.code, page, ext))
    }
}
