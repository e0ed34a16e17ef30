//! Run-level files: `_progress.json`, `_summary.json` and `_errors.log`.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ERRORS_FILE, PROGRESS_FILE, SUMMARY_FILE};
use crate::error::{HarvestError, Result};
use crate::models::{SiteReport, SiteStatus};
use crate::repository::write_atomic;

/// Latest known state of one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProgress {
    pub status: SiteStatus,
    pub pages: u32,
    pub items: u64,
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SiteProgress {
    pub fn status(status: SiteStatus) -> Self {
        Self {
            status,
            pages: 0,
            items: 0,
            bytes: 0,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn from_report(report: &SiteReport) -> Self {
        Self {
            status: report.status,
            pages: report.pages,
            items: report.items,
            bytes: report.bytes,
            error: report.error.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Whole-file contents of `_progress.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_sites: usize,
    pub finished_sites: usize,
    pub sites: BTreeMap<String, SiteProgress>,
}

/// Owner of `_progress.json`. Every update rewrites the file atomically so
/// readers can parse it at any moment.
pub struct ProgressFile {
    path: PathBuf,
    snapshot: ProgressSnapshot,
}

impl ProgressFile {
    pub fn create<'a>(output_dir: &Path, codes: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let now = Utc::now();
        let sites: BTreeMap<String, SiteProgress> = codes
            .into_iter()
            .map(|code| (code.to_string(), SiteProgress::status(SiteStatus::Pending)))
            .collect();
        let mut file = Self {
            path: output_dir.join(PROGRESS_FILE),
            snapshot: ProgressSnapshot {
                started_at: now,
                updated_at: now,
                total_sites: sites.len(),
                finished_sites: 0,
                sites,
            },
        };
        file.flush()?;
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    pub fn update(&mut self, code: &str, progress: SiteProgress) -> Result<()> {
        self.snapshot.sites.insert(code.to_string(), progress);
        self.snapshot.total_sites = self.snapshot.sites.len();
        self.snapshot.finished_sites = self
            .snapshot
            .sites
            .values()
            .filter(|p| p.status.is_finished())
            .count();
        self.snapshot.updated_at = Utc::now();
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.snapshot)?;
        write_atomic(&self.path, &json)
    }
}

/// Totals across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub sites: usize,
    pub completed: usize,
    pub terminated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub items: u64,
    pub bytes: u64,
    pub truncated: usize,
}

/// Contents of `_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub interrupted: bool,
    pub totals: RunTotals,
    pub failing_sites: Vec<String>,
    pub sites: Vec<SiteReport>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>, mut sites: Vec<SiteReport>, interrupted: bool) -> Self {
        sites.sort_by(|a, b| a.code.cmp(&b.code));

        let mut totals = RunTotals {
            sites: sites.len(),
            ..Default::default()
        };
        for report in &sites {
            match report.status {
                SiteStatus::Completed => totals.completed += 1,
                SiteStatus::Terminated => totals.terminated += 1,
                SiteStatus::Failed => totals.failed += 1,
                SiteStatus::Skipped => totals.skipped += 1,
                SiteStatus::Pending | SiteStatus::Running => {}
            }
            totals.items += report.items;
            totals.bytes += report.bytes;
            if report.truncated {
                totals.truncated += 1;
            }
        }
        let failing_sites = sites
            .iter()
            .filter(|r| r.status == SiteStatus::Failed)
            .map(|r| r.code.clone())
            .collect();

        Self {
            started_at,
            finished_at: Utc::now(),
            interrupted,
            totals,
            failing_sites,
            sites,
        }
    }

    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(SUMMARY_FILE);
        write_atomic(&path, &serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }
}

/// Append-only `_errors.log`.
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            path: output_dir.join(ERRORS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an error with its full source chain.
    pub fn append(&self, code: &str, err: &HarvestError) -> Result<()> {
        let mut entry = format!(
            "[{}] {} {}: {}\n",
            Utc::now().to_rfc3339(),
            code,
            err.kind(),
            err
        );
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            entry.push_str(&format!("    caused by: {}\n", cause));
            source = cause.source();
        }
        entry.push_str(&format!("    debug: {:?}\n", err));
        self.write_entry(&entry)
    }

    /// Append the error a site run ended with, if any.
    pub fn append_report(&self, report: &SiteReport) -> Result<()> {
        let Some(message) = report.error.as_deref() else {
            return Ok(());
        };
        let entry = format!(
            "[{}] {} {}: {}\n    status: {} after page {} ({} records)\n",
            Utc::now().to_rfc3339(),
            report.code,
            report.error_kind.as_deref().unwrap_or("unknown"),
            message,
            report.status.as_str(),
            report.last_page,
            report.items
        );
        self.write_entry(&entry)
    }

    fn write_entry(&self, entry: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(entry.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_file_always_parses() {
        let dir = tempfile::tempdir().unwrap();
        let mut progress = ProgressFile::create(dir.path(), ["a", "b"]).unwrap();

        let read = |p: &Path| -> ProgressSnapshot {
            serde_json::from_slice(&std::fs::read(p).unwrap()).unwrap()
        };
        assert_eq!(read(progress.path()).finished_sites, 0);

        progress.update("a", SiteProgress::status(SiteStatus::Running)).unwrap();
        let mut done = SiteProgress::status(SiteStatus::Completed);
        done.items = 12;
        progress.update("b", done).unwrap();

        let snap = read(progress.path());
        assert_eq!(snap.total_sites, 2);
        assert_eq!(snap.finished_sites, 1);
        assert_eq!(snap.sites["b"].items, 12);
        assert_eq!(snap.sites["a"].status, SiteStatus::Running);
    }

    #[test]
    fn test_summary_totals() {
        let dir = tempfile::tempdir().unwrap();
        let mut ok = SiteReport::new("ok", SiteStatus::Completed);
        ok.items = 30;
        ok.bytes = 1000;
        let mut capped = SiteReport::new("capped", SiteStatus::Terminated);
        capped.truncated = true;
        let bad = SiteReport::failed("bad", &HarvestError::PluginNotFound("bad".into()));

        let summary = RunSummary::new(Utc::now(), vec![ok, capped, bad], false);
        assert_eq!(summary.totals.completed, 1);
        assert_eq!(summary.totals.terminated, 1);
        assert_eq!(summary.totals.failed, 1);
        assert_eq!(summary.totals.truncated, 1);
        assert_eq!(summary.totals.items, 30);
        assert_eq!(summary.failing_sites, vec!["bad".to_string()]);
        assert_eq!(summary.sites[0].code, "bad");

        let path = summary.write(dir.path()).unwrap();
        let parsed: RunSummary = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(parsed.totals, summary.totals);
    }

    #[test]
    fn test_error_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path());
        log.append("a", &HarvestError::ClientError { status: 404, url: "https://x/1".into() })
            .unwrap();
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        log.append("b", &HarvestError::Io(io)).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("a client_error: HTTP 404 for https://x/1"));
        assert!(text.contains("b io:"));
        assert_eq!(text.matches("debug:").count(), 2);
    }

    #[test]
    fn test_error_log_report_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path());
        log.append_report(&SiteReport::new("quiet", SiteStatus::Completed)).unwrap();
        assert!(!log.path().exists());

        let mut report = SiteReport::new("gyeonggi", SiteStatus::Terminated);
        report.error_kind = Some("unreachable".into());
        report.error = Some("Unreachable after 3 attempts: https://x/list".into());
        report.last_page = 4;
        log.append_report(&report).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("gyeonggi unreachable: Unreachable after 3 attempts"));
        assert!(text.contains("status: terminated after page 4"));
    }
}
