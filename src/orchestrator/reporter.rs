//! Console lines and run-level files, shared by every worker.

use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{HarvestError, Result};
use crate::models::{SiteReport, SiteStatus, StopReason};
use crate::storage::{ErrorLog, ProgressFile, SiteProgress};
use crate::utils::{format_elapsed, format_size};

/// Icon shown in front of a site line.
pub fn status_icon(status: SiteStatus) -> &'static str {
    match status {
        SiteStatus::Completed => "✅",
        SiteStatus::Terminated => "⚠️",
        SiteStatus::Failed => "❌",
        SiteStatus::Skipped => "⏭️",
        SiteStatus::Pending | SiteStatus::Running => "…",
    }
}

/// One-line outcome of a site, e.g.
/// `✅ seoul completed: 30 records, 3 pages, 12.4 KB in 8.1s`.
pub fn format_site_line(report: &SiteReport) -> String {
    let status = match report.status {
        SiteStatus::Completed => style(report.status.as_str()).green(),
        SiteStatus::Terminated => style(report.status.as_str()).yellow(),
        SiteStatus::Failed => style(report.status.as_str()).red(),
        _ => style(report.status.as_str()).dim(),
    };

    let mut line = format!(
        "{} {} {}: {} records, {} pages, {} in {}",
        status_icon(report.status),
        style(&report.code).bold(),
        status,
        report.items,
        report.pages,
        format_size(report.bytes),
        format_elapsed(report.elapsed)
    );
    if report.already_seen > 0 {
        line.push_str(&format!(" ({} already seen)", report.already_seen));
    }
    if report.truncated {
        line.push_str(&format!(
            " {}",
            style(format!("truncated at page {}", report.last_page)).yellow()
        ));
    }
    if report.stop_reason == Some(StopReason::Cancelled) {
        line.push_str(" [interrupted]");
    }
    if let Some(error) = report.error.as_deref() {
        line.push_str(&format!(" - {}", error));
    }
    line
}

struct ReporterState {
    progress: ProgressFile,
    errors: ErrorLog,
    bar: Option<ProgressBar>,
}

/// Serialises stdout, `_progress.json` and `_errors.log` behind one lock.
pub struct Reporter {
    state: Mutex<ReporterState>,
}

impl Reporter {
    pub fn new<'a>(
        output_dir: &Path,
        codes: impl IntoIterator<Item = &'a str>,
        show_bar: bool,
    ) -> Result<Self> {
        let progress = ProgressFile::create(output_dir, codes)?;
        let bar = show_bar.then(|| {
            let bar = ProgressBar::new(progress.snapshot().total_sites as u64);
            if let Ok(bar_style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sites {msg}",
            ) {
                bar.set_style(bar_style.progress_chars("#>-"));
            }
            bar
        });

        Ok(Self {
            state: Mutex::new(ReporterState {
                progress,
                errors: ErrorLog::new(output_dir),
                bar,
            }),
        })
    }

    pub async fn started(&self, code: &str) {
        let mut state = self.state.lock().await;
        if let Some(bar) = &state.bar {
            bar.set_message(code.to_string());
        }
        if let Err(e) = state.progress.update(code, SiteProgress::status(SiteStatus::Running)) {
            warn!("Could not update progress file: {}", e);
        }
    }

    /// Record a finished site. `error` carries the typed error for sites
    /// that failed outside the engine.
    pub async fn finished(&self, report: &SiteReport, error: Option<&HarvestError>) {
        let mut state = self.state.lock().await;

        let line = format_site_line(report);
        match &state.bar {
            Some(bar) => {
                bar.println(line);
                bar.inc(1);
            }
            None => println!("{}", line),
        }

        if let Err(e) = state.progress.update(&report.code, SiteProgress::from_report(report)) {
            warn!("Could not update progress file: {}", e);
        }

        let logged = match error {
            Some(err) => state.errors.append(&report.code, err),
            None => state.errors.append_report(report),
        };
        if let Err(e) = logged {
            warn!("Could not append to {}: {}", state.errors.path().display(), e);
        }
    }

    pub async fn close(&self) {
        let state = self.state.lock().await;
        if let Some(bar) = &state.bar {
            bar.finish_and_clear();
        }
    }
}
