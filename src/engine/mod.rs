//! Per-site harvest state machine.
//!
//! The engine walks a board's list pages in order, decides per row whether
//! to stop, skip or emit, enriches new rows from their detail page and
//! persists them. A checkpoint is written after every fully processed list
//! page so an interrupted run resumes at the next page; the DOCID index
//! keeps a resumed run from writing any row twice.

mod decision;

pub use decision::{decide, ItemDecision};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{Settings, SiteDescriptor};
use crate::error::{HarvestError, Result};
use crate::models::{DateRange, EnrichedRecord, ListItem, OutputRecord, SiteReport, SiteStatus, StopReason};
use crate::orchestrator::Shutdown;
use crate::plugins::BoardPlugin;
use crate::repository::{CheckpointStore, DocidIndex, SiteLock};
use crate::scrapers::{build_url, Fetcher, Pacer};
use crate::storage::{write_digest, write_snapshot, JsonlWriter, SitePaths};

/// Engine knobs taken from [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_pages: u32,
    pub range: DateRange,
    pub snapshot_every: u32,
    pub request_delay: Duration,
    pub page_delay: Duration,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_pages: settings.max_pages,
            range: settings.range,
            snapshot_every: settings.snapshot_every,
            request_delay: settings.request_delay,
            page_delay: settings.page_delay,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Engine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initial,
    Paging { page: u32 },
    Terminating(StopReason),
    Completed,
    Failed,
}

/// Result of processing one list page.
enum PageOutcome {
    /// Every row handled; continue with the next page.
    Done,
    /// Rows handled up to a stop condition.
    Stopped(StopReason),
}

/// Harvests one site with one fetcher.
pub struct Engine<F: Fetcher> {
    site: SiteDescriptor,
    plugin: Arc<dyn BoardPlugin>,
    fetcher: F,
    paths: SitePaths,
    config: EngineConfig,
    shutdown: Shutdown,
    state: EngineState,
    report: SiteReport,
}

/// Files held open for the duration of a walk.
struct SiteFiles {
    checkpoint: CheckpointStore,
    index: DocidIndex,
    writer: JsonlWriter,
    cumulative: u64,
}

impl<F: Fetcher> Engine<F> {
    pub fn new(
        site: SiteDescriptor,
        plugin: Arc<dyn BoardPlugin>,
        fetcher: F,
        output_dir: &Path,
        config: EngineConfig,
    ) -> Self {
        let paths = SitePaths::new(output_dir, &site.code);
        let report = SiteReport::new(&site.code, SiteStatus::Pending);
        Self {
            site,
            plugin,
            fetcher,
            paths,
            config,
            shutdown: Shutdown::never(),
            state: EngineState::Initial,
            report,
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run the site to a terminal state. Never fails: errors end up in the
    /// returned report.
    pub async fn run(mut self) -> SiteReport {
        let started = Instant::now();
        self.report.status = SiteStatus::Running;

        if let Err(err) = self.walk().await {
            error!("{}: {}", self.site.code, err);
            // records already written stay valid
            self.state = if self.report.items == 0 {
                EngineState::Failed
            } else {
                EngineState::Terminating(StopReason::FetchFailed)
            };
            self.record_error(err);
        }

        self.report.status = match self.state {
            EngineState::Completed => SiteStatus::Completed,
            EngineState::Failed => SiteStatus::Failed,
            _ if self.report.status == SiteStatus::Skipped => SiteStatus::Skipped,
            _ => SiteStatus::Terminated,
        };
        self.report.elapsed = started.elapsed();
        self.report
    }

    fn record_error(&mut self, err: HarvestError) {
        self.report.error_kind = Some(err.kind().to_string());
        self.report.error = Some(err.to_string());
    }

    async fn walk(&mut self) -> Result<()> {
        let _lock = SiteLock::acquire(&self.paths.lock, &self.site.code)?;

        let mut checkpoint = CheckpointStore::new(&self.paths.checkpoint, &self.site.code);
        checkpoint.load()?;
        if checkpoint.is_completed() {
            info!("{}: already completed, skipping", self.site.code);
            self.report.status = SiteStatus::Skipped;
            self.report.last_page = checkpoint.current().map(|c| c.last_page).unwrap_or(0);
            self.report.bytes = file_size(&self.paths.jsonl);
            return Ok(());
        }

        let start_page = match checkpoint.current() {
            Some(cp) if checkpoint.can_resume() => {
                info!("{}: resuming after page {}", self.site.code, cp.last_page);
                cp.last_page + 1
            }
            _ => 1,
        };
        self.report.last_page = start_page.saturating_sub(1);

        let list_url = self.site.list_url()?;
        let index = DocidIndex::open(&self.paths.docids)?;
        // the index and the checkpoint are created and reset together
        let cumulative = index.len() as u64;
        let mut files = SiteFiles {
            checkpoint,
            index,
            writer: JsonlWriter::open(&self.paths.jsonl)?,
            cumulative,
        };
        let mut pacer = Pacer::new(self.config.request_delay, self.config.page_delay);

        let mut page = start_page;
        let reason = loop {
            if self.shutdown.is_requested() {
                break StopReason::Cancelled;
            }
            if page > self.config.max_pages {
                warn!("{}: page cap {} reached", self.site.code, self.config.max_pages);
                break StopReason::PageCap;
            }

            pacer.before_page().await;
            let params = self.plugin.build_params(page, &self.config.range);
            let page_url = build_url(list_url.as_str(), &params)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| list_url.to_string());
            let items = match self.fetch_list(list_url.as_str(), &params).await {
                Ok(items) => items,
                Err(err) => {
                    warn!("{}: page {} failed: {}", self.site.code, page, err);
                    self.record_error(err);
                    break StopReason::FetchFailed;
                }
            };
            self.state = EngineState::Paging { page };
            self.report.pages += 1;

            if items.is_empty() {
                info!("{}: page {} is empty", self.site.code, page);
                break StopReason::EmptyPage;
            }

            let outcome = self.process_page(&mut files, &mut pacer, items).await?;
            if let PageOutcome::Stopped(StopReason::Cancelled) = outcome {
                // unfinished page: keep the previous page as the resume point
                files
                    .checkpoint
                    .save(page.saturating_sub(1), &page_url, files.cumulative)?;
                break StopReason::Cancelled;
            }

            files.checkpoint.save(page, &page_url, files.cumulative)?;
            self.report.last_page = page;
            info!(
                "{}: page {} done ({} new, {} total)",
                self.site.code, page, self.report.items, files.cumulative
            );

            if self.config.snapshot_every > 0 && page % self.config.snapshot_every == 0 {
                if let Err(e) = write_snapshot(&self.site, &self.paths, page) {
                    warn!("{}: snapshot failed: {}", self.site.code, e);
                }
            }

            if let PageOutcome::Stopped(reason) = outcome {
                break reason;
            }
            page += 1;
        };

        self.state = EngineState::Terminating(reason);
        self.finish(&mut files, reason)
    }

    /// Fetch and parse a list page. Parse failures end the walk like a
    /// failed fetch.
    async fn fetch_list(&mut self, url: &str, params: &[(String, String)]) -> Result<Vec<ListItem>> {
        let doc = self.fetcher.fetch(url, params).await?;
        debug!("{}: list {} ({} bytes)", self.site.code, doc.url, doc.len());
        self.plugin.parse_list(&doc)
    }

    async fn process_page(
        &mut self,
        files: &mut SiteFiles,
        pacer: &mut Pacer,
        items: Vec<ListItem>,
    ) -> Result<PageOutcome> {
        for item in items {
            if self.shutdown.is_requested() {
                return Ok(PageOutcome::Stopped(StopReason::Cancelled));
            }

            let decision = decide(
                &self.site,
                self.plugin.as_ref(),
                &self.config.range,
                &files.index,
                &item,
            );
            match decision {
                ItemDecision::StopAtCutoff => {
                    info!(
                        "{}: '{}' ({}) is older than the cutoff",
                        self.site.code, item.title, item.post_date_str
                    );
                    return Ok(PageOutcome::Stopped(StopReason::CutoffReached));
                }
                ItemDecision::Filtered | ItemDecision::AfterEnd => {
                    debug!("{}: skipping '{}' ({:?})", self.site.code, item.title, decision);
                }
                ItemDecision::AlreadySeen => {
                    self.report.already_seen += 1;
                }
                ItemDecision::Emit { docid } => {
                    let record = self.enrich(pacer, item).await;
                    let output = OutputRecord::new(&self.site, record, docid.clone(), Utc::now());
                    files.writer.write(&output)?;
                    files.index.add(&docid)?;
                    files.cumulative += 1;
                    self.report.items += 1;
                }
            }
        }
        Ok(PageOutcome::Done)
    }

    /// Detail enrichment. Any failure degrades to the bare list row.
    async fn enrich(&mut self, pacer: &mut Pacer, item: ListItem) -> EnrichedRecord {
        let Some(url) = item.detail_url.clone() else {
            return EnrichedRecord::from_item(item);
        };

        pacer.before_detail().await;
        let doc = match self.fetcher.fetch(&url, &[]).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("{}: detail {} failed: {}", self.site.code, url, e);
                if let Some(wait) = e.server_wait() {
                    pacer.hold_off(wait);
                }
                return EnrichedRecord::from_item(item);
            }
        };

        match self.plugin.parse_detail(&doc, item.clone()) {
            Ok(record) => record,
            Err(e) => {
                warn!("{}: could not parse detail {}: {}", self.site.code, url, e);
                EnrichedRecord::from_item(item)
            }
        }
    }

    /// Terminal transition: checkpoint, digest, report.
    fn finish(&mut self, files: &mut SiteFiles, reason: StopReason) -> Result<()> {
        self.report.stop_reason = Some(reason);

        match reason {
            StopReason::CutoffReached | StopReason::EmptyPage => {
                files.checkpoint.mark_completed()?;
                self.state = EngineState::Completed;
            }
            StopReason::PageCap => {
                self.report.truncated = true;
            }
            StopReason::FetchFailed => {
                if files.cumulative == 0 {
                    self.state = EngineState::Failed;
                }
            }
            StopReason::Cancelled => {}
        }

        if let Err(e) = write_digest(&self.site, &self.paths.jsonl, &self.paths.digest) {
            warn!("{}: digest not written: {}", self.site.code, e);
        }
        self.report.bytes = files.writer.size().unwrap_or(0);

        info!(
            "{}: {:?} after page {} ({} new records)",
            self.site.code, reason, self.report.last_page, self.report.items
        );
        Ok(())
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Clear a site's checkpoint and DOCID index. The existing JSONL file is
/// moved aside to `<code>.jsonl.prev` so a fresh harvest does not append
/// duplicates to it.
pub fn reset_site(output_dir: &Path, code: &str) -> Result<()> {
    let paths = SitePaths::new(output_dir, code);
    let _lock = SiteLock::acquire(&paths.lock, code)?;

    CheckpointStore::new(&paths.checkpoint, code).clear()?;
    DocidIndex::remove(&paths.docids)?;
    if paths.jsonl.exists() {
        let prev = paths.jsonl.with_extension("jsonl.prev");
        std::fs::rename(&paths.jsonl, &prev)?;
        info!("{}: previous records moved to {}", code, prev.display());
    }
    if paths.digest.exists() {
        std::fs::remove_file(&paths.digest)?;
    }
    Ok(())
}
