//! Bounded parallel runner over many sites.
//!
//! Up to `workers` engines run at once, each inside its own tokio task with
//! its own fetcher, checkpoint and DOCID index. The only shared state is the
//! [`Reporter`], which serialises console output and the run-level files.

mod reporter;
mod shutdown;

pub use reporter::{format_site_line, status_icon, Reporter};
pub use shutdown::{channel, install_ctrl_c, Shutdown, ShutdownTrigger, EXIT_INTERRUPTED};

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::{Settings, SiteDescriptor};
use crate::engine::{Engine, EngineConfig};
use crate::error::{HarvestError, Result};
use crate::models::{SiteReport, SiteStatus, StopReason};
use crate::plugins::PluginRegistry;
use crate::scrapers::{Fetcher, HttpClient};
use crate::storage::RunSummary;

/// Exit code when every site failed.
pub const EXIT_ALL_FAILED: i32 = 2;
/// Exit code when at least one site failed.
pub const EXIT_PARTIAL: i32 = 3;

/// Builds the fetcher a site task will own.
pub trait FetcherFactory: Send + Sync {
    fn create(&self, site: &SiteDescriptor, requires_js: bool) -> Result<Box<dyn Fetcher>>;
}

/// Static HTTP client, or the headless browser for JavaScript boards.
pub struct DefaultFetcherFactory {
    settings: Settings,
}

impl DefaultFetcherFactory {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    #[cfg(feature = "browser")]
    fn browser(&self, _site: &SiteDescriptor) -> Result<Box<dyn Fetcher>> {
        use crate::scrapers::browser::BrowserEngineConfig;
        use crate::scrapers::{BrowserFetcher, RetryPolicy};

        Ok(Box::new(BrowserFetcher::new(
            BrowserEngineConfig::from_settings(&self.settings),
            RetryPolicy::with_attempts(self.settings.max_retries),
        )))
    }

    #[cfg(not(feature = "browser"))]
    fn browser(&self, site: &SiteDescriptor) -> Result<Box<dyn Fetcher>> {
        Err(HarvestError::InvalidConfig(format!(
            "{}: board needs a browser but the `browser` feature is disabled",
            site.code
        )))
    }
}

impl FetcherFactory for DefaultFetcherFactory {
    fn create(&self, site: &SiteDescriptor, requires_js: bool) -> Result<Box<dyn Fetcher>> {
        if requires_js {
            return self.browser(site);
        }
        Ok(Box::new(HttpClient::from_settings(&self.settings)?))
    }
}

/// Runs a batch of sites.
pub struct Orchestrator {
    registry: Arc<PluginRegistry>,
    factory: Arc<dyn FetcherFactory>,
    settings: Arc<Settings>,
    shutdown: Shutdown,
    progress_bar: bool,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<PluginRegistry>,
        factory: Arc<dyn FetcherFactory>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            factory,
            settings: Arc::new(settings),
            shutdown: Shutdown::never(),
            progress_bar: false,
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Draw an overall progress bar; site lines are printed through it.
    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.progress_bar = enabled;
        self
    }

    /// Harvest `codes` with at most `settings.workers` sites in flight.
    /// Entries in `rejected` (sites whose configuration did not load) are
    /// reported as failed without running. Writes `_summary.json`.
    pub async fn run(
        &self,
        codes: &[String],
        rejected: Vec<(String, HarvestError)>,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        std::fs::create_dir_all(&self.settings.output_dir)?;

        let all_codes = codes
            .iter()
            .map(String::as_str)
            .chain(rejected.iter().map(|(label, _)| label.as_str()));
        let reporter = Arc::new(Reporter::new(
            &self.settings.output_dir,
            all_codes,
            self.progress_bar,
        )?);

        let mut reports = Vec::with_capacity(codes.len() + rejected.len());
        for (label, err) in &rejected {
            let report = SiteReport::failed(label, err);
            reporter.finished(&report, Some(err)).await;
            reports.push(report);
        }

        let workers = self.settings.workers.max(1);
        info!("Harvesting {} sites with {} workers", codes.len(), workers);
        let semaphore = Arc::new(Semaphore::new(workers));

        let mut handles = Vec::with_capacity(codes.len());
        for code in codes {
            let code = code.clone();
            let semaphore = semaphore.clone();
            let registry = self.registry.clone();
            let factory = self.factory.clone();
            let settings = self.settings.clone();
            let shutdown = self.shutdown.clone();
            let reporter = reporter.clone();

            let task_code = code.clone();
            let handle = tokio::spawn(async move {
                let code = task_code;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return cancelled(&code),
                };
                if shutdown.is_requested() {
                    let report = cancelled(&code);
                    reporter.finished(&report, None).await;
                    return report;
                }

                reporter.started(&code).await;
                let (report, err) = run_site(&registry, factory.as_ref(), &settings, shutdown, &code).await;
                reporter.finished(&report, err.as_ref()).await;
                report
            });
            handles.push((code, handle));
        }

        for (code, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("{}: worker task ended abnormally: {}", code, e);
                    let mut report = SiteReport::new(&code, SiteStatus::Failed);
                    report.error_kind = Some("panic".into());
                    report.error = Some(e.to_string());
                    reporter.finished(&report, None).await;
                    reports.push(report);
                }
            }
        }
        reporter.close().await;

        let summary = RunSummary::new(started_at, reports, self.shutdown.is_requested());
        let path = summary.write(&self.settings.output_dir)?;
        debug!("Summary written to {}", path.display());
        Ok(summary)
    }
}

fn cancelled(code: &str) -> SiteReport {
    let mut report = SiteReport::new(code, SiteStatus::Terminated);
    report.stop_reason = Some(StopReason::Cancelled);
    report
}

/// Resolve, build and run one site under the per-site timeout. Errors
/// raised before the engine starts are returned alongside the report.
async fn run_site(
    registry: &PluginRegistry,
    factory: &dyn FetcherFactory,
    settings: &Settings,
    shutdown: Shutdown,
    code: &str,
) -> (SiteReport, Option<HarvestError>) {
    let prepared = registry.load_config(code).cloned().and_then(|site| {
        let plugin = registry.resolve(code)?;
        let requires_js = site.requires_js || plugin.requires_js();
        let fetcher = factory.create(&site, requires_js)?;
        debug!("{}: plugin {} via {}", code, plugin.name(), fetcher.backend());
        Ok((site, plugin, fetcher))
    });
    let (site, plugin, fetcher) = match prepared {
        Ok(parts) => parts,
        Err(err) => {
            error!("{}: {}", code, err);
            return (SiteReport::failed(code, &err), Some(err));
        }
    };

    let engine = Engine::new(
        site,
        plugin,
        fetcher,
        &settings.output_dir,
        EngineConfig::from_settings(settings),
    )
    .with_shutdown(shutdown);

    match tokio::time::timeout(settings.site_timeout, engine.run()).await {
        Ok(report) => (report, None),
        Err(_) => {
            let err = HarvestError::Timeout(settings.site_timeout);
            error!("{}: {}", code, err);
            (SiteReport::failed(code, &err), Some(err))
        }
    }
}

/// Process exit code for a finished run.
pub fn exit_code(summary: &RunSummary) -> i32 {
    if summary.interrupted {
        return EXIT_INTERRUPTED;
    }
    let totals = &summary.totals;
    if totals.failed > 0 && totals.failed == totals.sites {
        EXIT_ALL_FAILED
    } else if totals.failed > 0 {
        EXIT_PARTIAL
    } else {
        0
    }
}
