//! Batch runs across many sites.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use council_harvest::config::{Settings, SiteDescriptor};
use council_harvest::error::Result;
use council_harvest::models::{SiteStatus, StopReason};
use council_harvest::orchestrator::{
    channel, exit_code, FetcherFactory, Orchestrator, EXIT_ALL_FAILED, EXIT_INTERRUPTED, EXIT_PARTIAL,
};
use council_harvest::plugins::PluginRegistry;
use council_harvest::scrapers::Fetcher;
use council_harvest::storage::ProgressSnapshot;

use common::{date, record_count, site, ActiveCounter, Board, BoardFetcher};

struct FixtureFactory {
    board: Arc<Board>,
    active: Arc<ActiveCounter>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
}

impl FixtureFactory {
    fn new(board: Board) -> Self {
        Self {
            board: Arc::new(board),
            active: Arc::new(ActiveCounter::default()),
            failing: HashSet::new(),
            hanging: HashSet::new(),
        }
    }
}

impl FetcherFactory for FixtureFactory {
    fn create(&self, site: &SiteDescriptor, _requires_js: bool) -> Result<Box<dyn Fetcher>> {
        let mut fetcher = BoardFetcher::shared(self.board.clone()).counted(self.active.clone());
        if self.failing.contains(&site.code) {
            fetcher.failing_pages.insert(1);
        }
        fetcher.hang = self.hanging.contains(&site.code);
        Ok(Box::new(fetcher))
    }
}

fn codes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("site{:02}", i)).collect()
}

fn settings(dir: &std::path::Path, workers: usize) -> Settings {
    Settings {
        output_dir: dir.to_path_buf(),
        workers,
        ..Default::default()
    }
}

fn orchestrator(codes: &[String], factory: Arc<FixtureFactory>, settings: Settings) -> Orchestrator {
    let registry = PluginRegistry::with_builtin(codes.iter().map(|c| site(c)));
    Orchestrator::new(Arc::new(registry), factory, settings)
}

#[tokio::test(start_paused = true)]
async fn test_fifty_sites_ten_workers() {
    let dir = tempfile::tempdir().unwrap();
    let codes = codes(50);
    let factory = Arc::new(FixtureFactory::new(Board::sequential(1, 3, date("2024-05-01"))));
    let runner = orchestrator(&codes, factory.clone(), settings(dir.path(), 10));

    // poll _progress.json while the batch runs
    let progress_path = dir.path().join("_progress.json");
    let reader = tokio::spawn(async move {
        let mut reads = 0;
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(bytes) = std::fs::read(&progress_path) {
                let snap: ProgressSnapshot = serde_json::from_slice(&bytes).unwrap();
                reads += 1;
                if snap.finished_sites == 50 {
                    return reads;
                }
            }
        }
    });

    let started = Instant::now();
    let summary = runner.run(&codes, Vec::new()).await.unwrap();
    let wall = started.elapsed();

    assert_eq!(summary.totals.sites, 50);
    assert_eq!(summary.totals.completed, 50);
    assert_eq!(summary.totals.items, 150);
    assert_eq!(exit_code(&summary), 0);
    assert!(factory.active.peak() <= 10);
    assert!(factory.active.peak() > 1);

    let slowest = summary.sites.iter().map(|r| r.elapsed).max().unwrap();
    assert!(wall <= slowest.mul_f64(50.0 / 10.0 * 1.3), "{:?} vs {:?}", wall, slowest);

    assert!(reader.await.unwrap() > 0);
    for code in &codes {
        assert_eq!(record_count(dir.path(), code), 3);
    }

    let summary_file: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("_summary.json")).unwrap()).unwrap();
    assert_eq!(summary_file["totals"]["completed"], 50);
    assert_eq!(summary_file["sites"][0]["code"], "site00");
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_site_does_not_stall_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let codes = codes(4);
    let mut factory = FixtureFactory::new(Board::sequential(1, 2, date("2024-05-01")));
    factory.hanging.insert("site01".into());
    let mut settings = settings(dir.path(), 2);
    settings.site_timeout = Duration::from_secs(5);

    let summary = orchestrator(&codes, Arc::new(factory), settings)
        .run(&codes, Vec::new())
        .await
        .unwrap();

    assert_eq!(summary.totals.completed, 3);
    assert_eq!(summary.failing_sites, vec!["site01".to_string()]);
    let slow = summary.sites.iter().find(|r| r.code == "site01").unwrap();
    assert_eq!(slow.error_kind.as_deref(), Some("timeout"));
    assert_eq!(exit_code(&summary), EXIT_PARTIAL);

    let errors = std::fs::read_to_string(dir.path().join("_errors.log")).unwrap();
    assert!(errors.contains("site01 timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_all_sites_failing() {
    let dir = tempfile::tempdir().unwrap();
    let codes = codes(3);
    let mut factory = FixtureFactory::new(Board::sequential(1, 2, date("2024-05-01")));
    factory.failing = codes.iter().cloned().collect();

    let summary = orchestrator(&codes, Arc::new(factory), settings(dir.path(), 3))
        .run(&codes, Vec::new())
        .await
        .unwrap();

    assert_eq!(summary.totals.failed, 3);
    assert_eq!(exit_code(&summary), EXIT_ALL_FAILED);
    assert!(summary
        .sites
        .iter()
        .all(|r| r.error_kind.as_deref() == Some("client_error")));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let codes = codes(3);
    let factory = Arc::new(FixtureFactory::new(Board::sequential(1, 2, date("2024-05-01"))));
    let (trigger, shutdown) = channel();
    trigger.trigger();

    let summary = orchestrator(&codes, factory.clone(), settings(dir.path(), 2))
        .with_shutdown(shutdown)
        .run(&codes, Vec::new())
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(exit_code(&summary), EXIT_INTERRUPTED);
    assert!(summary.sites.iter().all(|r| r.status == SiteStatus::Terminated
        && r.stop_reason == Some(StopReason::Cancelled)));
    assert_eq!(factory.active.peak(), 0);
}
