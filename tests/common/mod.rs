//! In-memory boards served through the `Fetcher` trait.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::time::Instant;

use council_harvest::config::SiteDescriptor;
use council_harvest::engine::EngineConfig;
use council_harvest::error::{HarvestError, Result};
use council_harvest::models::DateRange;
use council_harvest::orchestrator::ShutdownTrigger;
use council_harvest::scrapers::http_client::run_with_retries;
use council_harvest::scrapers::{build_url, Document, Fetcher, RetryPolicy};
use council_harvest::storage::{read_records, SitePaths};

pub const BASE_URL: &str = "https://demo.example.go.kr";
pub const LIST_PATH: &str = "/bbs/list.do";

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn site(code: &str) -> SiteDescriptor {
    SiteDescriptor {
        code: code.into(),
        display_name: format!("{} 의회", code),
        base_url: BASE_URL.into(),
        list_path: LIST_PATH.into(),
        plugin_name: "standard_table_v1".into(),
        ..Default::default()
    }
}

pub fn config(max_pages: u32, start: Option<&str>) -> EngineConfig {
    EngineConfig {
        max_pages,
        range: DateRange::new(start.map(date), None),
        snapshot_every: 10,
        request_delay: Duration::from_millis(500),
        page_delay: Duration::from_secs(1),
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub id: u32,
    pub number: String,
    pub date: NaiveDate,
    pub notice: bool,
}

/// List pages of a table board, page 1 first. Pages past the end are empty.
#[derive(Debug, Clone, Default)]
pub struct Board {
    pub pages: Vec<Vec<Row>>,
}

impl Board {
    /// `pages` pages of `per_page` rows, newest first, one day apart
    /// starting at `newest`. Ids count down from 1000.
    pub fn sequential(pages: usize, per_page: usize, newest: NaiveDate) -> Self {
        let mut board = Board::default();
        for p in 0..pages {
            let rows = (0..per_page)
                .map(|r| {
                    let n = (p * per_page + r) as u32;
                    Row {
                        id: 1000 - n,
                        number: (1000 - n).to_string(),
                        date: newest - chrono::Duration::days(n as i64),
                        notice: false,
                    }
                })
                .collect();
            board.pages.push(rows);
        }
        board
    }

    /// Put a pinned notice at the top of every page.
    pub fn with_notice(mut self, id: u32, posted: NaiveDate) -> Self {
        for rows in &mut self.pages {
            rows.insert(
                0,
                Row {
                    id,
                    number: "공지".into(),
                    date: posted,
                    notice: true,
                },
            );
        }
        self
    }

    pub fn total_rows(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn list_html(&self, page: usize) -> String {
        let mut body = String::from(
            "<html><body><table class=\"board\"><thead><tr><th>번호</th><th>제목</th>\
             <th>담당부서</th><th>등록일</th><th>조회수</th></tr></thead><tbody>",
        );
        for row in page.checked_sub(1).and_then(|i| self.pages.get(i)).into_iter().flatten() {
            let class = if row.notice { " class=\"notice\"" } else { "" };
            let _ = write!(
                body,
                "<tr{}><td>{}</td><td><a href=\"view.do?nttId={}\">안건 {}</a></td>\
                 <td>의사담당관</td><td>{}</td><td>12</td></tr>",
                class,
                row.number,
                row.id,
                row.id,
                row.date.format("%Y-%m-%d")
            );
        }
        body.push_str("</tbody></table></body></html>");
        body
    }

    pub fn detail_html(id: u32) -> String {
        format!(
            "<html><body><div class=\"view_content\"><p>본문 {id} 입니다.</p></div>\
             <table><tr><th>담당자</th><td>홍길동</td></tr><tr><th>연락처</th><td>02-123-4567</td></tr></table>\
             <a href=\"/files/download.do?fileId={id}\">첨부 {id}.hwp</a></body></html>"
        )
    }
}

/// A request seen by a [`BoardFetcher`].
#[derive(Debug, Clone)]
pub struct Hit {
    pub url: String,
    pub attempt: u32,
    pub at: Instant,
}

/// Serves a [`Board`] with optional faults.
pub struct BoardFetcher {
    board: Arc<Board>,
    policy: RetryPolicy,
    pub hits: Arc<Mutex<Vec<Hit>>>,
    details: AtomicUsize,
    /// List pages answered with HTTP 404.
    pub failing_pages: HashSet<usize>,
    /// List page whose first attempt is a 429 with this `Retry-After`.
    pub rate_limited: Option<(usize, Duration)>,
    /// Detail ids answered with 429 and this `Retry-After` on every attempt.
    pub throttled_details: HashMap<u32, Duration>,
    /// Trigger shutdown once this many detail pages were served.
    pub shutdown_after: Option<(usize, ShutdownTrigger)>,
    /// Every request hangs forever.
    pub hang: bool,
    active: Option<Arc<ActiveCounter>>,
}

impl BoardFetcher {
    pub fn new(board: Board) -> Self {
        Self::shared(Arc::new(board))
    }

    pub fn shared(board: Arc<Board>) -> Self {
        Self {
            board,
            policy: RetryPolicy::default(),
            hits: Arc::new(Mutex::new(Vec::new())),
            details: AtomicUsize::new(0),
            failing_pages: HashSet::new(),
            rate_limited: None,
            throttled_details: HashMap::new(),
            shutdown_after: None,
            hang: false,
            active: None,
        }
    }

    pub fn counted(mut self, active: Arc<ActiveCounter>) -> Self {
        active.enter();
        self.active = Some(active);
        self
    }

    fn respond(&self, url: &url::Url, attempt: u32) -> Result<Document> {
        if let Ok(mut hits) = self.hits.lock() {
            hits.push(Hit {
                url: url.to_string(),
                attempt,
                at: Instant::now(),
            });
        }
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        if let Some(page) = query.get("pageIndex").and_then(|p| p.parse::<usize>().ok()) {
            if let Some((limited, wait)) = self.rate_limited {
                if limited == page && attempt == 1 {
                    return Err(HarvestError::RateLimited {
                        url: url.to_string(),
                        retry_after: Some(wait),
                    });
                }
            }
            if self.failing_pages.contains(&page) {
                return Err(HarvestError::ClientError {
                    status: 404,
                    url: url.to_string(),
                });
            }
            return Ok(Document::new(url.as_str(), self.board.list_html(page)));
        }

        if let Some(id) = query.get("nttId").and_then(|id| id.parse::<u32>().ok()) {
            if let Some(wait) = self.throttled_details.get(&id) {
                return Err(HarvestError::RateLimited {
                    url: url.to_string(),
                    retry_after: Some(*wait),
                });
            }
            let served = self.details.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((after, trigger)) = &self.shutdown_after {
                if served == *after {
                    trigger.trigger();
                }
            }
            return Ok(Document::new(url.as_str(), Board::detail_html(id)));
        }

        Err(HarvestError::ClientError {
            status: 404,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for BoardFetcher {
    async fn fetch(&mut self, url: &str, params: &[(String, String)]) -> Result<Document> {
        let target = build_url(url, params)?;
        if self.hang {
            std::future::pending::<()>().await;
        }
        let this = &*self;
        run_with_retries(&this.policy, target.as_str(), |attempt| {
            std::future::ready(this.respond(&target, attempt))
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "fixture"
    }
}

impl Drop for BoardFetcher {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.leave();
        }
    }
}

/// Tracks how many fetchers are alive at once.
#[derive(Debug, Default)]
pub struct ActiveCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ActiveCounter {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Docids persisted for a site, in write order.
pub fn docids(output_dir: &Path, code: &str) -> Vec<String> {
    let paths = SitePaths::new(output_dir, code);
    std::fs::read_to_string(paths.docids)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Number of JSONL records for a site.
pub fn record_count(output_dir: &Path, code: &str) -> usize {
    read_records(&SitePaths::new(output_dir, code).jsonl).unwrap().len()
}
