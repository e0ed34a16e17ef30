//! Per-worker politeness delays.

use std::time::Duration;

use tokio::time::Instant;

/// Spaces out requests from a single worker.
///
/// Tracks the last list-page and detail request separately so the engine
/// can apply `page_delay` between list pages and `request_delay` between
/// detail fetches. A server-requested wait (`Retry-After`) holds back every
/// later request of the worker, whichever kind it is.
#[derive(Debug, Clone)]
pub struct Pacer {
    request_delay: Duration,
    page_delay: Duration,
    last_page: Option<Instant>,
    last_request: Option<Instant>,
    not_before: Option<Instant>,
}

impl Pacer {
    pub fn new(request_delay: Duration, page_delay: Duration) -> Self {
        Self {
            request_delay,
            page_delay,
            last_page: None,
            last_request: None,
            not_before: None,
        }
    }

    /// Hold off every request for at least `wait` from now.
    pub fn hold_off(&mut self, wait: Duration) {
        let until = Instant::now() + wait;
        if self.not_before.map_or(true, |t| t < until) {
            self.not_before = Some(until);
        }
    }

    /// Wait until `page_delay` has passed since the previous list page.
    pub async fn before_page(&mut self) {
        self.wait_out_hold().await;
        sleep_remaining(self.last_page, self.page_delay).await;
        let now = Instant::now();
        self.last_page = Some(now);
        self.last_request = Some(now);
    }

    /// Wait until `request_delay` has passed since the previous request.
    pub async fn before_detail(&mut self) {
        self.wait_out_hold().await;
        sleep_remaining(self.last_request, self.request_delay).await;
        self.last_request = Some(Instant::now());
    }

    /// Time left before a detail request may go out.
    pub fn time_until_ready(&self) -> Duration {
        let hold = self
            .not_before
            .map_or(Duration::ZERO, |t| t.saturating_duration_since(Instant::now()));
        remaining(self.last_request, self.request_delay).max(hold)
    }

    async fn wait_out_hold(&mut self) {
        if let Some(until) = self.not_before.take() {
            tokio::time::sleep_until(until).await;
        }
    }
}

fn remaining(last: Option<Instant>, delay: Duration) -> Duration {
    match last {
        Some(last) => delay.saturating_sub(last.elapsed()),
        None => Duration::ZERO,
    }
}

async fn sleep_remaining(last: Option<Instant>, delay: Duration) {
    let wait = remaining(last, delay);
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
}
