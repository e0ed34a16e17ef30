//! Site run status and the per-site report shared by the engine, the
//! orchestrator and the summary files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle of one site within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Pending,
    Running,
    /// Walk finished: cutoff crossed or pages exhausted.
    Completed,
    /// Stopped early with items kept (page cap, fetch failure, shutdown).
    Terminated,
    Failed,
    /// Already completed by an earlier run.
    Skipped,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// Why a site's page walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    CutoffReached,
    EmptyPage,
    PageCap,
    FetchFailed,
    Cancelled,
}

/// Outcome of one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteReport {
    pub code: String,
    pub status: SiteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    /// Last list page fully processed.
    pub last_page: u32,
    /// Pages fetched in this run.
    pub pages: u32,
    /// Records written in this run.
    pub items: u64,
    /// Rows skipped because their docid was already indexed.
    pub already_seen: u64,
    /// Size of the site's JSONL file after the run.
    pub bytes: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SiteReport {
    pub fn new(code: &str, status: SiteStatus) -> Self {
        Self {
            code: code.to_string(),
            status,
            stop_reason: None,
            last_page: 0,
            pages: 0,
            items: 0,
            already_seen: 0,
            bytes: 0,
            elapsed: Duration::ZERO,
            truncated: false,
            error_kind: None,
            error: None,
        }
    }

    /// A site that failed before or outside the engine.
    pub fn failed(code: &str, err: &crate::error::HarvestError) -> Self {
        let mut report = Self::new(code, SiteStatus::Failed);
        report.error_kind = Some(err.kind().to_string());
        report.error = Some(err.to_string());
        report
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64((d.as_secs_f64() * 1000.0).round() / 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_shape() {
        let mut report = SiteReport::new("demo", SiteStatus::Terminated);
        report.stop_reason = Some(StopReason::PageCap);
        report.truncated = true;
        report.elapsed = Duration::from_millis(1500);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "terminated");
        assert_eq!(json["stop_reason"], "page_cap");
        assert_eq!(json["elapsed"], 1.5);
        assert!(json.get("error").is_none());

        let back: SiteReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_finished_states() {
        assert!(!SiteStatus::Running.is_finished());
        assert!(SiteStatus::Skipped.is_finished());
    }
}
