//! Per-site progress checkpoint.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::write_atomic;
use crate::error::Result;

/// Persisted progress for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub site_code: String,
    pub last_page: u32,
    pub cumulative_items: u64,
    pub last_url: Option<String>,
    #[serde(rename = "last_update_iso")]
    pub last_update: DateTime<Utc>,
    pub completed: bool,
}

impl Checkpoint {
    fn new(site_code: &str) -> Self {
        Self {
            site_code: site_code.to_string(),
            last_page: 0,
            cumulative_items: 0,
            last_url: None,
            last_update: Utc::now(),
            completed: false,
        }
    }
}

/// Owner of one site's checkpoint file.
pub struct CheckpointStore {
    path: PathBuf,
    site_code: String,
    current: Option<Checkpoint>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, site_code: &str) -> Self {
        Self {
            path: path.into(),
            site_code: site_code.to_string(),
            current: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint from disk. A missing file means a fresh site;
    /// an unreadable one is logged and treated the same way.
    pub fn load(&mut self) -> Result<Option<&Checkpoint>> {
        self.current = match std::fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Checkpoint>(&bytes) {
                Ok(cp) => Some(cp),
                Err(e) => {
                    warn!(
                        "{}: ignoring unreadable checkpoint {}: {}",
                        self.site_code,
                        self.path.display(),
                        e
                    );
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(self.current.as_ref())
    }

    pub fn current(&self) -> Option<&Checkpoint> {
        self.current.as_ref()
    }

    /// Record a fully processed list page. `last_page` never moves
    /// backwards.
    pub fn save(&mut self, page: u32, url: &str, cumulative: u64) -> Result<()> {
        let mut cp = self
            .current
            .clone()
            .unwrap_or_else(|| Checkpoint::new(&self.site_code));
        if page < cp.last_page {
            warn!(
                "{}: checkpoint page {} behind stored page {}, keeping {}",
                self.site_code, page, cp.last_page, cp.last_page
            );
        }
        cp.last_page = cp.last_page.max(page);
        cp.cumulative_items = cumulative;
        cp.last_url = Some(url.to_string());
        cp.last_update = Utc::now();
        cp.completed = false;
        self.write(cp)
    }

    /// Promote the checkpoint to completed; later runs skip the site.
    pub fn mark_completed(&mut self) -> Result<()> {
        let mut cp = self
            .current
            .clone()
            .unwrap_or_else(|| Checkpoint::new(&self.site_code));
        cp.completed = true;
        cp.last_update = Utc::now();
        self.write(cp)
    }

    /// Remove the checkpoint file.
    pub fn clear(&mut self) -> Result<()> {
        self.current = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// True when a partially harvested site can continue where it stopped.
    pub fn can_resume(&self) -> bool {
        self.current
            .as_ref()
            .map(|cp| cp.last_page > 0 && !cp.completed)
            .unwrap_or(false)
    }

    pub fn is_completed(&self) -> bool {
        self.current.as_ref().map(|cp| cp.completed).unwrap_or(false)
    }

    /// Persist `cp`; the in-memory copy only changes once it is on disk.
    fn write(&mut self, cp: Checkpoint) -> Result<()> {
        let json = serde_json::to_vec_pretty(&cp)?;
        write_atomic(&self.path, &json)?;
        debug!(
            "{}: checkpoint page={} items={} completed={}",
            cp.site_code, cp.last_page, cp.cumulative_items, cp.completed
        );
        self.current = Some(cp);
        Ok(())
    }
}
