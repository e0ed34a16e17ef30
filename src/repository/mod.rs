//! Per-site persistence: checkpoints, the DOCID index and the site lock.
//!
//! Each site owns its files exclusively for the duration of a run; nothing
//! in here is shared between workers.

pub mod checkpoint;
pub mod docid_index;
pub mod lock;

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use docid_index::DocidIndex;
pub use lock::SiteLock;

/// Replace `path` with `contents` so readers see the old file or the new
/// one, never a partial write. The temp file lives in the same directory
/// so the final rename stays on one filesystem.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
