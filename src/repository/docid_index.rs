//! Append-only set of harvested document ids for one site.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// One docid per line, mirrored in memory.
///
/// A trailing line without a newline is the remnant of an interrupted
/// append: it is ignored on load and the next append starts a fresh line.
pub struct DocidIndex {
    path: PathBuf,
    ids: HashSet<String>,
    file: Option<File>,
    needs_newline: bool,
}

impl DocidIndex {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut ids = HashSet::new();
        let mut needs_newline = false;

        match std::fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let complete = match text.rfind('\n') {
                    Some(pos) => &text[..pos],
                    None => "",
                };
                if !text.is_empty() && !text.ends_with('\n') {
                    warn!("Ignoring partial trailing line in {}", path.display());
                    needs_newline = true;
                }
                ids.extend(
                    complete
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            ids,
            file: None,
            needs_newline,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, docid: &str) -> bool {
        self.ids.contains(docid)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append a docid. Returns `false` when it was already present.
    pub fn add(&mut self, docid: &str) -> Result<bool> {
        let docid: String = docid
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        let docid = docid.trim();
        if docid.is_empty() || self.ids.contains(docid) {
            return Ok(false);
        }

        if self.file.is_none() {
            if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            self.file = Some(OpenOptions::new().create(true).append(true).open(&self.path)?);
        }
        if let Some(file) = self.file.as_mut() {
            if self.needs_newline {
                file.write_all(b"\n")?;
                self.needs_newline = false;
            }
            file.write_all(format!("{}\n", docid).as_bytes())?;
            file.flush()?;
        }

        self.ids.insert(docid.to_string());
        Ok(true)
    }

    /// Delete the index file (site reset).
    pub fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
