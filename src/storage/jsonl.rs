//! Newline-delimited JSON record file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::models::OutputRecord;

/// Appends records to a site's JSONL file.
pub struct JsonlWriter {
    path: PathBuf,
    file: File,
    written: u64,
}

impl JsonlWriter {
    /// Open for appending. A torn last line from an interrupted run is
    /// closed off so the next record starts on its own line.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                warn!("Closing torn last line of {}", path.display());
                file.write_all(b"\n")?;
            }
        }

        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    pub fn write(&mut self, record: &OutputRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Records written through this writer.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Current file size in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// Read every parseable record; malformed lines are logged and skipped.
pub fn read_records(path: &Path) -> Result<Vec<OutputRecord>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<OutputRecord>(&line) {
            Ok(r) => records.push(r),
            Err(e) => warn!("{}:{}: skipping malformed record: {}", path.display(), n + 1, e),
        }
    }
    Ok(records)
}
