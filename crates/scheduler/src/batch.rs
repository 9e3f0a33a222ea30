//! Hand-off of grouped jobs to an external batch system.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use crate::error::BatchError;

pub trait BatchWriter: Send + Sync {
    /// Record one job: its ordered stage commands plus the optional group.
    fn submit(&self, stages: &[String], group: Option<&str>, original: &str) -> Result<(), BatchError>;
}

/// Appends one line per job to a batch configuration file:
/// `stage1 | stage2 | ... | group <tag> <original>`.
pub struct FileBatchWriter {
    path: PathBuf,
    max_entries: usize,
    /// Serializes appends and tracks the current entry count.
    entries: Mutex<usize>,
}

impl FileBatchWriter {
    /// Open (or prepare to create) the batch file and count existing entries.
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> Result<Self, BatchError> {
        let path = path.into();
        let existing = count_entries(&path)?;
        info!(path = %path.display(), existing, max_entries, "batch file ready");
        Ok(Self {
            path,
            max_entries,
            entries: Mutex::new(existing),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        *self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn count_entries(path: &Path) -> Result<usize, BatchError> {
    match std::fs::File::open(path) {
        Ok(file) => {
            let mut n = 0;
            for line in BufReader::new(file).lines() {
                if !line?.trim().is_empty() {
                    n += 1;
                }
            }
            Ok(n)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

impl BatchWriter for FileBatchWriter {
    fn submit(&self, stages: &[String], group: Option<&str>, original: &str) -> Result<(), BatchError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if *entries >= self.max_entries {
            return Err(BatchError::Full { max: self.max_entries });
        }

        let mut parts: Vec<String> = stages.to_vec();
        if let Some(tag) = group {
            parts.push(format!("group {tag} {original}"));
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", parts.join(" | "))?;
        *entries += 1;
        Ok(())
    }
}
