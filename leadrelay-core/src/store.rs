//! Local fallback store
//!
//! Durable queue of envelopes that no sink accepted, kept as an append-only
//! JSONL log: one physical record per line. Appending a record never rewrites
//! earlier entries, so two interleaved dispatch failures cannot clobber each
//! other's records. The store never drops a record except through replay
//! retention ([`FallbackStore::rewrite`]) or an explicit [`FallbackStore::clear`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::Result;

/// One persisted fallback entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackRecord {
    pub envelope: Envelope,
    /// When the record was appended, epoch milliseconds
    pub persisted_at: i64,
}

/// Append-only log of undelivered envelopes
#[derive(Debug, Clone)]
pub struct FallbackStore {
    path: PathBuf,
}

impl FallbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Write is synchronous; the caller decides whether a
    /// failure escalates.
    pub fn append(&self, envelope: &Envelope, persisted_at: i64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let record = FallbackRecord {
            envelope: envelope.clone(),
            persisted_at,
        };
        let line = serde_json::to_string(&record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// All records in append order. A missing file is an empty list;
    /// unparseable lines are skipped with a warning, never fatal.
    pub fn list(&self) -> Result<Vec<FallbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FallbackRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        error = %e,
                        "Skipping unparseable fallback record"
                    );
                }
            }
        }
        Ok(records)
    }

    /// Number of pending records
    pub fn len(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Replace the log contents with the given records, atomically via a
    /// temp file and rename. Used by replay retention.
    pub fn rewrite(&self, records: &[FallbackRecord]) -> Result<()> {
        if records.is_empty() {
            return self.clear();
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for record in records {
                writeln!(file, "{}", serde_json::to_string(record)?)?;
            }
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Remove every record. Only the replay coordinator and explicit
    /// operator actions call this.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
