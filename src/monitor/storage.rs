//! Scalar writers
//!
//! [`InMemoryWriter`] keeps records for inspection; [`JsonlWriter`] appends
//! one JSON record per line to a file.

use super::{ScalarRecord, ScalarStats, ScalarWriter};
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// In-memory writer (always available)
///
/// Clones share the same records, so a handle kept outside the trainer sees
/// everything written through the boxed copy.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWriter {
    records: Arc<Mutex<Vec<ScalarRecord>>>,
}

impl InMemoryWriter {
    /// Create a new in-memory writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all records
    pub fn all_records(&self) -> Vec<ScalarRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Records for one tag, in write order
    pub fn query(&self, tag: &str) -> Vec<ScalarRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.tag == tag)
            .cloned()
            .collect()
    }

    /// `(step, value)` pairs for one tag
    pub fn series(&self, tag: &str) -> Vec<(u64, f64)> {
        self.query(tag).iter().map(|r| (r.step, r.value)).collect()
    }

    pub fn last(&self, tag: &str) -> Option<ScalarRecord> {
        self.query(tag).pop()
    }

    /// Get summary statistics for a tag
    pub fn stats(&self, tag: &str) -> Option<ScalarStats> {
        let values: Vec<f64> = self.query(tag).iter().map(|r| r.value).collect();
        ScalarStats::from_values(&values)
    }

    /// Get total record count
    pub fn count(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl ScalarWriter for InMemoryWriter {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ScalarRecord::new(tag, value, step));
        Ok(())
    }
}

/// JSON-lines file writer
pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    dirty: bool,
}

impl JsonlWriter {
    /// Create or append to a JSON-lines file, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            dirty: false,
        })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScalarWriter for JsonlWriter {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        let line = serde_json::to_string(&ScalarRecord::new(tag, value, step))
            .map_err(|e| Error::Serialization(e.to_string()))?;
        writeln!(self.writer, "{line}")?;
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.writer.flush()?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        if let Err(e) = ScalarWriter::flush(self) {
            warn!("Failed to flush {}: {e}", self.path.display());
        }
    }
}

/// Read every record of a JSON-lines file
pub fn read_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<ScalarRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_query_and_stats() {
        let handle = InMemoryWriter::new();
        let mut writer = handle.clone();
        writer.add_scalar("Train/Loss", 1.0, 0).unwrap();
        writer.add_scalar("Train/Accuracy", 0.5, 0).unwrap();
        writer.add_scalar("Train/Loss", 0.5, 1).unwrap();

        assert_eq!(handle.count(), 3);
        assert_eq!(handle.series("Train/Loss"), vec![(0, 1.0), (1, 0.5)]);
        assert_eq!(handle.last("Train/Accuracy").unwrap().value, 0.5);
        assert_eq!(handle.stats("Train/Loss").unwrap().mean, 0.75);
        assert!(handle.stats("Valid/Loss").is_none());
    }

    #[test]
    fn test_jsonl_writer_persists_on_flush() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tb_logs").join("scalars.jsonl");
        let mut writer = JsonlWriter::open(&path).unwrap();
        writer.add_scalar("LearningRate", 0.1, 0).unwrap();
        writer.add_scalar("Train/Loss", 2.0, 0).unwrap();
        writer.flush().unwrap();

        let records = read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].tag, "Train/Loss");
        assert_eq!(records[1].value, 2.0);
    }

    #[test]
    fn test_jsonl_writer_flushes_on_drop_and_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scalars.jsonl");
        {
            let mut writer = JsonlWriter::open(&path).unwrap();
            writer.add_scalar("a", 1.0, 0).unwrap();
        }
        {
            let mut writer = JsonlWriter::open(&path).unwrap();
            writer.add_scalar("b", 2.0, 1).unwrap();
        }
        let tags: Vec<String> = read_jsonl(&path).unwrap().into_iter().map(|r| r.tag).collect();
        assert_eq!(tags, vec!["a", "b"]);
    }
}
