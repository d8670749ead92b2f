//! Append-only journal writer
//!
//! Each entry is written as a single JSON line and flushed immediately.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{BackupError, BackupResult};

use super::entry::JournalEntry;

/// Writes journal entries to a JSONL file
///
/// Concurrent restores share one logger; writes are serialized so lines never
/// interleave.
pub struct JournalLogger {
    log_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JournalLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Append an entry
    pub fn log(&self, entry: &JournalEntry) -> BackupResult<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| BackupError::Json(format!("Failed to serialize journal entry: {}", e)))?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| BackupError::Io(format!("Failed to acquire journal lock: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| BackupError::Io(format!("Failed to open journal: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| BackupError::Io(format!("Failed to write journal entry: {}", e)))?;

        file.flush()
            .map_err(|e| BackupError::Io(format!("Failed to flush journal: {}", e)))?;

        Ok(())
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> BackupResult<Vec<JournalEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| BackupError::Io(format!("Failed to open journal: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                BackupError::Io(format!("Failed to read journal line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: JournalEntry = serde_json::from_str(&line).map_err(|e| {
                BackupError::Json(format!(
                    "Failed to parse journal entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Read the most recent N entries
    pub fn read_recent(&self, count: usize) -> BackupResult<Vec<JournalEntry>> {
        let all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries[start..].to_vec())
    }

    /// Number of entries in the journal
    pub fn entry_count(&self) -> BackupResult<usize> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.log_path)
            .map_err(|e| BackupError::Io(format!("Failed to open journal: {}", e)))?;

        let reader = BufReader::new(file);
        let count = reader
            .lines()
            .filter_map(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count();

        Ok(count)
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}
