//! Archive store
//!
//! Keeps timestamped directory archives per aggregate and enforces the
//! retention policy. Archive directories are named
//! `backup-YYYYMMDD-HHMMSS-mmm`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::paths::BackupPaths;
use crate::config::settings::ArchiveRetention;
use crate::error::{BackupError, BackupResult};
use crate::models::AggregateId;

use super::directory::DirectoryArchive;

/// Metadata about a stored archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInfo {
    /// Archive directory name
    pub name: String,
    /// Full path to the archive directory
    pub path: PathBuf,
    /// When the archive was created
    pub created_at: DateTime<Utc>,
    /// Whether the archive was finished (has a manifest)
    pub complete: bool,
}

/// Manages archive creation and retention
pub struct ArchiveStore {
    paths: BackupPaths,
    retention: ArchiveRetention,
}

impl ArchiveStore {
    pub fn new(paths: BackupPaths, retention: ArchiveRetention) -> Self {
        Self { paths, retention }
    }

    /// Start a new archive for an aggregate
    pub fn create_archive(&self, aggregate_id: AggregateId) -> BackupResult<DirectoryArchive> {
        let dir = self.paths.archives_for(aggregate_id);
        fs::create_dir_all(&dir)
            .map_err(|e| BackupError::Io(format!("Failed to create archive directory: {}", e)))?;

        let now = Utc::now();
        let name = format!(
            "backup-{}-{:03}",
            now.format("%Y%m%d-%H%M%S"),
            now.timestamp_subsec_millis()
        );

        let path = dir.join(&name);
        if path.exists() {
            return Err(BackupError::Archive(format!(
                "Archive already exists: {}",
                name
            )));
        }

        DirectoryArchive::create(path, aggregate_id)
    }

    /// List the archives of an aggregate, newest first
    pub fn list_archives(&self, aggregate_id: AggregateId) -> BackupResult<Vec<ArchiveInfo>> {
        let dir = self.paths.archives_for(aggregate_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut archives = Vec::new();

        for entry in fs::read_dir(&dir)
            .map_err(|e| BackupError::Io(format!("Failed to read archive directory: {}", e)))?
        {
            let entry = entry
                .map_err(|e| BackupError::Io(format!("Failed to read directory entry: {}", e)))?;

            let path = entry.path();
            if path.is_dir() {
                if let Some(info) = parse_archive_info(&path) {
                    archives.push(info);
                }
            }
        }

        archives.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(archives)
    }

    /// Most recent finished archive of an aggregate
    pub fn latest_archive(&self, aggregate_id: AggregateId) -> BackupResult<Option<ArchiveInfo>> {
        let archives = self.list_archives(aggregate_id)?;
        Ok(archives.into_iter().find(|a| a.complete))
    }

    /// Open a listed archive for reading
    pub fn open_archive(&self, info: &ArchiveInfo) -> BackupResult<DirectoryArchive> {
        DirectoryArchive::open(&info.path)
    }

    /// Delete finished archives beyond the newest `max_archives`
    ///
    /// Unfinished archives never count toward the limit. One older than the
    /// newest finished archive is an abandoned write and is deleted too.
    pub fn enforce_retention(&self, aggregate_id: AggregateId) -> BackupResult<Vec<PathBuf>> {
        let archives = self.list_archives(aggregate_id)?;
        let newest_complete = archives.iter().find(|a| a.complete).map(|a| a.created_at);
        let max_archives = self.retention.max_archives as usize;

        let mut kept = 0;
        let mut deleted = Vec::new();

        for archive in archives {
            let expired = if archive.complete {
                kept += 1;
                kept > max_archives
            } else {
                newest_complete.is_some_and(|newest| archive.created_at < newest)
            };

            if expired {
                fs::remove_dir_all(&archive.path)
                    .map_err(|e| BackupError::Io(format!("Failed to delete old archive: {}", e)))?;
                deleted.push(archive.path);
            }
        }

        if !deleted.is_empty() {
            tracing::debug!(
                aggregate = %aggregate_id,
                deleted = deleted.len(),
                "enforced archive retention"
            );
        }

        Ok(deleted)
    }
}

fn parse_archive_info(path: &Path) -> Option<ArchiveInfo> {
    let name = path.file_name()?.to_string_lossy().to_string();
    let date_part = name.strip_prefix("backup-")?;
    let created_at = parse_archive_timestamp(date_part)?;

    Some(ArchiveInfo {
        complete: path.join("manifest.json").exists(),
        name,
        path: path.to_path_buf(),
        created_at,
    })
}

/// Parse `YYYYMMDD-HHMMSS` or `YYYYMMDD-HHMMSS-mmm`
fn parse_archive_timestamp(date_str: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = date_str.split('-').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let date_part = parts[0];
    let time_part = parts[1];
    let millis: u32 = if parts.len() == 3 {
        parts[2].parse().ok()?
    } else {
        0
    };

    if date_part.len() != 8 || time_part.len() != 6 {
        return None;
    }

    let year: i32 = date_part[0..4].parse().ok()?;
    let month: u32 = date_part[4..6].parse().ok()?;
    let day: u32 = date_part[6..8].parse().ok()?;
    let hour: u32 = time_part[0..2].parse().ok()?;
    let minute: u32 = time_part[2..4].parse().ok()?;
    let second: u32 = time_part[4..6].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = chrono::NaiveTime::from_hms_milli_opt(hour, minute, second, millis)?;
    let datetime = chrono::NaiveDateTime::new(date, time);

    Some(DateTime::from_naive_utc_and_offset(datetime, Utc))
}
