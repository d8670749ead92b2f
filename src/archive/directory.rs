//! On-disk archive layout
//!
//! ```text
//! <root>/
//!   manifest.json      written last, marks the archive complete
//!   events.jsonl       one envelope per line, in stream order
//!   attachments/<name> one JSON document per attachment
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{BackupError, BackupResult};
use crate::models::{AggregateId, Envelope};

use super::file_io::{json_file_valid, read_json_required, write_json_atomic};
use super::manifest::{ArchiveManifest, ARCHIVE_SCHEMA_VERSION};
use super::{validate_attachment_name, ArchiveReader, ArchiveWriter, EventIter};

const MANIFEST_FILE: &str = "manifest.json";
const EVENTS_FILE: &str = "events.jsonl";
const ATTACHMENTS_DIR: &str = "attachments";

/// A backup archive stored in a directory
///
/// Created archives are write-only until [`DirectoryArchive::finish`];
/// opened archives are read-only.
#[derive(Debug)]
pub struct DirectoryArchive {
    root: PathBuf,
    aggregate_id: AggregateId,
    created_at: DateTime<Utc>,
    event_count: u64,
    attachments: Vec<String>,
    events_out: Option<BufWriter<File>>,
    manifest: Option<ArchiveManifest>,
}

impl DirectoryArchive {
    /// Start writing a new archive at `root`
    pub fn create(root: impl Into<PathBuf>, aggregate_id: AggregateId) -> BackupResult<Self> {
        let root = root.into();

        if root.join(MANIFEST_FILE).exists() {
            return Err(BackupError::Archive(format!(
                "Archive already exists: {}",
                root.display()
            )));
        }

        fs::create_dir_all(root.join(ATTACHMENTS_DIR)).map_err(|e| {
            BackupError::Io(format!("Failed to create archive directory: {}", e))
        })?;

        let file = File::create(root.join(EVENTS_FILE))
            .map_err(|e| BackupError::Io(format!("Failed to create event file: {}", e)))?;

        Ok(Self {
            root,
            aggregate_id,
            created_at: Utc::now(),
            event_count: 0,
            attachments: Vec::new(),
            events_out: Some(BufWriter::new(file)),
            manifest: None,
        })
    }

    /// Open a finished archive for reading
    pub fn open(root: impl Into<PathBuf>) -> BackupResult<Self> {
        let root = root.into();
        let manifest_path = root.join(MANIFEST_FILE);

        if !manifest_path.exists() {
            return Err(BackupError::Archive(format!(
                "Incomplete archive, no manifest: {}",
                root.display()
            )));
        }

        let manifest: ArchiveManifest = read_json_required(&manifest_path)?;
        if manifest.schema_version > ARCHIVE_SCHEMA_VERSION {
            return Err(BackupError::Archive(format!(
                "Unsupported archive schema version {}",
                manifest.schema_version
            )));
        }

        Ok(Self {
            root,
            aggregate_id: manifest.aggregate_id,
            created_at: manifest.created_at,
            event_count: manifest.event_count,
            attachments: manifest.attachments.clone(),
            events_out: None,
            manifest: Some(manifest),
        })
    }

    /// Flush the event stream and write the manifest
    pub fn finish(mut self) -> BackupResult<ArchiveManifest> {
        let mut out = self.events_out.take().ok_or_else(|| {
            BackupError::Archive("Archive was opened for reading".into())
        })?;

        out.flush()
            .map_err(|e| BackupError::Io(format!("Failed to flush event file: {}", e)))?;
        out.get_ref()
            .sync_all()
            .map_err(|e| BackupError::Io(format!("Failed to sync event file: {}", e)))?;

        let manifest = ArchiveManifest {
            schema_version: ARCHIVE_SCHEMA_VERSION,
            aggregate_id: self.aggregate_id,
            created_at: self.created_at,
            completed_at: Utc::now(),
            event_count: self.event_count,
            attachments: self.attachments.clone(),
        };

        write_json_atomic(self.root.join(MANIFEST_FILE), &manifest)?;
        Ok(manifest)
    }

    /// Check an archive without restoring it
    pub fn validate(root: &Path, expected_attachments: &[&str]) -> BackupResult<ValidationResult> {
        let archive = Self::open(root)?;
        let manifest = archive.manifest.clone().ok_or_else(|| {
            BackupError::Archive(format!("Incomplete archive: {}", root.display()))
        })?;

        let mut events_readable = 0u64;
        let mut events_valid = true;
        for event in archive.events()? {
            match event {
                Ok(_) => events_readable += 1,
                Err(_) => {
                    events_valid = false;
                    break;
                }
            }
        }

        let attachments_valid = manifest
            .attachments
            .iter()
            .all(|name| json_file_valid(archive.attachment_path(name)));

        let missing_attachments = expected_attachments
            .iter()
            .filter(|name| !manifest.has_attachment(name))
            .map(|name| name.to_string())
            .collect();

        Ok(ValidationResult {
            is_valid: events_valid
                && attachments_valid
                && events_readable == manifest.event_count,
            schema_version: manifest.schema_version,
            aggregate_id: manifest.aggregate_id,
            backup_date: manifest.created_at,
            event_count: events_readable,
            attachments: manifest.attachments,
            missing_attachments,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    /// Manifest of an opened archive
    pub fn manifest(&self) -> Option<&ArchiveManifest> {
        self.manifest.as_ref()
    }

    fn attachment_path(&self, name: &str) -> PathBuf {
        self.root.join(ATTACHMENTS_DIR).join(name)
    }
}

impl ArchiveWriter for DirectoryArchive {
    fn write_attachment(&mut self, name: &str, document: serde_json::Value) -> BackupResult<()> {
        if self.events_out.is_none() {
            return Err(BackupError::Archive("Archive is read-only".into()));
        }
        validate_attachment_name(name)?;

        let path = self.attachment_path(name);
        if self.attachments.iter().any(|a| a == name) || path.exists() {
            return Err(BackupError::Archive(format!(
                "Attachment already written: {}",
                name
            )));
        }

        write_json_atomic(&path, &document)?;
        self.attachments.push(name.to_string());
        Ok(())
    }

    fn write_event(&mut self, event: &Envelope) -> BackupResult<()> {
        let out = self
            .events_out
            .as_mut()
            .ok_or_else(|| BackupError::Archive("Archive is read-only".into()))?;

        let line = serde_json::to_string(event)
            .map_err(|e| BackupError::Json(format!("Failed to serialize event: {}", e)))?;
        writeln!(out, "{}", line)
            .map_err(|e| BackupError::Io(format!("Failed to write event: {}", e)))?;

        self.event_count += 1;
        Ok(())
    }
}

impl ArchiveReader for DirectoryArchive {
    fn read_attachment(&self, name: &str) -> BackupResult<serde_json::Value> {
        validate_attachment_name(name)?;

        let path = self.attachment_path(name);
        if !path.exists() {
            return Err(BackupError::attachment_not_found(name));
        }

        read_json_required(&path)
    }

    fn events(&self) -> BackupResult<EventIter<'_>> {
        if self.manifest.is_none() {
            return Err(BackupError::Archive(
                "Archive is still being written".into(),
            ));
        }

        let file = File::open(self.root.join(EVENTS_FILE))
            .map_err(|e| BackupError::Io(format!("Failed to open event file: {}", e)))?;

        let lines = BufReader::new(file)
            .lines()
            .enumerate()
            .filter_map(|(line_num, line)| match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(serde_json::from_str::<Envelope>(&line).map_err(|e| {
                    BackupError::Json(format!(
                        "Failed to parse event at line {}: {}",
                        line_num + 1,
                        e
                    ))
                })),
                Err(e) => Some(Err(BackupError::Io(format!(
                    "Failed to read event line {}: {}",
                    line_num + 1,
                    e
                )))),
            });

        Ok(Box::new(lines))
    }
}

/// Result of validating an archive
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether every event and attachment could be read
    pub is_valid: bool,
    /// Schema version of the archive
    pub schema_version: u32,
    /// Aggregate the archive was taken from
    pub aggregate_id: AggregateId,
    /// Date the backup was created
    pub backup_date: DateTime<Utc>,
    /// Number of readable events
    pub event_count: u64,
    /// Attachments present in the archive
    pub attachments: Vec<String>,
    /// Expected attachments that are absent
    pub missing_attachments: Vec<String>,
}

impl ValidationResult {
    /// Check if all expected data is present
    pub fn is_complete(&self) -> bool {
        self.is_valid && self.missing_attachments.is_empty()
    }

    /// Get a summary of what data is present
    pub fn summary(&self) -> String {
        if !self.is_valid {
            format!("Corrupt archive (v{})", self.schema_version)
        } else if self.missing_attachments.is_empty() {
            format!(
                "Complete archive (v{}): {} events",
                self.schema_version, self.event_count
            )
        } else {
            format!(
                "Partial archive (v{}): {} events, missing {}",
                self.schema_version,
                self.event_count,
                self.missing_attachments.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, AppEvent};
    use serde_json::json;
    use tempfile::TempDir;

    fn write_sample(root: &Path, id: AggregateId) -> ArchiveManifest {
        let mut archive = DirectoryArchive::create(root, id).unwrap();
        archive
            .write_event(&Envelope::new(
                AppEvent::AppCreated {
                    app_id: id,
                    name: "blog".into(),
                },
                Actor::subject("u1"),
                0,
            ))
            .unwrap();
        archive
            .write_event(&Envelope::new(AppEvent::AppArchived, Actor::subject("u1"), 1))
            .unwrap();
        archive
            .write_attachment("users.json", json!({"u1": "u1@example.com"}))
            .unwrap();
        archive.finish().unwrap()
    }

    #[test]
    fn test_write_then_open() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("archive");
        let id = AggregateId::new();

        let manifest = write_sample(&root, id);
        assert_eq!(manifest.event_count, 2);
        assert_eq!(manifest.attachments, vec!["users.json".to_string()]);

        let archive = DirectoryArchive::open(&root).unwrap();
        assert_eq!(archive.aggregate_id(), id);

        let events: Vec<Envelope> = archive.events().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].payload(), &AppEvent::AppArchived);

        assert_eq!(
            archive.read_attachment("users.json").unwrap(),
            json!({"u1": "u1@example.com"})
        );
        assert!(archive
            .read_attachment("settings.json")
            .unwrap_err()
            .is_attachment_not_found());
    }

    #[test]
    fn test_unfinished_archive_cannot_be_opened() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("archive");

        let mut archive = DirectoryArchive::create(&root, AggregateId::new()).unwrap();
        archive
            .write_event(&Envelope::new(AppEvent::AppArchived, Actor::subject("u1"), 0))
            .unwrap();
        drop(archive);

        assert!(matches!(
            DirectoryArchive::open(&root),
            Err(BackupError::Archive(_))
        ));
    }

    #[test]
    fn test_opened_archive_is_read_only() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("archive");
        write_sample(&root, AggregateId::new());

        let mut archive = DirectoryArchive::open(&root).unwrap();
        assert!(archive.write_attachment("extra.json", json!({})).is_err());
        assert!(DirectoryArchive::create(&root, AggregateId::new()).is_err());
    }

    #[test]
    fn test_duplicate_attachment_rejected() {
        let temp = TempDir::new().unwrap();
        let mut archive =
            DirectoryArchive::create(temp.path().join("archive"), AggregateId::new()).unwrap();

        archive.write_attachment("settings.json", json!({})).unwrap();
        assert!(archive.write_attachment("settings.json", json!({})).is_err());
        assert!(archive.write_attachment("../escape", json!({})).is_err());
    }

    #[test]
    fn test_validate() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("archive");
        write_sample(&root, AggregateId::new());

        let result = DirectoryArchive::validate(&root, &["users.json", "settings.json"]).unwrap();
        assert!(result.is_valid);
        assert!(!result.is_complete());
        assert_eq!(result.event_count, 2);
        assert_eq!(result.missing_attachments, vec!["settings.json".to_string()]);
        assert!(result.summary().contains("missing settings.json"));
    }

    #[test]
    fn test_validate_detects_corrupt_events() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("archive");
        write_sample(&root, AggregateId::new());

        fs::write(root.join(EVENTS_FILE), "{not an event}\n").unwrap();

        let result = DirectoryArchive::validate(&root, &[]).unwrap();
        assert!(!result.is_valid);
        assert!(result.summary().starts_with("Corrupt"));
    }
}
