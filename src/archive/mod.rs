//! Backup archives
//!
//! An archive holds the raw event stream of one aggregate plus named
//! attachments: side-channel JSON documents such as the user lookup table or
//! the settings blob. Attachments are keyed by logical filename, never by
//! event position.
//!
//! # Implementations
//!
//! - `MemoryArchive`: in-process archive, used by tests and embedders that
//!   move archives around themselves
//! - `DirectoryArchive`: on-disk layout with a manifest, a JSON-lines event
//!   file and one file per attachment
//! - `ArchiveStore`: keeps timestamped directory archives per aggregate and
//!   enforces the retention policy

mod directory;
pub mod file_io;
mod manifest;
mod memory;
mod store;

pub use directory::{DirectoryArchive, ValidationResult};
pub use manifest::{ArchiveManifest, ARCHIVE_SCHEMA_VERSION};
pub use memory::MemoryArchive;
pub use store::{ArchiveInfo, ArchiveStore};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{BackupError, BackupResult};
use crate::models::Envelope;

/// Sequential stream of archived events
pub type EventIter<'a> = Box<dyn Iterator<Item = BackupResult<Envelope>> + 'a>;

/// Write side of an archive
pub trait ArchiveWriter {
    /// Store a named document. Writing the same name twice is rejected.
    fn write_attachment(&mut self, name: &str, document: serde_json::Value) -> BackupResult<()>;

    /// Append the next event of the stream
    fn write_event(&mut self, event: &Envelope) -> BackupResult<()>;
}

/// Read side of an archive
pub trait ArchiveReader: Send + Sync {
    /// Read a named document, failing with `AttachmentNotFound` if absent
    fn read_attachment(&self, name: &str) -> BackupResult<serde_json::Value>;

    /// Iterate the archived events in their original order
    fn events(&self) -> BackupResult<EventIter<'_>>;
}

/// Serialize a value and store it as an attachment
pub fn write_json<W, T>(writer: &mut W, name: &str, value: &T) -> BackupResult<()>
where
    W: ArchiveWriter + ?Sized,
    T: Serialize,
{
    let document = serde_json::to_value(value)
        .map_err(|e| BackupError::Json(format!("Failed to serialize attachment {}: {}", name, e)))?;
    writer.write_attachment(name, document)
}

/// Read an attachment into a typed value
pub fn read_json<R, T>(reader: &R, name: &str) -> BackupResult<T>
where
    R: ArchiveReader + ?Sized,
    T: DeserializeOwned,
{
    let document = reader.read_attachment(name)?;
    serde_json::from_value(document)
        .map_err(|e| BackupError::Json(format!("Failed to parse attachment {}: {}", name, e)))
}

/// Read an attachment, treating absence as "no prior data"
pub fn read_json_or_default<R, T>(reader: &R, name: &str) -> BackupResult<T>
where
    R: ArchiveReader + ?Sized,
    T: DeserializeOwned + Default,
{
    match read_json(reader, name) {
        Err(e) if e.is_attachment_not_found() => Ok(T::default()),
        other => other,
    }
}

/// Reject attachment names that could escape the archive
pub(crate) fn validate_attachment_name(name: &str) -> BackupResult<()> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(BackupError::Validation(format!(
            "Invalid attachment name: '{}'",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_typed_attachment_helpers() {
        let mut archive = MemoryArchive::new();
        let users = BTreeMap::from([("u1".to_string(), "u1@example.com".to_string())]);

        write_json(&mut archive, "users.json", &users).unwrap();

        let loaded: BTreeMap<String, String> = read_json(&archive, "users.json").unwrap();
        assert_eq!(loaded, users);
    }

    #[test]
    fn test_read_json_or_default_on_missing() {
        let archive = MemoryArchive::new();

        let loaded: BTreeMap<String, String> =
            read_json_or_default(&archive, "users.json").unwrap();
        assert!(loaded.is_empty());

        let err = read_json::<_, BTreeMap<String, String>>(&archive, "users.json").unwrap_err();
        assert!(err.is_attachment_not_found());
    }

    #[test]
    fn test_read_json_or_default_keeps_parse_errors() {
        let mut archive = MemoryArchive::new();
        archive
            .write_attachment("users.json", serde_json::json!([1, 2, 3]))
            .unwrap();

        let result: BackupResult<BTreeMap<String, String>> =
            read_json_or_default(&archive, "users.json");
        assert!(matches!(result, Err(BackupError::Json(_))));
    }

    #[test]
    fn test_attachment_names() {
        assert!(validate_attachment_name("settings.json").is_ok());
        assert!(validate_attachment_name("../etc").is_err());
        assert!(validate_attachment_name("a/b").is_err());
        assert!(validate_attachment_name("").is_err());
    }
}
