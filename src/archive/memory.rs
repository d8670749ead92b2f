//! In-memory archive

use std::collections::BTreeMap;

use crate::error::{BackupError, BackupResult};
use crate::models::Envelope;

use super::{validate_attachment_name, ArchiveReader, ArchiveWriter, EventIter};

/// An archive held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    events: Vec<Envelope>,
    attachments: BTreeMap<String, serde_json::Value>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archived events, in stream order
    pub fn event_list(&self) -> &[Envelope] {
        &self.events
    }

    /// Names of all stored attachments, sorted
    pub fn attachment_names(&self) -> Vec<&str> {
        self.attachments.keys().map(String::as_str).collect()
    }

    /// Replace or insert an attachment, bypassing the write-once rule
    pub fn set_attachment(&mut self, name: impl Into<String>, document: serde_json::Value) {
        self.attachments.insert(name.into(), document);
    }

    /// Drop an attachment, e.g. to simulate an archive from an older writer
    pub fn remove_attachment(&mut self, name: &str) -> Option<serde_json::Value> {
        self.attachments.remove(name)
    }
}

impl ArchiveWriter for MemoryArchive {
    fn write_attachment(&mut self, name: &str, document: serde_json::Value) -> BackupResult<()> {
        validate_attachment_name(name)?;

        if self.attachments.contains_key(name) {
            return Err(BackupError::Archive(format!(
                "Attachment already written: {}",
                name
            )));
        }

        self.attachments.insert(name.to_string(), document);
        Ok(())
    }

    fn write_event(&mut self, event: &Envelope) -> BackupResult<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

impl ArchiveReader for MemoryArchive {
    fn read_attachment(&self, name: &str) -> BackupResult<serde_json::Value> {
        self.attachments
            .get(name)
            .cloned()
            .ok_or_else(|| BackupError::attachment_not_found(name))
    }

    fn events(&self) -> BackupResult<EventIter<'_>> {
        Ok(Box::new(self.events.iter().cloned().map(Ok)))
    }
}
