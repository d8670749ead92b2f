//! Backup handler for app aggregates
//!
//! # Attachments
//!
//! - `users.json`: user id -> email for every user the stream refers to, so
//!   the users can be found again in another environment
//! - `settings.json`: the app's side-channel settings blob
//!
//! # Restore policy
//!
//! - The creation event declares the name. The user table is loaded and
//!   resolved at that point and the name is reserved; a taken name aborts the
//!   restore.
//! - The first contributor assignment is rewritten to the restoring actor
//!   without consulting the mapping table: whoever created the app is, by
//!   policy, the operator restoring it.
//! - Later assignments and removals go through the mapping table, falling back
//!   to the restoring actor.
//! - Every event's actor goes through the mapping table.
//! - Archived settings are read before commit but written only after the
//!   stream is committed, so a failed restore never touches live settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::archive::{read_json_or_default, write_json, ArchiveReader, ArchiveWriter};
use crate::error::{BackupError, BackupResult};
use crate::models::{validate_name, AppEvent, Envelope};
use crate::services::{IdentityResolver, NameIndex, PersonalIndex, SettingsStore};

use super::handler::{BackupHandler, BackupRun, RestoreRun};

/// Attachment holding the user id -> email table
pub const USERS_ATTACHMENT: &str = "users.json";

/// Attachment holding the settings blob
pub const SETTINGS_ATTACHMENT: &str = "settings.json";

/// Backup/restore policy for apps
pub struct AppBackupHandler {
    resolver: Arc<dyn IdentityResolver>,
    names: Arc<dyn NameIndex>,
    personal: Arc<dyn PersonalIndex>,
    settings: Arc<dyn SettingsStore>,
}

impl AppBackupHandler {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        names: Arc<dyn NameIndex>,
        personal: Arc<dyn PersonalIndex>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            resolver,
            names,
            personal,
            settings,
        }
    }

    fn restore_created(
        &self,
        run: &mut RestoreRun,
        reader: &dyn ArchiveReader,
        name: String,
    ) -> BackupResult<AppEvent> {
        let name = run.new_name.clone().unwrap_or(name);
        validate_name(&name).map_err(|e| BackupError::Validation(e.to_string()))?;

        let users: BTreeMap<String, String> = match reader.read_attachment(USERS_ATTACHMENT) {
            Ok(document) => serde_json::from_value(document).map_err(|e| {
                BackupError::Json(format!("Failed to parse {}: {}", USERS_ATTACHMENT, e))
            })?,
            Err(e) if e.is_attachment_not_found() => {
                run.warn(format!(
                    "{} missing, every user maps to the restoring actor",
                    USERS_ATTACHMENT
                ));
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        run.mapping.load_lookup(users);
        run.mapping.resolve_all(self.resolver.as_ref());

        run.reservation.reserve(self.names.as_ref(), &name)?;

        Ok(AppEvent::AppCreated {
            app_id: run.aggregate_id,
            name,
        })
    }
}

impl BackupHandler for AppBackupHandler {
    fn name(&self) -> &str {
        "apps"
    }

    fn backup_event(
        &self,
        event: &Envelope,
        run: &mut BackupRun,
        _writer: &mut dyn ArchiveWriter,
    ) -> BackupResult<()> {
        if event.actor().is_subject() {
            run.users.insert(event.actor().identifier.clone());
        }

        if let AppEvent::ContributorAssigned { contributor, .. } = event.payload() {
            run.users.insert(contributor.clone());
        }

        Ok(())
    }

    fn backup(&self, run: &mut BackupRun, writer: &mut dyn ArchiveWriter) -> BackupResult<()> {
        let mut users = BTreeMap::new();

        for user in &run.users {
            match self.resolver.find_by_id_or_key(user) {
                Ok(Some(identity)) => {
                    users.insert(user.clone(), identity.email);
                }
                Ok(None) => {
                    tracing::debug!(user = user.as_str(), "user not found, left out of backup");
                }
                Err(e) => {
                    tracing::warn!(user = user.as_str(), error = %e, "could not resolve user for backup");
                }
            }
        }

        write_json(writer, USERS_ATTACHMENT, &users)?;

        let settings = self
            .settings
            .load(run.aggregate_id)?
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        writer.write_attachment(SETTINGS_ATTACHMENT, settings)?;

        tracing::debug!(
            aggregate = %run.aggregate_id,
            users = users.len(),
            "app attachments written"
        );
        Ok(())
    }

    fn restore_event(
        &self,
        event: Envelope,
        run: &mut RestoreRun,
        reader: &dyn ArchiveReader,
    ) -> BackupResult<Envelope> {
        let (payload, metadata) = event.into_parts();
        let resolver = self.resolver.as_ref();

        if run.reservation.name().is_none() && !matches!(payload, AppEvent::AppCreated { .. }) {
            return Err(BackupError::Validation(format!(
                "Archive must start with AppCreated, found {}",
                payload
            )));
        }

        let payload = match payload {
            AppEvent::AppCreated { name, .. } => self.restore_created(run, reader, name)?,
            AppEvent::ContributorAssigned { contributor, role } => {
                let mapped = if run.members.is_first_assignment() {
                    run.initiator().identifier.clone()
                } else {
                    run.mapping.map_user(resolver, &contributor).identifier
                };
                run.members.add(mapped.clone());
                AppEvent::ContributorAssigned {
                    contributor: mapped,
                    role,
                }
            }
            AppEvent::ContributorRemoved { contributor } => {
                let mapped = run.mapping.map_user(resolver, &contributor).identifier;
                run.members.remove(&mapped);
                AppEvent::ContributorRemoved {
                    contributor: mapped,
                }
            }
            other => other,
        };

        let actor = run.mapping.map_actor(resolver, &metadata.actor);
        Ok(Envelope::from_parts(payload, metadata).with_actor(actor))
    }

    fn restore(&self, run: &mut RestoreRun, reader: &dyn ArchiveReader) -> BackupResult<()> {
        if run.reservation.name().is_none() {
            return Err(BackupError::Validation(
                "Archive contains no AppCreated event".into(),
            ));
        }

        let settings: Option<serde_json::Value> =
            read_json_or_default(reader, SETTINGS_ATTACHMENT)?;
        match settings {
            Some(settings) => run.pending_settings = Some(settings),
            None => run.warn(format!("{} missing, settings left empty", SETTINGS_ATTACHMENT)),
        }

        Ok(())
    }

    fn complete_restore(
        &self,
        run: &mut RestoreRun,
        _reader: &dyn ArchiveReader,
    ) -> BackupResult<()> {
        let mut failures = Vec::new();

        if let Some(settings) = run.pending_settings.take() {
            if let Err(e) = self.settings.save(run.aggregate_id, settings) {
                failures.push(format!("settings: {}", e));
            }
        }

        if let Err(e) = run.reservation.commit(self.names.as_ref()) {
            failures.push(format!("name index: {}", e));
        }

        for member in run.members.iter() {
            if let Err(e) = self.personal.add_aggregate(member, run.aggregate_id) {
                failures.push(format!("personal index of {}: {}", member, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BackupError::PostCommitIndex(failures.join("; ")))
        }
    }

    fn cleanup_restore(&self, run: &mut RestoreRun) -> BackupResult<()> {
        run.reservation.release(self.names.as_ref())
    }
}
