//! Current-state projection of an app
//!
//! Derived entirely from the event stream: the same stream always folds into
//! the same state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::actor::Actor;
use super::event::{AppEvent, Envelope};
use super::ids::AggregateId;

/// The live state of an app aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub id: Option<AggregateId>,
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    /// Contributor user id -> role
    pub contributors: BTreeMap<String, String>,
    pub clients: BTreeSet<String>,
    pub archived: bool,
    /// Version of the last applied event
    pub version: Option<u64>,
    pub created_by: Option<Actor>,
    pub last_modified_by: Option<Actor>,
}

impl AppState {
    /// Fold a stream into a fresh state
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a Envelope>) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply(event);
        }
        state
    }

    /// Apply one event
    pub fn apply(&mut self, event: &Envelope) {
        match event.payload() {
            AppEvent::AppCreated { app_id, name } => {
                self.id = Some(*app_id);
                self.name = name.clone();
                self.created_by = Some(event.actor().clone());
            }
            AppEvent::AppUpdated { label, description } => {
                if label.is_some() {
                    self.label = label.clone();
                }
                if description.is_some() {
                    self.description = description.clone();
                }
            }
            AppEvent::ContributorAssigned { contributor, role } => {
                self.contributors.insert(contributor.clone(), role.clone());
            }
            AppEvent::ContributorRemoved { contributor } => {
                self.contributors.remove(contributor);
            }
            AppEvent::ClientAttached { client_id } => {
                self.clients.insert(client_id.clone());
            }
            AppEvent::ClientRevoked { client_id } => {
                self.clients.remove(client_id);
            }
            AppEvent::AppArchived => {
                self.archived = true;
            }
        }

        self.version = Some(event.version());
        self.last_modified_by = Some(event.actor().clone());
    }

    /// Ids of the current contributors
    pub fn contributor_ids(&self) -> BTreeSet<String> {
        self.contributors.keys().cloned().collect()
    }
}
