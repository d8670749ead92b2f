//! Event envelopes for app aggregates
//!
//! An [`Envelope`] is an immutable historical fact. The only sanctioned way to
//! change one is to consume it and build a new envelope through
//! [`Envelope::with_actor`] or [`Envelope::with_payload`], which the restore
//! pass does exactly once per event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::actor::Actor;
use super::ids::AggregateId;

/// The kinds of events an app aggregate records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// The app was created with its unique name
    AppCreated { app_id: AggregateId, name: String },

    /// Display metadata changed
    AppUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// A user was added as contributor, or their role changed
    ContributorAssigned { contributor: String, role: String },

    /// A user stopped being a contributor
    ContributorRemoved { contributor: String },

    /// An API client was attached
    ClientAttached { client_id: String },

    /// An API client was revoked
    ClientRevoked { client_id: String },

    /// The app was archived
    AppArchived,
}

impl AppEvent {
    /// Name of the event kind, as it appears in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            AppEvent::AppCreated { .. } => "AppCreated",
            AppEvent::AppUpdated { .. } => "AppUpdated",
            AppEvent::ContributorAssigned { .. } => "ContributorAssigned",
            AppEvent::ContributorRemoved { .. } => "ContributorRemoved",
            AppEvent::ClientAttached { .. } => "ClientAttached",
            AppEvent::ClientRevoked { .. } => "ClientRevoked",
            AppEvent::AppArchived => "AppArchived",
        }
    }

    /// User id referenced by the payload, if any
    pub fn contributor(&self) -> Option<&str> {
        match self {
            AppEvent::ContributorAssigned { contributor, .. }
            | AppEvent::ContributorRemoved { contributor } => Some(contributor),
            _ => None,
        }
    }
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// Metadata recorded alongside every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: Uuid,
    /// Position of the event in its stream, starting at 0
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    /// Who caused the event
    pub actor: Actor,
}

/// An event together with its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    payload: AppEvent,
    metadata: EventMetadata,
}

impl Envelope {
    /// Create a new envelope stamped with a fresh event id and the current time
    pub fn new(payload: AppEvent, actor: Actor, version: u64) -> Self {
        Self {
            payload,
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                version,
                timestamp: Utc::now(),
                actor,
            },
        }
    }

    pub fn from_parts(payload: AppEvent, metadata: EventMetadata) -> Self {
        Self { payload, metadata }
    }

    pub fn into_parts(self) -> (AppEvent, EventMetadata) {
        (self.payload, self.metadata)
    }

    pub fn payload(&self) -> &AppEvent {
        &self.payload
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    pub fn actor(&self) -> &Actor {
        &self.metadata.actor
    }

    pub fn version(&self) -> u64 {
        self.metadata.version
    }

    /// Consume the envelope and return one caused by a different actor
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.metadata.actor = actor;
        self
    }

    /// Consume the envelope and return one carrying a different payload
    pub fn with_payload(mut self, payload: AppEvent) -> Self {
        self.payload = payload;
        self
    }

    /// Every identity the event refers to: the metadata actor plus any user in the payload
    pub fn identity_references(&self) -> Vec<Actor> {
        let mut refs = vec![self.metadata.actor.clone()];
        if let Some(contributor) = self.payload.contributor() {
            refs.push(Actor::subject(contributor));
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_is_tagged() {
        let event = Envelope::new(
            AppEvent::ContributorAssigned {
                contributor: "u1".into(),
                role: "Owner".into(),
            },
            Actor::subject("u1"),
            1,
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["payload"]["type"], "ContributorAssigned");
        assert_eq!(value["payload"]["contributor"], "u1");
        assert_eq!(value["metadata"]["version"], 1);
    }

    #[test]
    fn test_unit_variant_parses() {
        let payload: AppEvent = serde_json::from_value(json!({"type": "AppArchived"})).unwrap();
        assert_eq!(payload, AppEvent::AppArchived);

        let payload: AppEvent = serde_json::from_value(json!({"type": "AppUpdated"})).unwrap();
        assert_eq!(
            payload,
            AppEvent::AppUpdated {
                label: None,
                description: None
            }
        );
    }

    #[test]
    fn test_with_actor_keeps_identity_of_event() {
        let event = Envelope::new(AppEvent::AppArchived, Actor::subject("u1"), 4);
        let event_id = event.metadata().event_id;

        let rewritten = event.with_actor(Actor::subject("op"));
        assert_eq!(rewritten.actor(), &Actor::subject("op"));
        assert_eq!(rewritten.metadata().event_id, event_id);
        assert_eq!(rewritten.version(), 4);
    }

    #[test]
    fn test_identity_references() {
        let event = Envelope::new(
            AppEvent::ContributorRemoved {
                contributor: "u2".into(),
            },
            Actor::client("app:default"),
            2,
        );

        assert_eq!(
            event.identity_references(),
            vec![Actor::client("app:default"), Actor::subject("u2")]
        );
    }
}
