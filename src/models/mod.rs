//! Core data models for app-backup
//!
//! This module contains the event model of app aggregates, the identities
//! those events refer to, and the projection rebuilt from a stream.

pub mod actor;
pub mod event;
pub mod identity;
pub mod ids;
pub mod name;
pub mod state;

pub use actor::{Actor, ActorKind};
pub use event::{AppEvent, Envelope, EventMetadata};
pub use identity::Identity;
pub use ids::AggregateId;
pub use name::{validate_name, NameValidationError};
pub use state::AppState;
