//! Collaborator interfaces
//!
//! The engine never talks to a runtime directly. Everything that lives outside
//! the backup/restore core (identity lookups, global indexes, the event log and
//! the settings side channel) is injected through these traits. `memory`
//! provides thread-safe in-process implementations.

pub mod memory;

pub use memory::{
    InMemoryEventStore, InMemoryIdentityResolver, InMemoryNameIndex, InMemoryPersonalIndex,
    InMemorySettingsStore, InMemoryStateStore,
};

use crate::error::BackupResult;
use crate::models::{AggregateId, AppState, Envelope, Identity};

/// Resolves users of the target environment
pub trait IdentityResolver: Send + Sync {
    /// Find a user by id or lookup key (email)
    ///
    /// `Ok(None)` means the user does not exist; `Err` means the service could
    /// not answer.
    fn find_by_id_or_key(&self, key: &str) -> BackupResult<Option<Identity>>;
}

/// Global index of unique app names
pub trait NameIndex: Send + Sync {
    /// Atomically claim `name` for `id`
    ///
    /// Returns false when the name, or the id, is already claimed by a
    /// different aggregate.
    fn try_reserve(&self, id: AggregateId, name: &str) -> BackupResult<bool>;

    /// Drop a speculative claim held by `id`. Idempotent.
    fn release(&self, id: AggregateId, name: &str) -> BackupResult<()>;

    /// Register `name` for `id` permanently. Idempotent.
    ///
    /// Fails with `ReservationConflict` when another id holds or reserved the name.
    fn commit(&self, id: AggregateId, name: &str) -> BackupResult<()>;
}

/// Per-user index of the apps a user contributes to
pub trait PersonalIndex: Send + Sync {
    fn add_aggregate(&self, identity: &str, id: AggregateId) -> BackupResult<()>;
}

/// Side-channel settings keyed by aggregate id, outside the event stream
pub trait SettingsStore: Send + Sync {
    fn load(&self, id: AggregateId) -> BackupResult<Option<serde_json::Value>>;

    fn save(&self, id: AggregateId, settings: serde_json::Value) -> BackupResult<()>;
}

/// Append-only event log, one ordered stream per aggregate
pub trait EventStore: Send + Sync {
    /// Read a full stream; empty if the aggregate has no events
    fn read_stream(&self, id: AggregateId) -> BackupResult<Vec<Envelope>>;

    /// Persist a complete stream for an aggregate that has none yet
    fn append_stream(&self, id: AggregateId, events: &[Envelope]) -> BackupResult<()>;
}

/// Storage for rebuilt projections
pub trait StateStore: Send + Sync {
    fn save(&self, id: AggregateId, state: &AppState) -> BackupResult<()>;

    fn load(&self, id: AggregateId) -> BackupResult<Option<AppState>>;
}
