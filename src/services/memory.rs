//! In-memory collaborator implementations
//!
//! Thread-safe, lock-based stand-ins for the external services. Each keeps the
//! contract of its trait so the engine behaves the same against them as
//! against a real runtime.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::{BackupError, BackupResult};
use crate::models::{AggregateId, AppState, Envelope, Identity};

use super::{EventStore, IdentityResolver, NameIndex, PersonalIndex, SettingsStore, StateStore};

fn read_lock_error<E: std::fmt::Display>(e: E) -> BackupError {
    BackupError::Storage(format!("Failed to acquire read lock: {}", e))
}

fn write_lock_error<E: std::fmt::Display>(e: E) -> BackupError {
    BackupError::Storage(format!("Failed to acquire write lock: {}", e))
}

/// Identity service backed by a fixed list of users
#[derive(Default)]
pub struct InMemoryIdentityResolver {
    users: RwLock<Vec<Identity>>,
    lookups: AtomicUsize,
}

impl InMemoryIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().collect()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn add_user(&self, identity: Identity) -> BackupResult<()> {
        let mut users = self.users.write().map_err(write_lock_error)?;
        users.push(identity);
        Ok(())
    }

    /// Number of lookups served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl IdentityResolver for InMemoryIdentityResolver {
    fn find_by_id_or_key(&self, key: &str) -> BackupResult<Option<Identity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let users = self.users.read().map_err(read_lock_error)?;
        Ok(users.iter().find(|u| u.matches(key)).cloned())
    }
}

#[derive(Default)]
struct NameTable {
    /// name -> owner, committed
    committed: HashMap<String, AggregateId>,
    /// name -> owner, reserved during a restore
    reserved: HashMap<String, AggregateId>,
}

impl NameTable {
    fn owner(&self, name: &str) -> Option<AggregateId> {
        self.committed
            .get(name)
            .or_else(|| self.reserved.get(name))
            .copied()
    }

    fn id_taken_elsewhere(&self, id: AggregateId, name: &str) -> bool {
        self.committed
            .iter()
            .chain(self.reserved.iter())
            .any(|(other_name, owner)| *owner == id && other_name != name)
    }
}

/// Name index with atomic compare-and-claim reservations
#[derive(Default)]
pub struct InMemoryNameIndex {
    table: RwLock<NameTable>,
}

impl InMemoryNameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner of a committed name
    pub fn lookup(&self, name: &str) -> BackupResult<Option<AggregateId>> {
        let table = self.table.read().map_err(read_lock_error)?;
        Ok(table.committed.get(name).copied())
    }

    /// Owner of a pending reservation
    pub fn reservation(&self, name: &str) -> BackupResult<Option<AggregateId>> {
        let table = self.table.read().map_err(read_lock_error)?;
        Ok(table.reserved.get(name).copied())
    }

    /// Number of pending reservations
    pub fn reservation_count(&self) -> BackupResult<usize> {
        let table = self.table.read().map_err(read_lock_error)?;
        Ok(table.reserved.len())
    }

    /// Number of committed names
    pub fn len(&self) -> BackupResult<usize> {
        let table = self.table.read().map_err(read_lock_error)?;
        Ok(table.committed.len())
    }

    pub fn is_empty(&self) -> BackupResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl NameIndex for InMemoryNameIndex {
    fn try_reserve(&self, id: AggregateId, name: &str) -> BackupResult<bool> {
        let mut table = self.table.write().map_err(write_lock_error)?;

        if let Some(owner) = table.owner(name) {
            return Ok(owner == id);
        }

        if table.id_taken_elsewhere(id, name) {
            return Ok(false);
        }

        table.reserved.insert(name.to_string(), id);
        Ok(true)
    }

    fn release(&self, id: AggregateId, name: &str) -> BackupResult<()> {
        let mut table = self.table.write().map_err(write_lock_error)?;

        if table.reserved.get(name) == Some(&id) {
            table.reserved.remove(name);
        }
        Ok(())
    }

    fn commit(&self, id: AggregateId, name: &str) -> BackupResult<()> {
        let mut table = self.table.write().map_err(write_lock_error)?;

        if let Some(owner) = table.owner(name) {
            if owner != id {
                return Err(BackupError::ReservationConflict {
                    name: name.to_string(),
                });
            }
        }

        table.reserved.remove(name);
        table.committed.insert(name.to_string(), id);
        Ok(())
    }
}

/// Personal indexes for every user
#[derive(Default)]
pub struct InMemoryPersonalIndex {
    data: RwLock<HashMap<String, BTreeSet<AggregateId>>>,
}

impl InMemoryPersonalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregates registered for a user
    pub fn aggregates_for(&self, identity: &str) -> BackupResult<BTreeSet<AggregateId>> {
        let data = self.data.read().map_err(read_lock_error)?;
        Ok(data.get(identity).cloned().unwrap_or_default())
    }

    /// Total number of registrations across all users
    pub fn registration_count(&self) -> BackupResult<usize> {
        let data = self.data.read().map_err(read_lock_error)?;
        Ok(data.values().map(BTreeSet::len).sum())
    }
}

impl PersonalIndex for InMemoryPersonalIndex {
    fn add_aggregate(&self, identity: &str, id: AggregateId) -> BackupResult<()> {
        let mut data = self.data.write().map_err(write_lock_error)?;
        data.entry(identity.to_string()).or_default().insert(id);
        Ok(())
    }
}

/// Settings side channel
#[derive(Default)]
pub struct InMemorySettingsStore {
    data: RwLock<HashMap<AggregateId, serde_json::Value>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn load(&self, id: AggregateId) -> BackupResult<Option<serde_json::Value>> {
        let data = self.data.read().map_err(read_lock_error)?;
        Ok(data.get(&id).cloned())
    }

    fn save(&self, id: AggregateId, settings: serde_json::Value) -> BackupResult<()> {
        let mut data = self.data.write().map_err(write_lock_error)?;
        data.insert(id, settings);
        Ok(())
    }
}

/// Event log holding every stream in memory
#[derive(Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AggregateId, Vec<Envelope>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append events to a stream, creating it if needed
    pub fn append(&self, id: AggregateId, events: impl IntoIterator<Item = Envelope>) -> BackupResult<()> {
        let mut streams = self.streams.write().map_err(write_lock_error)?;
        streams.entry(id).or_default().extend(events);
        Ok(())
    }

    pub fn contains(&self, id: AggregateId) -> BackupResult<bool> {
        let streams = self.streams.read().map_err(read_lock_error)?;
        Ok(streams.get(&id).map_or(false, |s| !s.is_empty()))
    }
}

impl EventStore for InMemoryEventStore {
    fn read_stream(&self, id: AggregateId) -> BackupResult<Vec<Envelope>> {
        let streams = self.streams.read().map_err(read_lock_error)?;
        Ok(streams.get(&id).cloned().unwrap_or_default())
    }

    fn append_stream(&self, id: AggregateId, events: &[Envelope]) -> BackupResult<()> {
        let mut streams = self.streams.write().map_err(write_lock_error)?;

        if streams.get(&id).map_or(false, |s| !s.is_empty()) {
            return Err(BackupError::Validation(format!(
                "Aggregate {} already has an event stream",
                id
            )));
        }

        streams.insert(id, events.to_vec());
        Ok(())
    }
}

/// Projection storage
#[derive(Default)]
pub struct InMemoryStateStore {
    data: RwLock<HashMap<AggregateId, AppState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn save(&self, id: AggregateId, state: &AppState) -> BackupResult<()> {
        let mut data = self.data.write().map_err(write_lock_error)?;
        data.insert(id, state.clone());
        Ok(())
    }

    fn load(&self, id: AggregateId) -> BackupResult<Option<AppState>> {
        let data = self.data.read().map_err(read_lock_error)?;
        Ok(data.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Actor, AppEvent};

    #[test]
    fn test_name_index_conflict() {
        let index = InMemoryNameIndex::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        assert!(index.try_reserve(first, "blog").unwrap());
        assert!(!index.try_reserve(second, "blog").unwrap());
        // Reserving again under the same id confirms the claim
        assert!(index.try_reserve(first, "blog").unwrap());
    }

    #[test]
    fn test_name_index_release_frees_name() {
        let index = InMemoryNameIndex::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        index.try_reserve(first, "blog").unwrap();
        index.release(second, "blog").unwrap();
        assert_eq!(index.reservation("blog").unwrap(), Some(first));

        index.release(first, "blog").unwrap();
        index.release(first, "blog").unwrap();
        assert!(index.try_reserve(second, "blog").unwrap());
    }

    #[test]
    fn test_name_index_commit() {
        let index = InMemoryNameIndex::new();
        let id = AggregateId::new();

        index.try_reserve(id, "blog").unwrap();
        index.commit(id, "blog").unwrap();
        index.commit(id, "blog").unwrap();

        assert_eq!(index.lookup("blog").unwrap(), Some(id));
        assert_eq!(index.reservation_count().unwrap(), 0);

        // Released reservations never touch committed names
        index.release(id, "blog").unwrap();
        assert_eq!(index.lookup("blog").unwrap(), Some(id));
        assert!(!index.try_reserve(AggregateId::new(), "blog").unwrap());
    }

    #[test]
    fn test_commit_rejects_name_reserved_by_another() {
        let index = InMemoryNameIndex::new();
        let holder = AggregateId::new();
        let other = AggregateId::new();

        assert!(index.try_reserve(holder, "blog").unwrap());

        let err = index.commit(other, "blog").unwrap_err();
        assert!(err.is_reservation_conflict());
        assert_eq!(index.reservation("blog").unwrap(), Some(holder));
        assert!(index.lookup("blog").unwrap().is_none());

        index.commit(holder, "blog").unwrap();
        assert_eq!(index.lookup("blog").unwrap(), Some(holder));
    }

    #[test]
    fn test_name_index_rejects_taken_id() {
        let index = InMemoryNameIndex::new();
        let id = AggregateId::new();

        index.commit(id, "blog").unwrap();
        assert!(!index.try_reserve(id, "other-name").unwrap());
    }

    #[test]
    fn test_resolver_counts_lookups() {
        let resolver = InMemoryIdentityResolver::with_users([Identity::new("t2", "u2@example.com")]);

        assert_eq!(
            resolver.find_by_id_or_key("U2@example.com").unwrap(),
            Some(Identity::new("t2", "u2@example.com"))
        );
        assert!(resolver.find_by_id_or_key("u1@example.com").unwrap().is_none());
        assert_eq!(resolver.lookups(), 2);
    }

    #[test]
    fn test_personal_index() {
        let index = InMemoryPersonalIndex::new();
        let id = AggregateId::new();

        index.add_aggregate("t2", id).unwrap();
        index.add_aggregate("t2", id).unwrap();

        assert_eq!(index.aggregates_for("t2").unwrap(), BTreeSet::from([id]));
        assert!(index.aggregates_for("op").unwrap().is_empty());
        assert_eq!(index.registration_count().unwrap(), 1);
    }

    #[test]
    fn test_event_store_append_stream_requires_fresh_id() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let events = vec![Envelope::new(AppEvent::AppArchived, Actor::subject("u1"), 0)];

        store.append_stream(id, &events).unwrap();
        assert!(store.contains(id).unwrap());
        assert!(store.append_stream(id, &events).unwrap_err().is_validation());
        assert_eq!(store.read_stream(id).unwrap().len(), 1);
        assert!(store.read_stream(AggregateId::new()).unwrap().is_empty());
    }
}
