//! Speculative name reservation with compensating release

use crate::error::{BackupError, BackupResult};
use crate::models::AggregateId;
use crate::services::NameIndex;

/// Tracks the name claim of one restore attempt
#[derive(Debug, Clone)]
pub struct Reservation {
    aggregate_id: AggregateId,
    name: Option<String>,
    reserved: bool,
}

impl Reservation {
    pub fn new(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id,
            name: None,
            reserved: false,
        }
    }

    /// Claim `name`; a name held by another aggregate is a conflict
    pub fn reserve(&mut self, index: &dyn NameIndex, name: &str) -> BackupResult<()> {
        self.name = Some(name.to_string());

        if !index.try_reserve(self.aggregate_id, name)? {
            tracing::warn!(aggregate = %self.aggregate_id, name, "name reservation conflict");
            return Err(BackupError::ReservationConflict {
                name: name.to_string(),
            });
        }

        self.reserved = true;
        tracing::debug!(aggregate = %self.aggregate_id, name, "name reserved");
        Ok(())
    }

    /// Give the claim back. No-op when nothing is reserved.
    pub fn release(&mut self, index: &dyn NameIndex) -> BackupResult<()> {
        if !self.reserved {
            return Ok(());
        }

        if let Some(name) = &self.name {
            index.release(self.aggregate_id, name)?;
            tracing::debug!(aggregate = %self.aggregate_id, name = name.as_str(), "name reservation released");
        }

        self.reserved = false;
        Ok(())
    }

    /// Turn the claim into a permanent registration
    pub fn commit(&mut self, index: &dyn NameIndex) -> BackupResult<()> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| BackupError::Validation("No name to register".into()))?;

        index.commit(self.aggregate_id, name)?;
        self.reserved = false;
        Ok(())
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    /// Declared name of the aggregate, once the creation event was seen
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryNameIndex;

    #[test]
    fn test_reserve_and_release() {
        let index = InMemoryNameIndex::new();
        let mut reservation = Reservation::new(AggregateId::new());

        reservation.reserve(&index, "blog").unwrap();
        assert!(reservation.is_reserved());
        assert_eq!(index.reservation_count().unwrap(), 1);

        reservation.release(&index).unwrap();
        assert!(!reservation.is_reserved());
        assert_eq!(index.reservation_count().unwrap(), 0);
    }

    #[test]
    fn test_conflict_leaves_index_unchanged() {
        let index = InMemoryNameIndex::new();
        let owner = AggregateId::new();
        index.commit(owner, "blog").unwrap();

        let mut reservation = Reservation::new(AggregateId::new());
        let err = reservation.reserve(&index, "blog").unwrap_err();

        assert!(err.is_reservation_conflict());
        assert!(!reservation.is_reserved());
        assert_eq!(index.lookup("blog").unwrap(), Some(owner));
        assert_eq!(index.reservation_count().unwrap(), 0);

        // Cleanup after a conflict must not free the other aggregate's name
        reservation.release(&index).unwrap();
        assert_eq!(index.lookup("blog").unwrap(), Some(owner));
    }

    #[test]
    fn test_release_without_reservation_is_noop() {
        let index = InMemoryNameIndex::new();
        let mut reservation = Reservation::new(AggregateId::new());

        reservation.release(&index).unwrap();
        reservation.release(&index).unwrap();
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn test_commit() {
        let index = InMemoryNameIndex::new();
        let id = AggregateId::new();
        let mut reservation = Reservation::new(id);

        assert!(reservation.commit(&index).is_err());

        reservation.reserve(&index, "blog").unwrap();
        reservation.commit(&index).unwrap();

        assert!(!reservation.is_reserved());
        assert_eq!(index.lookup("blog").unwrap(), Some(id));
    }
}
