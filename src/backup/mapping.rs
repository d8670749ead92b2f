//! Identity remapping for one restore run
//!
//! Users from the source environment are translated into users of the target
//! environment through the lookup table captured at backup time (user id ->
//! email). Every outcome, including fallbacks, is memoized: once a user is
//! mapped, the resolution service is never asked about it again during the
//! run, so a flaky or changing service cannot make one restored aggregate
//! internally inconsistent.

use std::collections::{BTreeMap, HashMap};

use crate::models::Actor;
use crate::services::IdentityResolver;

/// Memoized historical -> target identity table
#[derive(Debug, Clone)]
pub struct UserMapping {
    initiator: Actor,
    lookup: BTreeMap<String, String>,
    mapped: HashMap<String, Actor>,
    fallbacks: usize,
}

impl UserMapping {
    /// Create an empty mapping that falls back to `initiator`
    pub fn new(initiator: Actor) -> Self {
        Self {
            initiator,
            lookup: BTreeMap::new(),
            mapped: HashMap::new(),
            fallbacks: 0,
        }
    }

    /// The restoring actor, used whenever a user cannot be resolved
    pub fn initiator(&self) -> &Actor {
        &self.initiator
    }

    /// Install the user id -> lookup key table from the archive
    pub fn load_lookup(&mut self, lookup: BTreeMap<String, String>) {
        self.lookup.extend(lookup);
    }

    /// Resolve every user of the lookup table up front
    pub fn resolve_all(&mut self, resolver: &dyn IdentityResolver) {
        let users: Vec<String> = self.lookup.keys().cloned().collect();
        for user in users {
            self.map_user(resolver, &user);
        }
    }

    /// Map a historical user id to an actor of the target environment
    pub fn map_user(&mut self, resolver: &dyn IdentityResolver, user_id: &str) -> Actor {
        if let Some(actor) = self.mapped.get(user_id) {
            return actor.clone();
        }

        let resolved = self.resolve(resolver, user_id);
        let actor = match resolved {
            Some(actor) => actor,
            None => {
                self.fallbacks += 1;
                self.initiator.clone()
            }
        };

        self.mapped.insert(user_id.to_string(), actor.clone());
        actor
    }

    /// Map any actor; clients are scoped to the aggregate and kept as they are
    pub fn map_actor(&mut self, resolver: &dyn IdentityResolver, actor: &Actor) -> Actor {
        if actor.is_client() {
            return actor.clone();
        }
        self.map_user(resolver, &actor.identifier)
    }

    /// Whether a user already has a memoized mapping
    pub fn is_mapped(&self, user_id: &str) -> bool {
        self.mapped.contains_key(user_id)
    }

    /// The memoized mapping of a user, if any
    pub fn get(&self, user_id: &str) -> Option<&Actor> {
        self.mapped.get(user_id)
    }

    /// Number of users mapped so far
    pub fn len(&self) -> usize {
        self.mapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapped.is_empty()
    }

    /// Number of users that fell back to the initiator
    pub fn fallback_count(&self) -> usize {
        self.fallbacks
    }

    fn resolve(&self, resolver: &dyn IdentityResolver, user_id: &str) -> Option<Actor> {
        let key = match self.lookup.get(user_id) {
            Some(key) => key,
            None => {
                tracing::debug!(user = user_id, "no lookup key for user, using initiator");
                return None;
            }
        };

        match resolver.find_by_id_or_key(key) {
            Ok(Some(identity)) => {
                tracing::debug!(user = user_id, target = %identity.id, "user resolved");
                Some(identity.to_actor())
            }
            Ok(None) => {
                tracing::debug!(user = user_id, "user not found in target, using initiator");
                None
            }
            Err(e) => {
                tracing::warn!(user = user_id, error = %e, "identity resolution unavailable, using initiator");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackupError, BackupResult};
    use crate::models::Identity;
    use crate::services::InMemoryIdentityResolver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lookup() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("u1".to_string(), "u1@example.com".to_string()),
            ("u2".to_string(), "u2@example.com".to_string()),
        ])
    }

    /// Answers differently on every call and fails every other time
    struct FlakyResolver {
        calls: AtomicUsize,
    }

    impl IdentityResolver for FlakyResolver {
        fn find_by_id_or_key(&self, _key: &str) -> BackupResult<Option<Identity>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 1 {
                return Err(BackupError::ResolutionUnavailable("timeout".into()));
            }
            Ok(Some(Identity::new(format!("t{}", call), "x@example.com")))
        }
    }

    #[test]
    fn test_resolves_through_lookup_key() {
        let resolver = InMemoryIdentityResolver::with_users([Identity::new("t2", "u2@example.com")]);
        let mut mapping = UserMapping::new(Actor::subject("op"));
        mapping.load_lookup(lookup());

        assert_eq!(mapping.map_user(&resolver, "u2"), Actor::subject("t2"));
        assert_eq!(mapping.map_user(&resolver, "u1"), Actor::subject("op"));
        assert_eq!(mapping.fallback_count(), 1);
    }

    #[test]
    fn test_unknown_user_falls_back_without_lookup() {
        let resolver = InMemoryIdentityResolver::new();
        let mut mapping = UserMapping::new(Actor::subject("op"));

        assert_eq!(mapping.map_user(&resolver, "ghost"), Actor::subject("op"));
        assert_eq!(resolver.lookups(), 0);
        assert!(mapping.is_mapped("ghost"));
    }

    #[test]
    fn test_memoizes_every_outcome() {
        let resolver = InMemoryIdentityResolver::with_users([Identity::new("t2", "u2@example.com")]);
        let mut mapping = UserMapping::new(Actor::subject("op"));
        mapping.load_lookup(lookup());

        for _ in 0..5 {
            mapping.map_user(&resolver, "u1");
            mapping.map_user(&resolver, "u2");
        }

        assert_eq!(resolver.lookups(), 2);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_resolve_all_prefetches() {
        let resolver = InMemoryIdentityResolver::with_users([Identity::new("t2", "u2@example.com")]);
        let mut mapping = UserMapping::new(Actor::subject("op"));
        mapping.load_lookup(lookup());

        mapping.resolve_all(&resolver);
        assert_eq!(resolver.lookups(), 2);

        assert_eq!(mapping.map_user(&resolver, "u2"), Actor::subject("t2"));
        assert_eq!(resolver.lookups(), 2);
    }

    #[test]
    fn test_unstable_resolver_stays_consistent() {
        let resolver = FlakyResolver {
            calls: AtomicUsize::new(0),
        };
        let mut mapping = UserMapping::new(Actor::subject("op"));
        mapping.load_lookup(lookup());

        let first = mapping.map_user(&resolver, "u1");
        let failed = mapping.map_user(&resolver, "u2");

        assert_eq!(first, Actor::subject("t0"));
        assert_eq!(failed, Actor::subject("op"));
        for _ in 0..3 {
            assert_eq!(mapping.map_user(&resolver, "u1"), first);
            assert_eq!(mapping.map_user(&resolver, "u2"), failed);
        }
    }

    #[test]
    fn test_clients_pass_through() {
        let resolver = InMemoryIdentityResolver::new();
        let mut mapping = UserMapping::new(Actor::subject("op"));

        let client = Actor::client("blog:default");
        assert_eq!(mapping.map_actor(&resolver, &client), client);
        assert!(mapping.is_empty());
    }
}
