//! User identities as known to the target environment

use serde::{Deserialize, Serialize};

use super::actor::Actor;

/// A user returned by the identity resolution service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User id in the environment that owns this identity
    pub id: String,
    /// Lookup key that survives moving between environments
    pub email: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    /// The actor this identity acts as
    pub fn to_actor(&self) -> Actor {
        Actor::subject(self.id.clone())
    }

    /// Check whether a key refers to this identity (id or email, email case-insensitive)
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.email.eq_ignore_ascii_case(key)
    }
}
