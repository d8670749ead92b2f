//! Identity references carried by events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BackupError;

/// What kind of principal performed an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    /// A user account
    Subject,
    /// An API client scoped to the aggregate
    Client,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorKind::Subject => write!(f, "subject"),
            ActorKind::Client => write!(f, "client"),
        }
    }
}

/// Who performed an action
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorKind,
    pub identifier: String,
}

impl Actor {
    /// Create a user actor
    pub fn subject(identifier: impl Into<String>) -> Self {
        Self {
            kind: ActorKind::Subject,
            identifier: identifier.into(),
        }
    }

    /// Create a client actor
    pub fn client(identifier: impl Into<String>) -> Self {
        Self {
            kind: ActorKind::Client,
            identifier: identifier.into(),
        }
    }

    pub fn is_subject(&self) -> bool {
        self.kind == ActorKind::Subject
    }

    pub fn is_client(&self) -> bool {
        self.kind == ActorKind::Client
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.identifier)
    }
}

impl FromStr for Actor {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, identifier) = s
            .split_once(':')
            .ok_or_else(|| BackupError::Validation(format!("Invalid actor: {}", s)))?;

        if identifier.is_empty() {
            return Err(BackupError::Validation(format!("Invalid actor: {}", s)));
        }

        match kind {
            "subject" => Ok(Self::subject(identifier)),
            "client" => Ok(Self::client(identifier)),
            _ => Err(BackupError::Validation(format!("Unknown actor kind: {}", kind))),
        }
    }
}
