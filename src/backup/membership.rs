//! Active-membership tracking during restore

use std::collections::BTreeSet;

use crate::models::{AppEvent, Envelope};

/// Users that are contributors at the current point of the replayed stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSet {
    members: BTreeSet<String>,
    assignments_seen: usize,
}

impl MembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the add/remove events of a stream in order
    pub fn fold<'a>(events: impl IntoIterator<Item = &'a Envelope>) -> Self {
        let mut set = Self::new();
        for event in events {
            match event.payload() {
                AppEvent::ContributorAssigned { contributor, .. } => set.add(contributor.clone()),
                AppEvent::ContributorRemoved { contributor } => set.remove(contributor),
                _ => {}
            }
        }
        set
    }

    /// True until the first assignment has been recorded
    pub fn is_first_assignment(&self) -> bool {
        self.assignments_seen == 0
    }

    pub fn add(&mut self, user: String) {
        self.assignments_seen += 1;
        self.members.insert(user);
    }

    pub fn remove(&mut self, user: &str) {
        self.members.remove(user);
    }

    pub fn contains(&self, user: &str) -> bool {
        self.members.contains(user)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    pub fn assignments_seen(&self) -> usize {
        self.assignments_seen
    }
}
