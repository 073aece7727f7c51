//! Shared table of currently-held locks
//!
//! A single mutex covers the whole registry. Callers take the guard only
//! for the map mutation and must drop it before publishing events.

use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};

use super::types::{LockEntry, ResourceId, Section};

/// Registry contents, reachable only through [`LockRegistry::lock`]
#[derive(Debug, Default)]
pub struct RegistryState {
    locks: HashMap<ResourceId, HashMap<Section, LockEntry>>,
    revision: u64,
}

impl RegistryState {
    /// Copy of the entry for a pair, if any
    pub fn get(&self, resource_id: ResourceId, section: Section) -> Option<LockEntry> {
        self.locks
            .get(&resource_id)
            .and_then(|sections| sections.get(&section))
            .cloned()
    }

    /// Insert or overwrite the entry for a pair
    pub fn set(&mut self, resource_id: ResourceId, section: Section, entry: LockEntry) {
        self.locks
            .entry(resource_id)
            .or_default()
            .insert(section, entry);
    }

    /// Remove the entry for a pair, returning it
    pub fn delete(&mut self, resource_id: ResourceId, section: Section) -> Option<LockEntry> {
        let sections = self.locks.get_mut(&resource_id)?;
        let removed = sections.remove(&section);
        if sections.is_empty() {
            self.locks.remove(&resource_id);
        }
        removed
    }

    /// Copies of every entry for a resource, ordered by section
    pub fn list_entries(&self, resource_id: ResourceId) -> Vec<LockEntry> {
        let mut entries: Vec<LockEntry> = self
            .locks
            .get(&resource_id)
            .map(|sections| sections.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by_key(|entry| entry.section);
        entries
    }

    /// Remove every entry for a resource, returning copies ordered by section
    pub fn delete_all(&mut self, resource_id: ResourceId) -> Vec<LockEntry> {
        let mut entries: Vec<LockEntry> = self
            .locks
            .remove(&resource_id)
            .map(|sections| sections.into_values().collect())
            .unwrap_or_default();
        entries.sort_by_key(|entry| entry.section);
        entries
    }

    /// Advance and return the registry revision
    pub fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// Process-wide lock table guarded by one mutex
#[derive(Debug, Default)]
pub struct LockRegistry {
    state: Mutex<RegistryState>,
}

impl LockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the registry's critical section
    pub(crate) async fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().await
    }

    /// Copies of every entry for a resource
    pub async fn list_entries(&self, resource_id: ResourceId) -> Vec<LockEntry> {
        self.lock().await.list_entries(resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(resource_id: ResourceId, section: Section, holder: &str) -> LockEntry {
        LockEntry::new(resource_id, section, holder.into(), false)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let registry = LockRegistry::new();
        let resource_id = Uuid::new_v4();

        let mut state = registry.lock().await;
        assert!(state.get(resource_id, Section::Team).is_none());

        state.set(resource_id, Section::Team, entry(resource_id, Section::Team, "ABCD"));
        assert_eq!(
            state.get(resource_id, Section::Team).unwrap().holder.as_str(),
            "ABCD"
        );

        let removed = state.delete(resource_id, Section::Team).unwrap();
        assert_eq!(removed.holder.as_str(), "ABCD");
        assert!(state.get(resource_id, Section::Team).is_none());
        assert!(state.locks.is_empty());
    }

    #[tokio::test]
    async fn test_list_returns_copies() {
        let registry = LockRegistry::new();
        let resource_id = Uuid::new_v4();

        {
            let mut state = registry.lock().await;
            state.set(resource_id, Section::Team, entry(resource_id, Section::Team, "ABCD"));
            state.set(resource_id, Section::Data, entry(resource_id, Section::Data, "USR1"));
        }

        let mut listed = registry.list_entries(resource_id).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].section, Section::Data);

        listed[0].holder = "MUTATED".into();
        let again = registry.list_entries(resource_id).await;
        assert_eq!(again[0].holder.as_str(), "USR1");
    }

    #[tokio::test]
    async fn test_delete_all_and_revision() {
        let registry = LockRegistry::new();
        let resource_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut state = registry.lock().await;
        state.set(resource_id, Section::Team, entry(resource_id, Section::Team, "A"));
        state.set(resource_id, Section::Data, entry(resource_id, Section::Data, "B"));
        state.set(other, Section::Team, entry(other, Section::Team, "C"));

        let removed = state.delete_all(resource_id);
        assert_eq!(removed.len(), 2);
        assert!(state.list_entries(resource_id).is_empty());
        assert_eq!(state.list_entries(other).len(), 1);

        assert_eq!(state.next_revision(), 1);
        assert_eq!(state.next_revision(), 2);
    }
}
