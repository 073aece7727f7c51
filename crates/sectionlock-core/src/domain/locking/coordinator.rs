//! Lock coordinator
//!
//! Implements ownership and conflict rules on top of the [`LockRegistry`]:
//! - at most one holder per (resource, section)
//! - re-acquiring your own lock is a silent refresh
//! - only the holder may release through the normal path
//! - administrators may bulk-release a whole resource
//!
//! Every registry mutation happens inside the registry's critical
//! section; the resulting event is published after the guard is dropped.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::event::{ActionType, LOCK_CHANGED_EVENT, LockChangeEvent};
use super::policy;
use super::registry::LockRegistry;
use super::types::{
    AccountId, AcquireOutcome, LockEntry, LockError, LockResult, ReleaseOutcome, ResourceId,
    Section,
};
use crate::domain::events::EventPublisher;
use crate::domain::identity::Principal;

/// Coordinates exclusive editing locks on resource sections
pub struct LockCoordinator {
    registry: LockRegistry,
    publisher: Arc<dyn EventPublisher<LockChangeEvent>>,
}

impl LockCoordinator {
    /// Create a coordinator with an empty registry
    pub fn new(publisher: Arc<dyn EventPublisher<LockChangeEvent>>) -> Self {
        Self {
            registry: LockRegistry::new(),
            publisher,
        }
    }

    /// Acquire the lock on a section for `principal`
    ///
    /// Succeeds with [`AcquireOutcome::Refreshed`] without publishing when
    /// the principal already holds it.
    pub async fn acquire(
        &self,
        resource_id: ResourceId,
        section: Section,
        principal: &Principal,
    ) -> LockResult<AcquireOutcome> {
        let account = principal.account_id()?;

        let event = {
            let mut state = self.registry.lock().await;
            match state.get(resource_id, section) {
                Some(existing) if existing.is_held_by(account) => {
                    state.set(resource_id, section, existing);
                    None
                }
                Some(existing) => {
                    debug!(
                        resource_id = %resource_id,
                        section = %section,
                        holder = %existing.holder,
                        requester = %account,
                        "Lock contention"
                    );
                    return Err(LockError::Conflict {
                        resource: resource_id,
                        section,
                        holder: existing.holder,
                    });
                }
                None => {
                    let entry =
                        LockEntry::new(resource_id, section, account.clone(), principal.is_admin);
                    state.set(resource_id, section, entry.clone());
                    Some(LockChangeEvent::added(entry, state.next_revision()))
                }
            }
        };

        match event {
            Some(event) => {
                info!(
                    resource_id = %resource_id,
                    section = %section,
                    holder = %account,
                    revision = event.revision,
                    "Lock acquired"
                );
                self.publish(event).await;
                Ok(AcquireOutcome::Acquired)
            }
            None => {
                debug!(
                    resource_id = %resource_id,
                    section = %section,
                    holder = %account,
                    "Lock refreshed by holder"
                );
                Ok(AcquireOutcome::Refreshed)
            }
        }
    }

    /// Release a section held by `requester`
    ///
    /// Releasing an unlocked section is not an error.
    pub async fn release(
        &self,
        resource_id: ResourceId,
        section: Section,
        requester: &AccountId,
    ) -> LockResult<ReleaseOutcome> {
        let event = {
            let mut state = self.registry.lock().await;
            let Some(existing) = state.get(resource_id, section) else {
                return Ok(ReleaseOutcome::NotLocked);
            };
            let action_type = policy::authorize_release(requester, &existing)?;
            state.delete(resource_id, section);
            LockChangeEvent::removed(existing, action_type, state.next_revision())
        };

        info!(
            resource_id = %resource_id,
            section = %section,
            holder = %requester,
            revision = event.revision,
            "Lock released"
        );
        self.publish(event).await;
        Ok(ReleaseOutcome::Released)
    }

    /// Remove every lock on a resource regardless of holder
    ///
    /// The caller is responsible for checking administrative privilege.
    /// Returns copies of the removed entries.
    pub async fn release_all(&self, resource_id: ResourceId) -> Vec<LockEntry> {
        let (removed, events) = {
            let mut state = self.registry.lock().await;
            let removed = state.delete_all(resource_id);
            let events: Vec<LockChangeEvent> = removed
                .iter()
                .map(|entry| {
                    let revision = state.next_revision();
                    LockChangeEvent::removed(entry.clone(), ActionType::Admin, revision)
                })
                .collect();
            (removed, events)
        };

        if !removed.is_empty() {
            info!(
                resource_id = %resource_id,
                count = removed.len(),
                "All locks force-released"
            );
        }
        for event in events {
            self.publish(event).await;
        }
        removed
    }

    /// Copies of every lock currently held on a resource
    pub async fn list(&self, resource_id: ResourceId) -> Vec<LockEntry> {
        self.registry.list_entries(resource_id).await
    }

    async fn publish(&self, event: LockChangeEvent) {
        let resource_id = event.entry.resource_id;
        if let Err(e) = self
            .publisher
            .publish(resource_id, LOCK_CHANGED_EVENT, event)
            .await
        {
            warn!(resource_id = %resource_id, error = %e, "Failed to publish lock change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::RecordingPublisher;
    use crate::domain::locking::event::ChangeType;
    use uuid::Uuid;

    fn create_test_coordinator() -> (LockCoordinator, Arc<RecordingPublisher<LockChangeEvent>>) {
        let publisher = Arc::new(RecordingPublisher::new());
        (LockCoordinator::new(publisher.clone()), publisher)
    }

    #[tokio::test]
    async fn test_acquire_creates_entry_and_publishes() {
        let (coordinator, publisher) = create_test_coordinator();
        let resource_id = Uuid::new_v4();

        let outcome = coordinator
            .acquire(resource_id, Section::BusinessInformation, &Principal::user("ABCD"))
            .await
            .expect("Failed to acquire lock");
        assert_eq!(outcome, AcquireOutcome::Acquired);

        assert_eq!(
            coordinator.list(resource_id).await,
            vec![LockEntry::new(
                resource_id,
                Section::BusinessInformation,
                "ABCD".into(),
                false
            )]
        );

        let events = publisher.events_for(resource_id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change_type, ChangeType::Added);
        assert_eq!(events[0].action_type, ActionType::Normal);
        assert_eq!(publisher.all_events()[0].event_type, LOCK_CHANGED_EVENT);
    }

    #[tokio::test]
    async fn test_reacquire_is_silent() {
        let (coordinator, publisher) = create_test_coordinator();
        let resource_id = Uuid::new_v4();
        let principal = Principal::user("ABCD");

        coordinator
            .acquire(resource_id, Section::Team, &principal)
            .await
            .unwrap();
        let outcome = coordinator
            .acquire(resource_id, Section::Team, &principal)
            .await
            .unwrap();

        assert_eq!(outcome, AcquireOutcome::Refreshed);
        assert_eq!(publisher.len(), 1);
        assert_eq!(coordinator.list(resource_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_names_holder() {
        let (coordinator, publisher) = create_test_coordinator();
        let resource_id = Uuid::new_v4();

        coordinator
            .acquire(resource_id, Section::Team, &Principal::user("ABCD"))
            .await
            .unwrap();
        let err = coordinator
            .acquire(resource_id, Section::Team, &Principal::user("USR1"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            LockError::Conflict {
                resource: resource_id,
                section: Section::Team,
                holder: "ABCD".into(),
            }
        );
        assert_eq!(publisher.len(), 1);
        assert_eq!(coordinator.list(resource_id).await[0].holder.as_str(), "ABCD");
    }

    #[tokio::test]
    async fn test_missing_identity_does_not_mutate() {
        let (coordinator, publisher) = create_test_coordinator();
        let resource_id = Uuid::new_v4();

        let err = coordinator
            .acquire(resource_id, Section::Data, &Principal::anonymous())
            .await
            .unwrap_err();

        assert_eq!(err, LockError::MissingIdentity);
        assert!(coordinator.list(resource_id).await.is_empty());
        assert!(publisher.is_empty());
    }

    #[tokio::test]
    async fn test_admin_flag_recorded_on_entry() {
        let (coordinator, _publisher) = create_test_coordinator();
        let resource_id = Uuid::new_v4();

        coordinator
            .acquire(resource_id, Section::Data, &Principal::admin("ADMN"))
            .await
            .unwrap();

        assert!(coordinator.list(resource_id).await[0].is_admin_holder);
    }

    #[tokio::test]
    async fn test_release_rules() {
        let (coordinator, publisher) = create_test_coordinator();
        let resource_id = Uuid::new_v4();
        let holder = AccountId::from("ABCD");

        assert_eq!(
            coordinator
                .release(resource_id, Section::Team, &holder)
                .await
                .unwrap(),
            ReleaseOutcome::NotLocked
        );

        coordinator
            .acquire(resource_id, Section::Team, &Principal::user("ABCD"))
            .await
            .unwrap();

        let err = coordinator
            .release(resource_id, Section::Team, &"USR1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NotAuthorized { .. }));
        assert_eq!(coordinator.list(resource_id).await.len(), 1);

        assert_eq!(
            coordinator
                .release(resource_id, Section::Team, &holder)
                .await
                .unwrap(),
            ReleaseOutcome::Released
        );
        assert!(coordinator.list(resource_id).await.is_empty());

        let events = publisher.events_for(resource_id);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].change_type, ChangeType::Removed);
        assert_eq!(events[1].action_type, ActionType::Normal);
        assert!(events[0].revision < events[1].revision);
    }

    #[tokio::test]
    async fn test_release_all_snapshots_and_tags_admin() {
        let (coordinator, publisher) = create_test_coordinator();
        let resource_id = Uuid::new_v4();
        let untouched = Uuid::new_v4();

        for (section, account) in [
            (Section::Team, "A"),
            (Section::Data, "B"),
            (Section::Contracts, "C"),
        ] {
            coordinator
                .acquire(resource_id, section, &Principal::user(account))
                .await
                .unwrap();
        }
        coordinator
            .acquire(untouched, Section::Team, &Principal::user("A"))
            .await
            .unwrap();
        publisher.clear();

        let removed = coordinator.release_all(resource_id).await;

        assert_eq!(removed.len(), 3);
        assert!(coordinator.list(resource_id).await.is_empty());
        assert_eq!(coordinator.list(untouched).await.len(), 1);

        let events = publisher.events_for(resource_id);
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| e.change_type == ChangeType::Removed && e.action_type == ActionType::Admin));
    }

    #[tokio::test]
    async fn test_release_all_on_empty_resource() {
        let (coordinator, publisher) = create_test_coordinator();

        assert!(coordinator.release_all(Uuid::new_v4()).await.is_empty());
        assert!(publisher.is_empty());
    }
}
