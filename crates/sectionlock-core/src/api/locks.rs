//! Locks API
//!
//! | Operation | Kind | Who may call |
//! |---|---|---|
//! | `get_locks` | query | any authenticated viewer |
//! | `lock` | mutation | any authenticated editor |
//! | `unlock` | mutation | the lock holder |
//! | `unlock_all` | mutation | administrators |
//! | `on_lock_changed` | subscription | any authenticated viewer |

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{parse_resource_id, parse_section};
use crate::Result;
use crate::config::Config;
use crate::domain::identity::Principal;
use crate::domain::locking::{
    ActionType, ChangeType, LockChangeEvent, LockCoordinator, LockEntry, policy,
};
use crate::domain::subscription::{LockSubscription, SubscriptionConfig, SubscriptionManager};
use crate::infrastructure::InMemoryPubSub;

/// Lock summary for clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSummary {
    pub resource_id: String,
    pub section: String,
    pub holder: String,
    pub is_admin_holder: bool,
}

impl From<LockEntry> for LockSummary {
    fn from(entry: LockEntry) -> Self {
        Self {
            resource_id: entry.resource_id.to_string(),
            section: entry.section.as_str().to_string(),
            holder: entry.holder.to_string(),
            is_admin_holder: entry.is_admin_holder,
        }
    }
}

/// Pushed lock change for clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockChangeSummary {
    pub change_type: ChangeType,
    pub action_type: ActionType,
    pub lock: LockSummary,
    pub revision: u64,
    pub created_at: String,
}

impl From<LockChangeEvent> for LockChangeSummary {
    fn from(event: LockChangeEvent) -> Self {
        Self {
            change_type: event.change_type,
            action_type: event.action_type,
            lock: LockSummary::from(event.entry),
            revision: event.revision,
            created_at: event.created_at.to_rfc3339(),
        }
    }
}

/// Handle to the lock service, constructed once and shared by clone
#[derive(Clone)]
pub struct LockApi {
    coordinator: Arc<LockCoordinator>,
    subscriptions: SubscriptionManager,
}

impl LockApi {
    /// Wire up an in-process bus, coordinator and subscription manager
    pub fn new(config: &Config) -> Self {
        let bus = InMemoryPubSub::<LockChangeEvent>::new();
        let coordinator = Arc::new(LockCoordinator::new(Arc::new(bus.clone())));
        let subscriptions = SubscriptionManager::new(
            coordinator.clone(),
            bus,
            SubscriptionConfig::from(&config.events),
        );
        Self::from_parts(coordinator, subscriptions)
    }

    /// Build from already-wired components
    pub fn from_parts(
        coordinator: Arc<LockCoordinator>,
        subscriptions: SubscriptionManager,
    ) -> Self {
        Self {
            coordinator,
            subscriptions,
        }
    }

    /// Get the coordinator
    pub fn coordinator(&self) -> &LockCoordinator {
        &self.coordinator
    }

    /// Get the subscription manager
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Locks currently held on a resource
    pub async fn get_locks(
        &self,
        principal: &Principal,
        resource_id: &str,
    ) -> Result<Vec<LockSummary>> {
        principal.account_id()?;
        let resource_id = parse_resource_id(resource_id)?;

        let entries = self.coordinator.list(resource_id).await;
        Ok(entries.into_iter().map(LockSummary::from).collect())
    }

    /// Lock a section for editing
    pub async fn lock(
        &self,
        principal: &Principal,
        resource_id: &str,
        section: &str,
    ) -> Result<bool> {
        let resource_id = parse_resource_id(resource_id)?;
        let section = parse_section(section)?;

        self.coordinator
            .acquire(resource_id, section, principal)
            .await?;
        Ok(true)
    }

    /// Release a section the caller holds
    ///
    /// Returns false when the section was not locked.
    pub async fn unlock(
        &self,
        principal: &Principal,
        resource_id: &str,
        section: &str,
    ) -> Result<bool> {
        let account = principal.account_id()?;
        let resource_id = parse_resource_id(resource_id)?;
        let section = parse_section(section)?;

        let outcome = self.coordinator.release(resource_id, section, account).await?;
        Ok(outcome.is_released())
    }

    /// Release every lock on a resource (administrators only)
    pub async fn unlock_all(
        &self,
        principal: &Principal,
        resource_id: &str,
    ) -> Result<Vec<LockSummary>> {
        policy::authorize_release_all(principal)?;
        let resource_id = parse_resource_id(resource_id)?;

        let removed = self.coordinator.release_all(resource_id).await;
        info!(
            resource_id = %resource_id,
            admin = ?principal.account,
            count = removed.len(),
            "Administrative unlock"
        );
        Ok(removed.into_iter().map(LockSummary::from).collect())
    }

    /// Follow lock changes on a resource until `disconnect` is cancelled
    pub async fn on_lock_changed(
        &self,
        principal: &Principal,
        resource_id: &str,
        disconnect: CancellationToken,
    ) -> Result<LockSubscription> {
        let resource_id = parse_resource_id(resource_id)?;
        let subscription = self
            .subscriptions
            .subscribe(resource_id, principal.clone(), disconnect)
            .await?;
        Ok(subscription)
    }
}
