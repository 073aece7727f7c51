//! Subscription manager
//!
//! Binds live connections to a resource's lock-change stream and, when a
//! connection's disconnect signal fires, releases every lock that
//! connection's account still holds on the resource.

use futures_core::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};
use uuid::Uuid;

use super::subscriber::LockSubscriber;
use crate::config::EventsConfig;
use crate::domain::events::EventSubscriber;
use crate::domain::identity::Principal;
use crate::domain::locking::{
    AccountId, LOCK_CHANGED_EVENT, LockChangeEvent, LockCoordinator, LockResult, ReleaseOutcome,
    ResourceId, Section,
};
use crate::infrastructure::InMemoryPubSub;

/// Per-subscriber delivery settings
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Capacity of each subscriber's event channel
    pub buffer: usize,
    /// How long one delivery may wait on a full channel
    pub delivery_timeout: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer: 64,
            delivery_timeout: Duration::from_millis(1000),
        }
    }
}

impl From<&EventsConfig> for SubscriptionConfig {
    fn from(events: &EventsConfig) -> Self {
        Self {
            buffer: events.subscriber_buffer.max(1),
            delivery_timeout: Duration::from_millis(events.delivery_timeout_ms),
        }
    }
}

/// Outcome of releasing a disconnected subscriber's locks
#[derive(Debug, Clone)]
pub struct CleanupReport {
    /// Resource the subscriber was watching
    pub resource_id: ResourceId,

    /// Account whose locks were released
    pub account: Option<AccountId>,

    /// Sections that were released
    pub released: Vec<Section>,

    /// Per-section failures (non-fatal)
    pub warnings: Vec<String>,
}

impl CleanupReport {
    fn new(resource_id: ResourceId, account: Option<AccountId>) -> Self {
        Self {
            resource_id,
            account,
            released: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Check if there were any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        let who = self
            .account
            .as_ref()
            .map_or_else(|| "unknown account".to_string(), |a| a.to_string());
        if self.released.is_empty() {
            format!("Disconnect cleanup for {}: no locks held", who)
        } else {
            let sections: Vec<&str> = self.released.iter().map(|s| s.as_str()).collect();
            format!(
                "Disconnect cleanup for {}: released {}",
                who,
                sections.join(", ")
            )
        }
    }
}

/// Release every lock `principal` holds on `resource_id`
///
/// Best effort: a section that fails to release is recorded as a warning
/// and the remaining sections are still attempted.
pub async fn release_abandoned_locks(
    coordinator: &LockCoordinator,
    resource_id: ResourceId,
    principal: &Principal,
) -> CleanupReport {
    let mut report = CleanupReport::new(resource_id, principal.account.clone());
    let account = match principal.account_id() {
        Ok(account) => account,
        Err(e) => {
            report.warnings.push(e.to_string());
            return report;
        }
    };

    let held: Vec<Section> = coordinator
        .list(resource_id)
        .await
        .into_iter()
        .filter(|entry| entry.is_held_by(account))
        .map(|entry| entry.section)
        .collect();

    for section in held {
        match coordinator.release(resource_id, section, account).await {
            Ok(ReleaseOutcome::Released) => report.released.push(section),
            Ok(ReleaseOutcome::NotLocked) => {
                let warning = format!("{} was already released", section);
                warn!(resource_id = %resource_id, section = %section, "{}", warning);
                report.warnings.push(warning);
            }
            Err(e) => {
                let warning = format!("Failed to release {}: {}", section, e);
                warn!(resource_id = %resource_id, section = %section, "{}", warning);
                report.warnings.push(warning);
            }
        }
    }

    report
}

/// Connection-side half of a subscription
///
/// Dropping it fires the disconnect signal, so a connection that goes
/// away without cancelling its token still has its locks released.
#[derive(Debug)]
pub struct LockSubscription {
    id: Uuid,
    resource_id: ResourceId,
    events: mpsc::Receiver<LockChangeEvent>,
    report: oneshot::Receiver<CleanupReport>,
    disconnect: DropGuard,
}

impl LockSubscription {
    /// Subscriber id on the bus
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Resource this subscription follows
    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    /// Next lock change, or `None` once the subscription is torn down
    pub async fn recv(&mut self) -> Option<LockChangeEvent> {
        self.events.recv().await
    }

    /// Next lock change if one is already queued
    pub fn try_recv(&mut self) -> Option<LockChangeEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for teardown and return the disconnect cleanup report
    ///
    /// Discards any events still queued.
    pub async fn wait_closed(mut self) -> Option<CleanupReport> {
        while self.events.recv().await.is_some() {}
        self.report.await.ok()
    }

    /// Consume the subscription as a stream of lock changes
    ///
    /// Dropping the stream fires the disconnect signal.
    pub fn into_stream(self) -> impl Stream<Item = LockChangeEvent> + Send + 'static {
        let mut events = self.events;
        let disconnect = self.disconnect;
        async_stream::stream! {
            let _disconnect = disconnect;
            while let Some(event) = events.recv().await {
                yield event;
            }
        }
    }
}

/// Binds connections to lock-change streams
#[derive(Clone)]
pub struct SubscriptionManager {
    coordinator: Arc<LockCoordinator>,
    bus: InMemoryPubSub<LockChangeEvent>,
    config: SubscriptionConfig,
}

impl SubscriptionManager {
    /// Create a manager over the bus the coordinator publishes to
    pub fn new(
        coordinator: Arc<LockCoordinator>,
        bus: InMemoryPubSub<LockChangeEvent>,
        config: SubscriptionConfig,
    ) -> Self {
        Self {
            coordinator,
            bus,
            config,
        }
    }

    /// Follow lock changes on `resource_id` until `disconnect` is cancelled
    ///
    /// Cancelling `disconnect` releases every lock the principal's account
    /// holds on the resource.
    pub async fn subscribe(
        &self,
        resource_id: ResourceId,
        principal: Principal,
        disconnect: CancellationToken,
    ) -> LockResult<LockSubscription> {
        let account = principal.account_id()?.clone();

        let (tx, rx) = mpsc::channel(self.config.buffer);
        let (report_tx, report_rx) = oneshot::channel();
        let subscriber = Arc::new(LockSubscriber::new(
            resource_id,
            principal,
            tx,
            self.config.delivery_timeout,
            Arc::downgrade(&self.coordinator),
            report_tx,
        ));
        let id = subscriber.subscriber_id();

        let guard = disconnect.clone().drop_guard();
        self.bus
            .subscribe(resource_id, LOCK_CHANGED_EVENT, subscriber, disconnect)
            .await;

        info!(
            resource_id = %resource_id,
            account = %account,
            subscriber_id = %id,
            "Subscribed to lock changes"
        );

        Ok(LockSubscription {
            id,
            resource_id,
            events: rx,
            report: report_rx,
            disconnect: guard,
        })
    }

    /// Number of live subscriptions on a resource
    pub async fn subscriber_count(&self, resource_id: ResourceId) -> usize {
        self.bus
            .subscriber_count(resource_id, LOCK_CHANGED_EVENT)
            .await
    }

    /// Tear down one subscription as if its connection had closed
    pub async fn unsubscribe(&self, subscription: &LockSubscription) -> bool {
        self.bus
            .unsubscribe(subscription.resource_id, LOCK_CHANGED_EVENT, subscription.id)
            .await
    }

    /// Tear down every subscription, releasing their locks
    pub async fn disconnect_all(&self) -> usize {
        self.bus.disconnect_all().await
    }
}
