//! A live connection's interest in one resource's lock changes

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::manager::{CleanupReport, release_abandoned_locks};
use crate::domain::events::EventSubscriber;
use crate::domain::identity::Principal;
use crate::domain::locking::{LockChangeEvent, LockCoordinator, ResourceId};
use crate::error::{Error, Result};

/// Bus-side half of a subscription
///
/// Owns the sending end of the connection's event channel. When the bus
/// drops it after `on_unsubscribe`, the connection's receiver closes.
pub(crate) struct LockSubscriber {
    id: Uuid,
    resource_id: ResourceId,
    principal: Principal,
    sender: mpsc::Sender<LockChangeEvent>,
    delivery_timeout: Duration,
    coordinator: Weak<LockCoordinator>,
    report_tx: Mutex<Option<oneshot::Sender<CleanupReport>>>,
}

impl LockSubscriber {
    pub(crate) fn new(
        resource_id: ResourceId,
        principal: Principal,
        sender: mpsc::Sender<LockChangeEvent>,
        delivery_timeout: Duration,
        coordinator: Weak<LockCoordinator>,
        report_tx: oneshot::Sender<CleanupReport>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_id,
            principal,
            sender,
            delivery_timeout,
            coordinator,
            report_tx: Mutex::new(Some(report_tx)),
        }
    }
}

#[async_trait]
impl EventSubscriber<LockChangeEvent> for LockSubscriber {
    fn subscriber_id(&self) -> Uuid {
        self.id
    }

    async fn notify(&self, payload: &LockChangeEvent) -> Result<()> {
        match timeout(self.delivery_timeout, self.sender.send(payload.clone())).await {
            Ok(Ok(())) => {
                debug!(subscriber_id = %self.id, revision = payload.revision, "Event delivered");
                Ok(())
            }
            Ok(Err(_)) => Err(Error::SubscriberClosed(self.id.to_string())),
            Err(_) => Err(Error::DeliveryTimeout(
                self.id.to_string(),
                self.delivery_timeout.as_millis() as u64,
            )),
        }
    }

    async fn on_unsubscribe(&self) {
        let Some(coordinator) = self.coordinator.upgrade() else {
            debug!(subscriber_id = %self.id, "Coordinator gone, skipping lock cleanup");
            return;
        };

        let report = release_abandoned_locks(&coordinator, self.resource_id, &self.principal).await;
        if report.has_warnings() {
            warn!(
                subscriber_id = %self.id,
                resource_id = %self.resource_id,
                warnings = ?report.warnings,
                "Disconnect cleanup finished with warnings"
            );
        } else {
            info!(
                subscriber_id = %self.id,
                resource_id = %self.resource_id,
                "{}",
                report.summary()
            );
        }

        let report_tx = self
            .report_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = report_tx {
            // The connection may have stopped listening; that is fine.
            let _ = tx.send(report);
        }
    }
}
