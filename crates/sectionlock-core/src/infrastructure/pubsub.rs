//! In-process publish/subscribe bus
//!
//! Subscribers are keyed by `(topic, event_type)`. Each registration
//! carries a disconnect token; a watcher task removes the subscriber and
//! runs its `on_unsubscribe` hook once the token is cancelled.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::events::{EventPublisher, EventSubscriber};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TopicKey {
    topic: Uuid,
    event_type: String,
}

impl TopicKey {
    fn new(topic: Uuid, event_type: &str) -> Self {
        Self {
            topic,
            event_type: event_type.to_string(),
        }
    }
}

struct Registration<E> {
    subscriber: Arc<dyn EventSubscriber<E>>,
    disconnect: CancellationToken,
}

type TopicMap<E> = HashMap<TopicKey, HashMap<Uuid, Registration<E>>>;

/// Topic-based fan-out within one process
pub struct InMemoryPubSub<E> {
    topics: Arc<RwLock<TopicMap<E>>>,
}

impl<E> Clone for InMemoryPubSub<E> {
    fn clone(&self) -> Self {
        Self {
            topics: self.topics.clone(),
        }
    }
}

impl<E> Default for InMemoryPubSub<E> {
    fn default() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<E> InMemoryPubSub<E>
where
    E: Send + Sync + 'static,
{
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` until `disconnect` is cancelled
    ///
    /// Must be called from within a tokio runtime.
    pub async fn subscribe(
        &self,
        topic: Uuid,
        event_type: &str,
        subscriber: Arc<dyn EventSubscriber<E>>,
        disconnect: CancellationToken,
    ) {
        let key = TopicKey::new(topic, event_type);
        let subscriber_id = subscriber.subscriber_id();

        self.topics.write().await.entry(key.clone()).or_default().insert(
            subscriber_id,
            Registration {
                subscriber,
                disconnect: disconnect.clone(),
            },
        );
        debug!(topic = %topic, event_type, subscriber_id = %subscriber_id, "Subscriber registered");

        let topics = self.topics.clone();
        tokio::spawn(async move {
            disconnect.cancelled().await;
            let removed = {
                let mut topics = topics.write().await;
                let removed = topics
                    .get_mut(&key)
                    .and_then(|subscribers| subscribers.remove(&subscriber_id));
                if topics.get(&key).is_some_and(|subscribers| subscribers.is_empty()) {
                    topics.remove(&key);
                }
                removed
            };

            if let Some(registration) = removed {
                debug!(
                    topic = %key.topic,
                    subscriber_id = %subscriber_id,
                    "Subscriber disconnected"
                );
                registration.subscriber.on_unsubscribe().await;
            }
        });
    }

    /// Tear down one subscription as if its connection had closed
    ///
    /// Returns false if the subscriber was not registered.
    pub async fn unsubscribe(&self, topic: Uuid, event_type: &str, subscriber_id: Uuid) -> bool {
        let key = TopicKey::new(topic, event_type);
        let topics = self.topics.read().await;
        match topics
            .get(&key)
            .and_then(|subscribers| subscribers.get(&subscriber_id))
        {
            Some(registration) => {
                registration.disconnect.cancel();
                true
            }
            None => false,
        }
    }

    /// Tear down every subscription on the bus
    pub async fn disconnect_all(&self) -> usize {
        let topics = self.topics.read().await;
        let mut count = 0;
        for registration in topics.values().flat_map(|subscribers| subscribers.values()) {
            registration.disconnect.cancel();
            count += 1;
        }
        count
    }

    /// Number of live subscribers on `(topic, event_type)`
    pub async fn subscriber_count(&self, topic: Uuid, event_type: &str) -> usize {
        self.topics
            .read()
            .await
            .get(&TopicKey::new(topic, event_type))
            .map_or(0, |subscribers| subscribers.len())
    }
}

#[async_trait]
impl<E> EventPublisher<E> for InMemoryPubSub<E>
where
    E: Send + Sync + 'static,
{
    async fn publish(&self, topic: Uuid, event_type: &str, payload: E) -> Result<()> {
        let subscribers: Vec<Arc<dyn EventSubscriber<E>>> = {
            let topics = self.topics.read().await;
            topics
                .get(&TopicKey::new(topic, event_type))
                .map(|subscribers| {
                    subscribers
                        .values()
                        .map(|registration| registration.subscriber.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        for subscriber in subscribers {
            if let Err(e) = subscriber.notify(&payload).await {
                warn!(
                    topic = %topic,
                    event_type,
                    subscriber_id = %subscriber.subscriber_id(),
                    error = %e,
                    "Event delivery failed"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct TestSubscriber {
        id: Uuid,
        received: Mutex<Vec<u32>>,
        unsubscribed: AtomicUsize,
        fail: bool,
    }

    impl TestSubscriber {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::new_v4(),
                ..Default::default()
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::new_v4(),
                fail: true,
                ..Default::default()
            })
        }

        fn received(&self) -> Vec<u32> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSubscriber<u32> for TestSubscriber {
        fn subscriber_id(&self) -> Uuid {
            self.id
        }

        async fn notify(&self, payload: &u32) -> Result<()> {
            if self.fail {
                return Err(Error::SubscriberClosed(self.id.to_string()));
            }
            self.received.lock().unwrap().push(*payload);
            Ok(())
        }

        async fn on_unsubscribe(&self) {
            self.unsubscribed.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for_unsubscribe(subscriber: &TestSubscriber) {
        for _ in 0..100 {
            if subscriber.unsubscribed.load(Ordering::SeqCst) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers_only() {
        let bus = InMemoryPubSub::<u32>::new();
        let topic = Uuid::new_v4();
        let a = TestSubscriber::new();
        let b = TestSubscriber::new();

        bus.subscribe(topic, "changed", a.clone(), CancellationToken::new())
            .await;
        bus.subscribe(Uuid::new_v4(), "changed", b.clone(), CancellationToken::new())
            .await;

        bus.publish(topic, "changed", 1).await.unwrap();
        bus.publish(topic, "other", 2).await.unwrap();

        assert_eq!(a.received(), vec![1]);
        assert!(b.received().is_empty());
        assert_eq!(bus.subscriber_count(topic, "changed").await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_removes_and_calls_hook_once() {
        let bus = InMemoryPubSub::<u32>::new();
        let topic = Uuid::new_v4();
        let subscriber = TestSubscriber::new();
        let disconnect = CancellationToken::new();

        bus.subscribe(topic, "changed", subscriber.clone(), disconnect.clone())
            .await;
        disconnect.cancel();
        wait_for_unsubscribe(&subscriber).await;

        assert_eq!(subscriber.unsubscribed.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(topic, "changed").await, 0);
        assert!(!bus.unsubscribe(topic, "changed", subscriber.id).await);

        bus.publish(topic, "changed", 5).await.unwrap();
        assert!(subscriber.received().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_runs_hook() {
        let bus = InMemoryPubSub::<u32>::new();
        let topic = Uuid::new_v4();
        let subscriber = TestSubscriber::new();

        bus.subscribe(topic, "changed", subscriber.clone(), CancellationToken::new())
            .await;
        assert!(bus.unsubscribe(topic, "changed", subscriber.id).await);
        wait_for_unsubscribe(&subscriber).await;

        assert_eq!(subscriber.unsubscribed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_fan_out() {
        let bus = InMemoryPubSub::<u32>::new();
        let topic = Uuid::new_v4();
        let broken = TestSubscriber::failing();
        let healthy = TestSubscriber::new();

        bus.subscribe(topic, "changed", broken, CancellationToken::new())
            .await;
        bus.subscribe(topic, "changed", healthy.clone(), CancellationToken::new())
            .await;

        bus.publish(topic, "changed", 9).await.unwrap();
        assert_eq!(healthy.received(), vec![9]);
    }

    #[tokio::test]
    async fn test_disconnect_all() {
        let bus = InMemoryPubSub::<u32>::new();
        let a = TestSubscriber::new();
        let b = TestSubscriber::new();

        bus.subscribe(Uuid::new_v4(), "changed", a.clone(), CancellationToken::new())
            .await;
        bus.subscribe(Uuid::new_v4(), "changed", b.clone(), CancellationToken::new())
            .await;

        assert_eq!(bus.disconnect_all().await, 2);
        wait_for_unsubscribe(&a).await;
        wait_for_unsubscribe(&b).await;
        assert_eq!(b.unsubscribed.load(Ordering::SeqCst), 1);
    }
}
