//! Domain event infrastructure
//!
//! Topic-based publish/subscribe contracts. A topic is the id of the
//! aggregate the events belong to; within a topic, events are further
//! keyed by an event-type tag.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::error::Result;

/// Publisher side of the bus
#[async_trait]
pub trait EventPublisher<E>: Send + Sync
where
    E: Send + Sync + 'static,
{
    /// Deliver `payload` to every subscriber of `(topic, event_type)`
    async fn publish(&self, topic: Uuid, event_type: &str, payload: E) -> Result<()>;
}

/// A live consumer registered with the bus
#[async_trait]
pub trait EventSubscriber<E>: Send + Sync
where
    E: Send + Sync + 'static,
{
    /// Stable id used to unregister the subscriber
    fn subscriber_id(&self) -> Uuid;

    /// Handle one published payload
    async fn notify(&self, payload: &E) -> Result<()>;

    /// Called once when the subscriber's disconnect signal fires
    async fn on_unsubscribe(&self);
}

/// A published payload together with where it was published
#[derive(Debug, Clone)]
pub struct PublishedEvent<E> {
    pub topic: Uuid,
    pub event_type: String,
    pub payload: E,
}

/// Publisher that only records what it is given
///
/// Useful when a component needs a publisher but nobody is listening,
/// and for asserting on emitted events.
#[derive(Debug)]
pub struct RecordingPublisher<E> {
    events: Mutex<Vec<PublishedEvent<E>>>,
}

impl<E> Default for RecordingPublisher<E> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> RecordingPublisher<E> {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded event, in publication order
    pub fn all_events(&self) -> Vec<PublishedEvent<E>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads recorded for one topic
    pub fn events_for(&self, topic: Uuid) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.topic == topic)
            .map(|e| e.payload.clone())
            .collect()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl<E> EventPublisher<E> for RecordingPublisher<E>
where
    E: Send + Sync + 'static,
{
    async fn publish(&self, topic: Uuid, event_type: &str, payload: E) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedEvent {
                topic,
                event_type: event_type.to_string(),
                payload,
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_publisher() {
        let publisher = RecordingPublisher::new();
        let topic = Uuid::new_v4();

        publisher.publish(topic, "a", 1u32).await.unwrap();
        publisher.publish(topic, "b", 2u32).await.unwrap();
        publisher.publish(Uuid::new_v4(), "a", 3u32).await.unwrap();

        assert_eq!(publisher.events_for(topic), vec![1, 2]);
        assert_eq!(publisher.len(), 3);
        assert_eq!(publisher.all_events()[1].event_type, "b");

        publisher.clear();
        assert!(publisher.is_empty());
    }
}
