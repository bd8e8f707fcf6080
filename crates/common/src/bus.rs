//! The pub/sub bus boundary (see SPEC_FULL.md §6, §10.4).
//!
//! The relay core talks to the bus only through [`BusPublisher`] and
//! [`BusSubscriber`]; [`LocalBus`] is the default in-process implementation,
//! one `tokio::sync::broadcast` channel per topic, so a single relay process
//! runs standalone without a real external bus. A multi-process deployment
//! would swap this for a Redis/NATS-backed implementation of the same two
//! traits without touching the core.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;

const TOPIC_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus channel closed")]
    Closed,
}

pub trait BusPublisher: Send + Sync {
    /// Fire-and-forget publish. Delivery is at-most-once: if nobody is
    /// subscribed to `topic` the payload is simply dropped.
    fn publish(&self, topic: &str, payload: String) -> Result<(), BusError>;
}

#[async_trait]
pub trait BusSubscriber: Send {
    async fn subscribe(&mut self, topic: &str);

    async fn unsubscribe(&mut self, topic: &str);

    /// Non-blocking poll for the next available message. `None` means no
    /// message is currently available, not that the subscriber is closed.
    async fn next(&mut self) -> Option<(String, String)>;
}

/// One broadcast channel per topic, created lazily on first publish or
/// subscribe and left in place for the life of the process. Topics are
/// agent-uuids and space-uuids, bounded by the catalog, so this never grows
/// unboundedly in practice.
#[derive(Debug, Clone, Default)]
pub struct LocalBus {
    topics: Arc<DashMap<String, broadcast::Sender<String>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, topic: &str) -> broadcast::Sender<String> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    pub fn publisher(&self) -> LocalPublisher {
        LocalPublisher { bus: self.clone() }
    }

    pub fn subscriber(&self) -> LocalSubscriber {
        LocalSubscriber {
            bus: self.clone(),
            receivers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalPublisher {
    bus: LocalBus,
}

impl BusPublisher for LocalPublisher {
    fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        // No receivers is not an error: at-most-once delivery permits silent drop.
        let _ = self.bus.channel(topic).send(payload);
        Ok(())
    }
}

pub struct LocalSubscriber {
    bus: LocalBus,
    receivers: Vec<(String, broadcast::Receiver<String>)>,
}

#[async_trait]
impl BusSubscriber for LocalSubscriber {
    async fn subscribe(&mut self, topic: &str) {
        if self.receivers.iter().any(|(t, _)| t == topic) {
            return;
        }
        let receiver = self.bus.channel(topic).subscribe();
        self.receivers.push((topic.to_string(), receiver));
    }

    async fn unsubscribe(&mut self, topic: &str) {
        self.receivers.retain(|(t, _)| t != topic);
    }

    async fn next(&mut self) -> Option<(String, String)> {
        for (topic, receiver) in &mut self.receivers {
            loop {
                match receiver.try_recv() {
                    Ok(payload) => return Some((topic.clone(), payload)),
                    // A lagged receiver skipped messages; keep draining this
                    // topic rather than surface the lag to the caller.
                    Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_subscribe_sees_nothing_retroactively() {
        let bus = LocalBus::new();
        let publisher = bus.publisher();
        publisher.publish("topic-a", "missed".into()).unwrap();

        let mut subscriber = bus.subscriber();
        subscriber.subscribe("topic-a").await;
        assert_eq!(subscriber.next().await, None);
    }

    #[tokio::test]
    async fn subscribe_then_publish_is_delivered() {
        let bus = LocalBus::new();
        let mut subscriber = bus.subscriber();
        subscriber.subscribe("topic-a").await;

        let publisher = bus.publisher();
        publisher.publish("topic-a", "hello".into()).unwrap();

        let (topic, payload) = subscriber.next().await.unwrap();
        assert_eq!(topic, "topic-a");
        assert_eq!(payload, "hello");
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = LocalBus::new();
        let mut subscriber = bus.subscriber();
        subscriber.subscribe("topic-a").await;
        subscriber.unsubscribe("topic-a").await;

        let publisher = bus.publisher();
        publisher.publish("topic-a", "hello".into()).unwrap();
        assert_eq!(subscriber.next().await, None);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = LocalBus::new();
        let publisher = bus.publisher();
        assert!(publisher.publish("nobody-listening", "x".into()).is_ok());
    }

    #[tokio::test]
    async fn multiple_topics_multiplex_on_one_subscriber() {
        let bus = LocalBus::new();
        let mut subscriber = bus.subscriber();
        subscriber.subscribe("a").await;
        subscriber.subscribe("b").await;

        let publisher = bus.publisher();
        publisher.publish("b", "from-b".into()).unwrap();

        let (topic, payload) = subscriber.next().await.unwrap();
        assert_eq!(topic, "b");
        assert_eq!(payload, "from-b");
    }
}
