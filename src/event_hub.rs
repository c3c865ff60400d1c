//! In-process publish/subscribe hub backing streaming clients.
//!
//! Subscribers register a bounded, coalesced notification queue per topic.
//! Publishers fire a payload-less token rather than pushing state, so a
//! [`crate::stream_facade::StreamFacade`] consumer learns only "something on
//! this topic changed" and re-queries the store for the actual state. This
//! keeps the hub ignorant of what any topic's data looks like.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

/// Depth of each subscriber's notification queue. A full queue means the
/// subscriber is behind; further notifications are dropped since a drain is
/// an idempotent state re-read, not a payload delivery.
const SUBSCRIBER_QUEUE_DEPTH: usize = 100;

/// Well-known topic names. List-scoped topics are built with the `list_*`
/// helpers rather than enumerated as constants.
pub mod topics {
    /// Task list changed (any list, any status)
    pub const TASKS: &str = "tasks";
    /// Aggregate task counters changed
    pub const TASKS_STATS: &str = "tasks:stats";
    /// In-flight download progress changed
    pub const PROGRESS: &str = "progress";
    /// A history entry was appended
    pub const HISTORY: &str = "history";
    /// A List was inserted, updated, or deleted
    pub const LISTS: &str = "lists";

    /// Video catalog changes scoped to one List
    pub fn list_videos(list_id: i64) -> String {
        format!("list:{list_id}:videos")
    }

    /// Task changes scoped to one List
    pub fn list_tasks(list_id: i64) -> String {
        format!("list:{list_id}:tasks")
    }

    /// History changes scoped to one List
    pub fn list_history(list_id: i64) -> String {
        format!("list:{list_id}:history")
    }
}

type Subscribers = HashMap<String, Vec<(u64, mpsc::Sender<()>)>>;

/// Pub/sub hub for topic-based change notifications.
#[derive(Clone, Default)]
pub struct EventHub {
    subscribers: Arc<Mutex<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

/// A live subscription to one topic. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    topic: String,
    hub: EventHub,
    rx: mpsc::Receiver<()>,
}

impl Subscription {
    /// Wait for the next notification on this topic. Returns `None` once the
    /// hub itself has been dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Drain any notifications already queued without blocking.
    pub fn try_recv(&mut self) -> bool {
        let mut saw_any = false;
        while self.rx.try_recv().is_ok() {
            saw_any = true;
        }
        saw_any
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let hub = self.hub.clone();
        let id = self.id;
        let topic = std::mem::take(&mut self.topic);
        tokio::spawn(async move {
            hub.unsubscribe(&topic, id).await;
        });
    }
}

impl EventHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic, returning a handle whose `recv()` resolves once
    /// per coalesced notification.
    pub async fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers
            .lock()
            .await
            .entry(topic.clone())
            .or_default()
            .push((id, tx));

        Subscription {
            id,
            topic,
            hub: self.clone(),
            rx,
        }
    }

    /// Notify subscribers of a single topic.
    pub async fn publish(&self, topic: &str) {
        self.publish_many(&[topic]).await;
    }

    /// Notify subscribers across several topics in one lock acquisition.
    pub async fn publish_many(&self, topics: &[&str]) {
        let mut subs = self.subscribers.lock().await;
        for topic in topics {
            let Some(senders) = subs.get_mut(*topic) else {
                continue;
            };

            senders.retain(|(_, tx)| match tx.try_send(()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });

            if senders.is_empty() {
                subs.remove(*topic);
            }
        }
    }

    /// Number of live subscribers on a topic, for tests and diagnostics.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.lock().await.get(topic).map(Vec::len).unwrap_or(0)
    }

    async fn unsubscribe(&self, topic: &str, id: u64) {
        let mut subs = self.subscribers.lock().await;
        if let Some(senders) = subs.get_mut(topic) {
            senders.retain(|(sid, _)| *sid != id);
            if senders.is_empty() {
                subs.remove(topic);
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_wakes_subscriber() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(topics::TASKS).await;

        hub.publish(topics::TASKS).await;

        assert!(sub.recv().await.is_some());
    }

    #[tokio::test]
    async fn publish_on_unrelated_topic_does_not_wake() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(topics::TASKS).await;

        hub.publish(topics::PROGRESS).await;

        // give any (incorrect) wakeup a chance to land before asserting empty
        assert!(!sub.try_recv());
    }

    #[tokio::test]
    async fn multiple_subscribers_on_same_topic_all_notified() {
        let hub = EventHub::new();
        let mut a = hub.subscribe(topics::HISTORY).await;
        let mut b = hub.subscribe(topics::HISTORY).await;

        hub.publish(topics::HISTORY).await;

        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn list_scoped_topics_are_isolated() {
        let hub = EventHub::new();
        let mut list_1 = hub.subscribe(topics::list_tasks(1)).await;
        let mut list_2 = hub.subscribe(topics::list_tasks(2)).await;

        hub.publish(&topics::list_tasks(1)).await;

        assert!(list_1.recv().await.is_some());
        assert!(!list_2.try_recv());
    }

    #[tokio::test]
    async fn repeated_publishes_coalesce_into_one_pending_notification() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe(topics::TASKS).await;

        // queue depth is 100 so these don't fill it; coalescing here means
        // the consumer only needs one recv() to know "state changed since
        // last look", not one recv() per publish.
        hub.publish(topics::TASKS).await;
        hub.publish(topics::TASKS).await;
        hub.publish(topics::TASKS).await;

        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_some());
    }

    #[tokio::test]
    async fn dropping_subscription_removes_it_from_the_hub() {
        let hub = EventHub::new();
        let sub = hub.subscribe(topics::TASKS).await;
        assert_eq!(hub.subscriber_count(topics::TASKS).await, 1);

        drop(sub);
        // the unsubscribe task is spawned on drop; yield so it runs
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(hub.subscriber_count(topics::TASKS).await, 0);
    }
}
