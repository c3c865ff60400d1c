//! Pull-style streaming glue between [`crate::event_hub::EventHub`] and the
//! API layer's SSE endpoints.
//!
//! Mirrors the original pub/sub stream generator: subscribe to a topic, push
//! the current state immediately, then on every notification re-fetch and
//! push again; if nothing arrives within `heartbeat_interval`, push a
//! heartbeat instead so idle clients (and intermediate proxies) don't time
//! the connection out.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, Stream};

use crate::error::Result;
use crate::event_hub::{EventHub, Subscription};

/// One item pushed down a facade stream.
#[derive(Debug, Clone)]
pub enum StreamEvent<T> {
    /// Freshly fetched state, sent on subscribe and after every notification
    Data(T),
    /// No notification arrived within the heartbeat window
    Heartbeat,
}

/// Re-fetches the current state to push after a notification. Boxed rather
/// than generic over a future type so [`StreamFacade::stream`] can be called
/// with an ordinary async closure.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

enum FacadeState<T> {
    Start { hub: EventHub, topic: String },
    Running { subscription: Subscription },
    #[allow(dead_code)]
    Done(std::marker::PhantomData<T>),
}

/// Builds topic-driven streams for the API layer; holds no state of its
/// own, it's just a namespace for [`StreamFacade::stream`].
pub struct StreamFacade;

impl StreamFacade {
    /// Subscribe to `topic` and produce a stream of [`StreamEvent`]s: an
    /// immediate fetch, then one fetch per coalesced notification, with
    /// heartbeats filling any `heartbeat_interval`-sized gap. The stream ends
    /// if `fetch` itself errors (the error is logged, not surfaced — a
    /// client mid-stream has no use for a one-off fetch failure) or once the
    /// hub drops every sender for this subscription.
    pub fn stream<T>(
        hub: EventHub,
        topic: impl Into<String>,
        heartbeat_interval: Duration,
        fetch: FetchFn<T>,
    ) -> impl Stream<Item = StreamEvent<T>>
    where
        T: Send + 'static,
    {
        let initial = FacadeState::Start { hub, topic: topic.into() };

        stream::unfold((initial, fetch), move |(state, fetch)| async move {
            match state {
                FacadeState::Start { hub, topic } => {
                    // Subscribe before the initial fetch so a notification
                    // racing the first fetch is never silently missed.
                    let subscription = hub.subscribe(&topic).await;
                    match fetch().await {
                        Ok(data) => {
                            Some((StreamEvent::Data(data), (FacadeState::Running { subscription }, fetch)))
                        }
                        Err(error) => {
                            tracing::error!(%error, topic, "initial stream fetch failed, closing stream");
                            None
                        }
                    }
                }
                FacadeState::Running { mut subscription } => {
                    match tokio::time::timeout(heartbeat_interval, subscription.recv()).await {
                        Ok(Some(())) => match fetch().await {
                            Ok(data) => Some((
                                StreamEvent::Data(data),
                                (FacadeState::Running { subscription }, fetch),
                            )),
                            Err(error) => {
                                tracing::error!(%error, "stream refetch failed, closing stream");
                                None
                            }
                        },
                        Ok(None) => None,
                        Err(_elapsed) => Some((
                            StreamEvent::Heartbeat,
                            (FacadeState::Running { subscription }, fetch),
                        )),
                    }
                }
                FacadeState::Done(_) => None,
            }
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_hub::topics;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetch(counter: Arc<AtomicUsize>) -> FetchFn<usize> {
        Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) })
        })
    }

    #[tokio::test]
    async fn emits_initial_data_immediately() {
        let hub = EventHub::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut stream = Box::pin(StreamFacade::stream(
            hub,
            topics::TASKS,
            Duration::from_secs(30),
            counting_fetch(counter),
        ));

        match stream.next().await.unwrap() {
            StreamEvent::Data(value) => assert_eq!(value, 0),
            StreamEvent::Heartbeat => panic!("expected initial data, got heartbeat"),
        }
    }

    #[tokio::test]
    async fn refetches_after_a_publish() {
        let hub = EventHub::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut stream = Box::pin(StreamFacade::stream(
            hub.clone(),
            topics::TASKS,
            Duration::from_secs(30),
            counting_fetch(counter),
        ));

        assert!(matches!(stream.next().await.unwrap(), StreamEvent::Data(0)));

        hub.publish(topics::TASKS).await;
        match stream.next().await.unwrap() {
            StreamEvent::Data(value) => assert_eq!(value, 1),
            StreamEvent::Heartbeat => panic!("expected refetch, got heartbeat"),
        }
    }

    #[tokio::test]
    async fn sends_heartbeat_when_no_notification_arrives_in_time() {
        let hub = EventHub::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut stream = Box::pin(StreamFacade::stream(
            hub,
            topics::TASKS,
            Duration::from_millis(20),
            counting_fetch(counter),
        ));

        assert!(matches!(stream.next().await.unwrap(), StreamEvent::Data(0)));
        assert!(matches!(stream.next().await.unwrap(), StreamEvent::Heartbeat));
    }

    #[tokio::test]
    async fn ends_the_stream_when_initial_fetch_errors() {
        let hub = EventHub::new();
        let fetch: FetchFn<usize> =
            Arc::new(|| Box::pin(async move { Err(crate::error::Error::Other("boom".to_string())) }));
        let mut stream = Box::pin(StreamFacade::stream(hub, topics::TASKS, Duration::from_secs(30), fetch));

        assert!(stream.next().await.is_none());
    }
}
