//! Best-effort notification sinks fired on task-queue events.
//!
//! Delivery is fire-and-forget: a sink's `notify` spawns its own delivery
//! task and returns immediately, so a slow or unreachable webhook/script
//! never blocks the handler that raised the event. Failures are logged, not
//! propagated — see [`crate::error::Error::Notifier`].

mod script;
mod webhook;

pub use script::ScriptNotifier;
pub use webhook::WebhookNotifier;

use std::sync::Arc;

use crate::config::NotificationConfig;
use crate::types::NotificationEvent;

/// A sink that reacts to [`NotificationEvent`]s. Implementations must not
/// block the caller; any I/O belongs inside a spawned task.
pub trait Notifier: Send + Sync {
    /// Deliver (or queue delivery of) one event. Must return promptly.
    fn notify(&self, event: NotificationEvent);

    /// Human-readable sink name, for logging.
    fn name(&self) -> &'static str;
}

/// The set of configured notification sinks, fanned out to on every event.
#[derive(Clone, Default)]
pub struct NotifierRegistry {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl NotifierRegistry {
    /// Build a registry from configuration. Sinks with no configured
    /// webhooks/scripts are omitted entirely rather than kept as no-ops.
    pub fn from_config(config: &NotificationConfig) -> Self {
        let mut sinks: Vec<Arc<dyn Notifier>> = Vec::new();

        if !config.webhooks.is_empty() {
            sinks.push(Arc::new(WebhookNotifier::new(config.webhooks.clone())));
        }
        if !config.scripts.is_empty() {
            sinks.push(Arc::new(ScriptNotifier::new(config.scripts.clone())));
        }

        Self { sinks }
    }

    /// Build an empty registry with no sinks, used by tests and by engines
    /// running without any configured notifications.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add an arbitrary sink, e.g. an in-memory recorder used by tests.
    pub fn register(&mut self, sink: Arc<dyn Notifier>) {
        self.sinks.push(sink);
    }

    /// Fan an event out to every configured sink.
    pub fn notify(&self, event: NotificationEvent) {
        for sink in &self.sinks {
            sink.notify(event.clone());
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ListId, VideoId};
    use std::sync::Mutex;

    struct RecordingNotifier {
        events: Mutex<Vec<NotificationEvent>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: NotificationEvent) {
            self.events.lock().expect("lock poisoned").push(event);
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn empty_config_yields_no_sinks() {
        let registry = NotifierRegistry::from_config(&NotificationConfig::default());
        registry.notify(NotificationEvent::SyncCompleted { list_id: ListId(1), new_videos: 0 });
        // no panic, no sinks to fan out to - nothing to assert beyond "didn't blow up"
    }

    #[test]
    fn registered_sink_receives_every_event() {
        let mut registry = NotifierRegistry::empty();
        let recorder = Arc::new(RecordingNotifier { events: Mutex::new(Vec::new()) });
        registry.register(recorder.clone());

        registry.notify(NotificationEvent::DownloadCompleted {
            video_id: VideoId(1),
            path: "/downloads/a.mp4".to_string(),
        });
        registry.notify(NotificationEvent::VideoDiscovered { video_id: VideoId(2), list_id: ListId(1) });

        assert_eq!(recorder.events.lock().expect("lock poisoned").len(), 2);
    }
}
