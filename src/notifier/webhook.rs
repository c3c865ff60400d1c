//! HTTP webhook notification sink.

use serde::Serialize;

use crate::config::WebhookConfig;
use crate::types::NotificationEvent;

use super::Notifier;

/// JSON body POSTed to each matching webhook.
#[derive(Serialize)]
struct WebhookPayload<'a> {
    #[serde(flatten)]
    event: &'a NotificationEvent,
    timestamp: i64,
}

/// Fires an HTTP POST at every configured webhook whose `events` allowlist
/// matches (or is empty, meaning "all events").
pub struct WebhookNotifier {
    webhooks: Vec<WebhookConfig>,
}

impl WebhookNotifier {
    /// Build a sink from a list of configured webhooks.
    pub fn new(webhooks: Vec<WebhookConfig>) -> Self {
        Self { webhooks }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: NotificationEvent) {
        let matching: Vec<_> = self
            .webhooks
            .iter()
            .filter(|w| w.events.is_empty() || w.events.iter().any(|e| e == event.kind()))
            .cloned()
            .collect();

        if matching.is_empty() {
            return;
        }

        tokio::spawn(async move {
            let payload = WebhookPayload { event: &event, timestamp: chrono::Utc::now().timestamp() };
            let client = reqwest::Client::new();

            for webhook in matching {
                let mut request = client.post(&webhook.url).json(&payload).timeout(webhook.timeout);
                for (key, value) in &webhook.headers {
                    request = request.header(key, value);
                }

                let result = tokio::time::timeout(webhook.timeout, request.send()).await;
                match result {
                    Ok(Ok(response)) if response.status().is_success() => {
                        tracing::debug!(webhook = %webhook.name, "webhook delivered");
                    }
                    Ok(Ok(response)) => {
                        tracing::warn!(webhook = %webhook.name, status = %response.status(), "webhook returned non-success status");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(webhook = %webhook.name, error = %e, "webhook delivery failed");
                    }
                    Err(_) => {
                        tracing::warn!(webhook = %webhook.name, timeout = ?webhook.timeout, "webhook delivery timed out");
                    }
                }
            }
        });
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ListId, VideoId};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn webhook(url: String, events: Vec<&str>) -> WebhookConfig {
        WebhookConfig {
            name: "test".to_string(),
            url,
            events: events.into_iter().map(str::to_string).collect(),
            timeout: Duration::from_secs(5),
            headers: Default::default(),
        }
    }

    #[tokio::test]
    async fn delivers_post_for_matching_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(vec![webhook(format!("{}/hook", server.uri()), vec!["download_completed"])]);
        notifier.notify(NotificationEvent::DownloadCompleted { video_id: VideoId(1), path: "/a.mp4".to_string() });

        // the delivery task is spawned; give it a moment to run against the mock server
        tokio::time::sleep(Duration::from_millis(200)).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn skips_webhooks_not_subscribed_to_the_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let notifier = WebhookNotifier::new(vec![webhook(format!("{}/hook", server.uri()), vec!["sync_completed"])]);
        notifier.notify(NotificationEvent::DownloadCompleted { video_id: VideoId(1), path: "/a.mp4".to_string() });

        tokio::time::sleep(Duration::from_millis(200)).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn empty_events_allowlist_matches_everything() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(1).mount(&server).await;

        let notifier = WebhookNotifier::new(vec![webhook(format!("{}/hook", server.uri()), vec![])]);
        notifier.notify(NotificationEvent::SyncCompleted { list_id: ListId(1), new_videos: 3 });

        tokio::time::sleep(Duration::from_millis(200)).await;
        server.verify().await;
    }
}
