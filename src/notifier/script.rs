//! Shell-script notification sink.

use std::collections::HashMap;

use crate::config::ScriptConfig;
use crate::types::NotificationEvent;

use super::Notifier;

/// Invokes every configured script whose `events` allowlist matches (or is
/// empty), passing event fields as `VIDQUEUE_*` environment variables.
pub struct ScriptNotifier {
    scripts: Vec<ScriptConfig>,
}

impl ScriptNotifier {
    /// Build a sink from a list of configured scripts.
    pub fn new(scripts: Vec<ScriptConfig>) -> Self {
        Self { scripts }
    }
}

impl Notifier for ScriptNotifier {
    fn notify(&self, event: NotificationEvent) {
        let matching: Vec<_> = self
            .scripts
            .iter()
            .filter(|s| s.events.is_empty() || s.events.iter().any(|e| e == event.kind()))
            .cloned()
            .collect();

        if matching.is_empty() {
            return;
        }

        let env_vars = build_env(&event);

        for script in matching {
            run_script_async(script.path.clone(), script.timeout, env_vars.clone());
        }
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

fn build_env(event: &NotificationEvent) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("VIDQUEUE_EVENT".to_string(), event.kind().to_string());

    match event {
        NotificationEvent::DownloadCompleted { video_id, path } => {
            env.insert("VIDQUEUE_VIDEO_ID".to_string(), video_id.to_string());
            env.insert("VIDQUEUE_PATH".to_string(), path.clone());
        }
        NotificationEvent::VideoDiscovered { video_id, list_id } => {
            env.insert("VIDQUEUE_VIDEO_ID".to_string(), video_id.to_string());
            env.insert("VIDQUEUE_LIST_ID".to_string(), list_id.to_string());
        }
        NotificationEvent::SyncCompleted { list_id, new_videos } => {
            env.insert("VIDQUEUE_LIST_ID".to_string(), list_id.to_string());
            env.insert("VIDQUEUE_NEW_VIDEOS".to_string(), new_videos.to_string());
        }
    }

    env
}

fn run_script_async(script_path: std::path::PathBuf, timeout: std::time::Duration, env_vars: HashMap<String, String>) {
    tokio::spawn(async move {
        let result = tokio::time::timeout(timeout, tokio::process::Command::new(&script_path).envs(&env_vars).output()).await;

        match result {
            Ok(Ok(output)) if output.status.success() => {
                tracing::debug!(script = %script_path.display(), "notification script executed successfully");
            }
            Ok(Ok(output)) => {
                tracing::warn!(script = %script_path.display(), code = ?output.status.code(), "notification script exited non-zero");
            }
            Ok(Err(e)) => {
                tracing::warn!(script = %script_path.display(), error = %e, "failed to run notification script");
            }
            Err(_) => {
                tracing::warn!(script = %script_path.display(), timeout = ?timeout, "notification script timed out");
            }
        }
    });
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ListId, VideoId};
    use std::time::Duration;

    #[test]
    fn build_env_sets_fields_for_download_completed() {
        let env = build_env(&NotificationEvent::DownloadCompleted { video_id: VideoId(7), path: "/a.mp4".to_string() });
        assert_eq!(env.get("VIDQUEUE_EVENT").map(String::as_str), Some("download_completed"));
        assert_eq!(env.get("VIDQUEUE_VIDEO_ID").map(String::as_str), Some("7"));
        assert_eq!(env.get("VIDQUEUE_PATH").map(String::as_str), Some("/a.mp4"));
    }

    #[test]
    fn build_env_sets_fields_for_sync_completed() {
        let env = build_env(&NotificationEvent::SyncCompleted { list_id: ListId(3), new_videos: 5 });
        assert_eq!(env.get("VIDQUEUE_LIST_ID").map(String::as_str), Some("3"));
        assert_eq!(env.get("VIDQUEUE_NEW_VIDEOS").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn notify_skips_scripts_not_subscribed_to_the_event() {
        let notifier = ScriptNotifier::new(vec![ScriptConfig {
            name: "test".to_string(),
            path: std::path::PathBuf::from("/bin/true"),
            events: vec!["sync_completed".to_string()],
            timeout: Duration::from_secs(1),
        }]);

        // no matching script means no process is spawned; nothing to await on,
        // this just exercises the filter path without panicking
        notifier.notify(NotificationEvent::DownloadCompleted { video_id: VideoId(1), path: "/a.mp4".to_string() });
    }

    #[tokio::test]
    async fn notify_runs_matching_script() {
        let notifier = ScriptNotifier::new(vec![ScriptConfig {
            name: "test".to_string(),
            path: std::path::PathBuf::from("/bin/true"),
            events: vec![],
            timeout: Duration::from_secs(2),
        }]);

        notifier.notify(NotificationEvent::SyncCompleted { list_id: ListId(1), new_videos: 1 });
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
