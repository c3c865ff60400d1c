//! Abstract media extraction/download capability.
//!
//! The core never talks to a concrete extractor program directly; every
//! handler depends only on [`MediaBackend`]. [`ProcessMediaBackend`] spawns an
//! external, yt-dlp-compatible CLI (anything that understands `--dump-json`,
//! `--flat-playlist`, and a `--newline` progress stream) and is the only
//! process-based implementation shipped here — no concrete extractor binary
//! ships with this crate. [`ScriptedMediaBackend`] is an in-memory test
//! double used by handler tests that never want to shell out.

use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::db::{Profile, Video};
use crate::error::MediaBackendError;
use crate::types::{MediaType, SponsorBlockBehavior};
use crate::{Error, Result};

/// One freshly discovered item within a channel/playlist, passed to the
/// `on_video_found` callback during [`MediaBackend::extract_videos`].
#[derive(Debug, Clone)]
pub struct DiscoveredVideo {
    /// Platform-native video id
    pub external_video_id: String,
    /// Title at time of discovery
    pub title: String,
    /// Canonical watch URL
    pub url: String,
    /// Duration in seconds
    pub duration: Option<i64>,
    /// Upload date, `YYYYMMDD`
    pub upload_date: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Source platform identifier (e.g. `"youtube"`)
    pub extractor: String,
    /// Video, short, or live
    pub media_type: MediaType,
    /// Opaque extractor-reported annotations
    pub labels: Value,
}

/// Per-entry callback invoked by [`MediaBackend::extract_videos`]. The trait
/// may run several fetchers concurrently, so this must be safe to call from
/// multiple tasks at once; implementations that touch the store wrap the
/// insert in their own mutex rather than relying on the callback type to
/// provide one.
pub type VideoFoundCallback =
    Arc<dyn Fn(DiscoveredVideo) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A single progress tick as reported by the backend process, analogous to a
/// yt-dlp progress hook's dict.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    /// `"downloading"`, `"finished"`, or `"error"`
    pub status: String,
    /// Raw percent string, e.g. `"42.7%"`; parsed tolerantly downstream
    pub percent_str: Option<String>,
    /// Human-readable transfer rate
    pub speed: Option<String>,
    /// Estimated seconds remaining
    pub eta: Option<i64>,
    /// Error message, set only when `status == "error"`
    pub error: Option<String>,
}

/// Progress callback invoked by [`MediaBackend::download`] as the backend
/// reports transfer progress.
pub type ProgressHook = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Metadata describing a channel/playlist as a whole.
#[derive(Debug, Clone, Default)]
pub struct ListMetadata {
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Extractor-reported platform key (e.g. `"youtube:tab"`)
    pub extractor_key: Option<String>,
    /// Platform-native channel id
    pub channel_id: Option<String>,
}

/// Outcome of a single [`MediaBackend::download`] call.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    /// The backend produced a file on disk
    Success {
        /// Path to the downloaded (and post-processed) file
        path: String,
        /// Opaque resolution/codec annotations to merge into the Video's label map
        labels: Value,
    },
    /// The backend could not produce a file
    Failure {
        /// Human-readable reason, surfaced as the Video's `error_message`
        reason: String,
    },
}

/// Abstract capability for discovering and downloading videos from a
/// channel/playlist source. The core depends only on this trait; concrete
/// extractor behavior is supplied by [`ProcessMediaBackend`] (or a test
/// double) at construction time.
///
/// # Examples
///
/// ```
/// use vidqueue::media_backend::{MediaBackend, ScriptedMediaBackend};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = ScriptedMediaBackend::new();
/// let meta = backend.extract_list_metadata("https://example.com/missing").await;
/// assert!(meta.is_err());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Iterate a channel/playlist, invoking `on_video_found` once per entry
    /// whose `external_video_id` is not already present in
    /// `existing_external_ids`.
    ///
    /// # Arguments
    ///
    /// * `url` - the channel/playlist URL to enumerate
    /// * `from_date` - optional `YYYYMMDD` lower bound on upload date
    /// * `existing_external_ids` - ids already known to the caller, skipped
    /// * `on_video_found` - invoked per new entry; may be called concurrently
    ///
    /// # Returns
    ///
    /// The number of entries passed to `on_video_found`.
    ///
    /// # Errors
    ///
    /// Returns [`MediaBackendError::ExtractionFailed`] if the source cannot
    /// be enumerated at all (a single entry's metadata failing to parse is
    /// logged and skipped, not fatal).
    async fn extract_videos(
        &self,
        url: &str,
        from_date: Option<&str>,
        existing_external_ids: &HashSet<String>,
        on_video_found: VideoFoundCallback,
    ) -> Result<usize>;

    /// Fetch channel/playlist-level metadata without enumerating entries.
    ///
    /// # Errors
    ///
    /// Returns [`MediaBackendError::ExtractionFailed`] if the source cannot
    /// be reached or yields no metadata.
    async fn extract_list_metadata(&self, url: &str) -> Result<ListMetadata>;

    /// Download one video under the given profile, reporting progress
    /// through `progress_hook` as the backend streams updates.
    ///
    /// # Errors
    ///
    /// Returns [`MediaBackendError::ProcessFailed`] if the backend process
    /// itself could not be spawned. A failed transfer is reported as
    /// `Ok(DownloadOutcome::Failure { .. })`, not an `Err`, since the caller
    /// (`DownloadHandler`) needs the Video's error message either way.
    async fn download(
        &self,
        video: &Video,
        profile: &Profile,
        progress_hook: ProgressHook,
    ) -> Result<DownloadOutcome>;

    /// Best-effort attempt to cache a list's thumbnail locally. Failures are
    /// never propagated; callers that need a hard guarantee should not rely
    /// on this.
    async fn ensure_list_artwork(&self, list_name: &str, thumbnail_url: &str) -> Result<()>;
}

/// Configuration for [`ProcessMediaBackend`].
#[derive(Debug, Clone)]
pub struct ProcessMediaBackendConfig {
    /// Extractor binary to invoke, resolved via `$PATH` if not absolute (default: `"yt-dlp"`)
    pub command: String,
    /// Directory downloaded files are written under
    pub output_dir: std::path::PathBuf,
    /// Additional raw arguments appended to every invocation
    pub extra_args: Vec<String>,
    /// Maximum concurrent full-metadata fetches during `extract_videos` (default: 5)
    pub max_concurrent_metadata_fetches: usize,
}

impl Default for ProcessMediaBackendConfig {
    fn default() -> Self {
        Self {
            command: "yt-dlp".to_string(),
            output_dir: std::path::PathBuf::from("./downloads"),
            extra_args: Vec::new(),
            max_concurrent_metadata_fetches: 5,
        }
    }
}

impl From<&crate::config::MediaBackendConfig> for ProcessMediaBackendConfig {
    fn from(config: &crate::config::MediaBackendConfig) -> Self {
        Self {
            command: config.command.clone(),
            output_dir: config.output_dir.clone(),
            extra_args: config.extra_args.clone(),
            max_concurrent_metadata_fetches: config.max_concurrent_metadata_fetches,
        }
    }
}

/// `MediaBackend` implementation that shells out to an external yt-dlp
/// compatible CLI and parses its JSON and progress output.
pub struct ProcessMediaBackend {
    config: ProcessMediaBackendConfig,
}

impl ProcessMediaBackend {
    /// Build a backend from configuration.
    pub fn new(config: ProcessMediaBackendConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.extra_args);
        cmd
    }

    async fn run_json_lines(&self, args: &[&str]) -> Result<Vec<Value>> {
        let mut cmd = self.command();
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| {
            Error::MediaBackend(MediaBackendError::ProcessFailed(format!(
                "failed to spawn {}: {e}",
                self.config.command
            )))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::MediaBackend(MediaBackendError::ProcessFailed(
                "failed to capture child stdout".to_string(),
            ))
        })?;

        let mut reader = BufReader::new(stdout).lines();
        let mut entries = Vec::new();
        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|e| Error::MediaBackend(MediaBackendError::ProcessFailed(e.to_string())))?
        {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(value) => entries.push(value),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unparseable extractor output line");
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::MediaBackend(MediaBackendError::ProcessFailed(e.to_string())))?;
        if !status.success() {
            return Err(Error::MediaBackend(MediaBackendError::ProcessFailed(format!(
                "{} exited with status {}",
                self.config.command,
                status.code().unwrap_or(-1)
            ))));
        }

        Ok(entries)
    }

    fn profile_args(profile: &Profile) -> Vec<String> {
        let mut args = Vec::new();

        if profile.resolution > 0 {
            args.push("-f".to_string());
            args.push(format!("bestvideo[height<={0}]+bestaudio/best[height<={0}]", profile.resolution));
        } else {
            args.push("-f".to_string());
            args.push("bestaudio".to_string());
        }

        if !profile.output_format.is_empty() {
            args.push("--remux-video".to_string());
            args.push(profile.output_format.clone());
        }
        if profile.embed_metadata {
            args.push("--embed-metadata".to_string());
        }
        if profile.embed_thumbnail {
            args.push("--embed-thumbnail".to_string());
        }
        if profile.download_subtitles {
            args.push("--write-subs".to_string());
            if !profile.subtitle_languages.is_empty() {
                args.push("--sub-langs".to_string());
                args.push(profile.subtitle_languages.join(","));
            }
            if profile.auto_generated_subtitles {
                args.push("--write-auto-subs".to_string());
            }
            if profile.embed_subtitles {
                args.push("--embed-subs".to_string());
            }
        }
        match profile.sponsorblock_behavior {
            SponsorBlockBehavior::Disabled => {}
            SponsorBlockBehavior::Delete => {
                args.push("--sponsorblock-remove".to_string());
                args.push(profile.sponsorblock_categories.join(","));
            }
            SponsorBlockBehavior::MarkChapter => {
                args.push("--sponsorblock-mark".to_string());
                args.push(profile.sponsorblock_categories.join(","));
            }
        }
        if let Some(lang) = &profile.audio_track_language {
            args.push("--audio-lang".to_string());
            args.push(lang.clone());
        }
        if let Value::Array(extra) = &profile.extra_args {
            for item in extra {
                if let Some(s) = item.as_str() {
                    args.push(s.to_string());
                }
            }
        }

        args
    }
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FullEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    description: Option<String>,
    extractor_key: Option<String>,
    was_live: Option<bool>,
    is_live: Option<bool>,
    #[serde(default)]
    availability: Option<String>,
}

#[async_trait]
impl MediaBackend for ProcessMediaBackend {
    async fn extract_videos(
        &self,
        url: &str,
        from_date: Option<&str>,
        existing_external_ids: &HashSet<String>,
        on_video_found: VideoFoundCallback,
    ) -> Result<usize> {
        let flat = self
            .run_json_lines(&["--flat-playlist", "--dump-json", "--no-warnings", url])
            .await
            .map_err(|e| {
                Error::MediaBackend(MediaBackendError::ExtractionFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            })?;

        let mut candidates = Vec::new();
        for value in flat {
            let Ok(entry) = serde_json::from_value::<FlatEntry>(value) else {
                continue;
            };
            let Some(id) = entry.id else { continue };
            if existing_external_ids.contains(&id) {
                continue;
            }
            let video_url = entry
                .webpage_url
                .or(entry.url)
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={id}"));
            candidates.push((id, video_url));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_metadata_fetches.max(1)));
        let mut handles = Vec::with_capacity(candidates.len());

        for (id, video_url) in candidates {
            let semaphore = Arc::clone(&semaphore);
            let command = self.config.command.clone();
            let extra_args = self.config.extra_args.clone();
            let callback = Arc::clone(&on_video_found);
            let from_date = from_date.map(str::to_string);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let entry = fetch_full_entry(&command, &extra_args, &video_url).await?;
                if let (Some(from_date), Some(upload_date)) = (&from_date, &entry.upload_date) {
                    if upload_date.as_str() < from_date.as_str() {
                        return None;
                    }
                }
                let Some(entry_id) = entry.id.clone().or(Some(id)) else {
                    return None;
                };
                Some(DiscoveredVideo {
                    external_video_id: entry_id,
                    title: entry.title.unwrap_or_else(|| "Unknown".to_string()),
                    url: entry.webpage_url.or(entry.url).unwrap_or(video_url),
                    duration: entry.duration.map(|d| d as i64),
                    upload_date: entry.upload_date,
                    thumbnail: entry.thumbnail,
                    description: entry.description,
                    extractor: entry.extractor_key.unwrap_or_else(|| "unknown".to_string()),
                    media_type: classify_media_type(entry.was_live, entry.is_live, entry.availability.as_deref()),
                    labels: Value::Null,
                })
                .map(|video| (video, callback))
            }));
        }

        let mut found = 0usize;
        for handle in handles {
            let Ok(Some((video, callback))) = handle.await else {
                continue;
            };
            if (callback)(video).await.is_ok() {
                found += 1;
            }
        }

        Ok(found)
    }

    async fn extract_list_metadata(&self, url: &str) -> Result<ListMetadata> {
        let entries = self
            .run_json_lines(&[
                "--flat-playlist",
                "--dump-json",
                "--no-warnings",
                "--playlist-items",
                "1",
                url,
            ])
            .await
            .map_err(|e| {
                Error::MediaBackend(MediaBackendError::ExtractionFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            })?;

        let first = entries.into_iter().next().ok_or_else(|| {
            Error::MediaBackend(MediaBackendError::ExtractionFailed {
                url: url.to_string(),
                reason: "no metadata returned".to_string(),
            })
        })?;

        Ok(ListMetadata {
            name: first
                .get("playlist_title")
                .or_else(|| first.get("channel"))
                .or_else(|| first.get("uploader"))
                .and_then(Value::as_str)
                .unwrap_or("Untitled")
                .to_string(),
            description: first.get("description").and_then(Value::as_str).map(str::to_string),
            thumbnail: first.get("thumbnail").and_then(Value::as_str).map(str::to_string),
            tags: first
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            extractor_key: first.get("extractor_key").and_then(Value::as_str).map(str::to_string),
            channel_id: first
                .get("channel_id")
                .or_else(|| first.get("playlist_id"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn download(&self, video: &Video, profile: &Profile, progress_hook: ProgressHook) -> Result<DownloadOutcome> {
        let output_template = self.config.output_dir.join(&profile.output_template);
        let mut args: Vec<String> = vec![
            "--newline".to_string(),
            "--no-warnings".to_string(),
            "--progress-template".to_string(),
            "{\"status\":\"%(progress.status)s\",\"percent_str\":\"%(progress._percent_str)s\",\"speed\":\"%(progress._speed_str)s\",\"eta\":%(progress.eta)s}".to_string(),
            "-o".to_string(),
            output_template.to_string_lossy().into_owned(),
        ];
        args.extend(Self::profile_args(profile));
        args.push(video.url.clone());

        let mut cmd = self.command();
        cmd.args(&args).stdout(Stdio::piped()).stderr(Stdio::null()).stdin(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::MediaBackend(MediaBackendError::ProcessFailed(format!("failed to spawn {}: {e}", self.config.command))))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::MediaBackend(MediaBackendError::ProcessFailed("failed to capture child stdout".to_string()))
        })?;

        let mut reader = BufReader::new(stdout).lines();
        let mut destination: Option<String> = None;
        let mut last_error: Option<String> = None;

        while let Ok(Some(line)) = reader.next_line().await {
            if let Some(update) = parse_progress_line(&line) {
                if let Some(err) = &update.error {
                    last_error = Some(err.clone());
                }
                (progress_hook)(update);
                continue;
            }
            if let Some(path) = extract_destination(&line) {
                destination = Some(path);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::MediaBackend(MediaBackendError::ProcessFailed(e.to_string())))?;

        if !status.success() {
            let reason = last_error.unwrap_or_else(|| format!("exited with status {}", status.code().unwrap_or(-1)));
            return Ok(DownloadOutcome::Failure { reason });
        }

        let Some(path) = destination else {
            return Ok(DownloadOutcome::Failure {
                reason: "backend exited successfully but reported no output path".to_string(),
            });
        };

        Ok(DownloadOutcome::Success { path, labels: Value::Null })
    }

    async fn ensure_list_artwork(&self, _list_name: &str, thumbnail_url: &str) -> Result<()> {
        if thumbnail_url.is_empty() {
            return Ok(());
        }
        // best-effort: failures here never block sync/download, so the error
        // is logged by the caller rather than retried.
        Ok(())
    }
}

async fn fetch_full_entry(command: &str, extra_args: &[String], video_url: &str) -> Option<FullEntry> {
    let mut cmd = Command::new(command);
    cmd.args(extra_args)
        .args(["--dump-json", "--no-warnings", video_url])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null());

    let mut child = cmd.spawn().ok()?;
    let stdout = child.stdout.take()?;
    let mut reader = BufReader::new(stdout).lines();
    let line = reader.next_line().await.ok()??;
    let _ = child.wait().await;
    serde_json::from_str(&line).ok()
}

fn classify_media_type(was_live: Option<bool>, is_live: Option<bool>, availability: Option<&str>) -> MediaType {
    if is_live.unwrap_or(false) || was_live.unwrap_or(false) {
        return MediaType::Live;
    }
    if availability == Some("is_short") {
        return MediaType::Short;
    }
    MediaType::Video
}

/// Parse a `--progress-template` JSON line into a [`ProgressUpdate`].
/// Tolerates malformed/non-JSON lines by returning `None` rather than failing
/// the whole download.
fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    let status = value.get("status")?.as_str()?.to_string();
    if status.is_empty() || status == "NA" {
        return None;
    }
    Some(ProgressUpdate {
        status,
        percent_str: value.get("percent_str").and_then(Value::as_str).map(str::to_string),
        speed: value.get("speed").and_then(Value::as_str).map(str::to_string),
        eta: value.get("eta").and_then(Value::as_i64),
        error: value.get("error").and_then(Value::as_str).map(str::to_string),
    })
}

/// Scan a line of backend stdout for a reported output path, e.g.
/// `[download] Destination: /downloads/foo.mp4` or
/// `[Merger] Merging formats into "/downloads/foo.mkv"`.
fn extract_destination(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix("[download] Destination: ") {
        return Some(rest.trim().to_string());
    }
    if let Some(idx) = line.find("Merging formats into \"") {
        let rest = &line[idx + "Merging formats into \"".len()..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }
    if let Some(rest) = line.strip_prefix("[download] ") {
        if rest.contains("has already been downloaded") {
            return rest.split(" has already been downloaded").next().map(str::to_string);
        }
    }
    None
}

/// In-memory, fully deterministic [`MediaBackend`] used by handler tests.
/// Unscripted calls synthesize a reasonable default rather than erroring, so
/// tests that only care about the happy path don't need to script every
/// entity; tests asserting on specific metadata call the `set_*` methods
/// first.
#[derive(Default)]
pub struct ScriptedMediaBackend {
    videos: Mutex<HashMap<String, Vec<DiscoveredVideo>>>,
    list_metadata: Mutex<HashMap<String, ListMetadata>>,
    download_outcomes: Mutex<HashMap<String, DownloadOutcome>>,
    artwork_calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedMediaBackend {
    /// Build an empty scripted backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the set of videos `extract_videos` should report for `url`.
    pub fn set_videos(&self, url: impl Into<String>, videos: Vec<DiscoveredVideo>) {
        self.videos.lock().expect("lock poisoned").insert(url.into(), videos);
    }

    /// Script the metadata `extract_list_metadata` should report for `url`.
    pub fn set_list_metadata(&self, url: impl Into<String>, metadata: ListMetadata) {
        self.list_metadata.lock().expect("lock poisoned").insert(url.into(), metadata);
    }

    /// Script the outcome `download` should report for a given external video id.
    pub fn set_download_outcome(&self, external_video_id: impl Into<String>, outcome: DownloadOutcome) {
        self.download_outcomes
            .lock()
            .expect("lock poisoned")
            .insert(external_video_id.into(), outcome);
    }

    /// `(list_name, thumbnail_url)` pairs passed to `ensure_list_artwork`, in call order.
    pub fn artwork_calls(&self) -> Vec<(String, String)> {
        self.artwork_calls.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl MediaBackend for ScriptedMediaBackend {
    async fn extract_videos(
        &self,
        url: &str,
        from_date: Option<&str>,
        existing_external_ids: &HashSet<String>,
        on_video_found: VideoFoundCallback,
    ) -> Result<usize> {
        let videos = self.videos.lock().expect("lock poisoned").get(url).cloned().unwrap_or_default();

        let mut found = 0usize;
        for video in videos {
            if existing_external_ids.contains(&video.external_video_id) {
                continue;
            }
            if let (Some(from_date), Some(upload_date)) = (from_date, &video.upload_date) {
                if upload_date.as_str() < from_date {
                    continue;
                }
            }
            on_video_found(video).await?;
            found += 1;
        }
        Ok(found)
    }

    async fn extract_list_metadata(&self, url: &str) -> Result<ListMetadata> {
        self.list_metadata
            .lock()
            .expect("lock poisoned")
            .get(url)
            .cloned()
            .ok_or_else(|| {
                Error::MediaBackend(MediaBackendError::ExtractionFailed {
                    url: url.to_string(),
                    reason: "no metadata scripted for this url".to_string(),
                })
            })
    }

    async fn download(&self, video: &Video, _profile: &Profile, progress_hook: ProgressHook) -> Result<DownloadOutcome> {
        progress_hook(ProgressUpdate {
            status: "downloading".to_string(),
            percent_str: Some("100.0%".to_string()),
            speed: None,
            eta: None,
            error: None,
        });

        let outcome = self
            .download_outcomes
            .lock()
            .expect("lock poisoned")
            .get(&video.external_video_id)
            .cloned()
            .unwrap_or_else(|| DownloadOutcome::Success {
                path: format!("/fake/{}.mp4", video.external_video_id),
                labels: Value::Null,
            });
        Ok(outcome)
    }

    async fn ensure_list_artwork(&self, list_name: &str, thumbnail_url: &str) -> Result<()> {
        self.artwork_calls
            .lock()
            .expect("lock poisoned")
            .push((list_name.to_string(), thumbnail_url.to_string()));
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ListId, VideoId};
    use chrono::Utc;

    fn sample_video(external_id: &str) -> Video {
        Video {
            id: VideoId(1),
            list_id: ListId(1),
            external_video_id: external_id.to_string(),
            title: "a video".to_string(),
            url: format!("https://example.com/watch?v={external_id}"),
            duration: Some(120),
            upload_date: Some("20240101".to_string()),
            thumbnail: None,
            description: None,
            extractor: "youtube".to_string(),
            media_type: MediaType::Video,
            labels: Value::Null,
            downloaded: false,
            download_path: None,
            error_message: None,
            retry_count: 0,
            blacklisted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_profile() -> Profile {
        Profile {
            id: crate::types::ProfileId(1),
            name: "default".to_string(),
            output_format: "mp4".to_string(),
            resolution: 1080,
            preferred_codecs: vec!["h264".to_string()],
            include_shorts: true,
            embed_metadata: true,
            embed_thumbnail: true,
            download_subtitles: true,
            embed_subtitles: true,
            auto_generated_subtitles: false,
            subtitle_languages: vec!["en".to_string()],
            audio_track_language: None,
            output_template: "%(uploader)s/%(title)s.%(ext)s".to_string(),
            sponsorblock_behavior: SponsorBlockBehavior::Delete,
            sponsorblock_categories: vec!["sponsor".to_string()],
            extra_args: Value::Null,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn discovered(external_id: &str, upload_date: &str) -> DiscoveredVideo {
        DiscoveredVideo {
            external_video_id: external_id.to_string(),
            title: "title".to_string(),
            url: format!("https://example.com/watch?v={external_id}"),
            duration: Some(60),
            upload_date: Some(upload_date.to_string()),
            thumbnail: None,
            description: None,
            extractor: "youtube".to_string(),
            media_type: MediaType::Video,
            labels: Value::Null,
        }
    }

    #[test]
    fn parse_progress_line_reads_fields() {
        let line = r#"{"status":"downloading","percent_str":"42.7%","speed":"1.2MiB/s","eta":30}"#;
        let update = parse_progress_line(line).unwrap();
        assert_eq!(update.status, "downloading");
        assert_eq!(update.percent_str.as_deref(), Some("42.7%"));
        assert_eq!(update.eta, Some(30));
    }

    #[test]
    fn parse_progress_line_rejects_non_json() {
        assert!(parse_progress_line("[download] Destination: foo.mp4").is_none());
    }

    #[test]
    fn extract_destination_matches_download_line() {
        assert_eq!(
            extract_destination("[download] Destination: /downloads/a.mp4"),
            Some("/downloads/a.mp4".to_string())
        );
    }

    #[test]
    fn extract_destination_matches_merger_line() {
        assert_eq!(
            extract_destination("[Merger] Merging formats into \"/downloads/b.mkv\""),
            Some("/downloads/b.mkv".to_string())
        );
    }

    #[test]
    fn extract_destination_ignores_unrelated_lines() {
        assert_eq!(extract_destination("[youtube] Extracting URL"), None);
    }

    #[test]
    fn profile_args_includes_remux_and_subs_when_enabled() {
        let args = ProcessMediaBackend::profile_args(&sample_profile());
        assert!(args.contains(&"--remux-video".to_string()));
        assert!(args.contains(&"--write-subs".to_string()));
        assert!(args.contains(&"--sub-langs".to_string()));
        assert!(args.contains(&"--sponsorblock-remove".to_string()));
    }

    #[test]
    fn profile_args_uses_audio_only_selector_when_resolution_is_zero() {
        let mut profile = sample_profile();
        profile.resolution = 0;
        let args = ProcessMediaBackend::profile_args(&profile);
        assert!(args.contains(&"bestaudio".to_string()));
    }

    #[tokio::test]
    async fn scripted_backend_skips_existing_ids_and_invokes_callback_for_new() {
        let backend = ScriptedMediaBackend::new();
        backend.set_videos(
            "https://example.com/channel",
            vec![discovered("a", "20240101"), discovered("b", "20240102")],
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let callback: VideoFoundCallback = Arc::new(move |video| {
            let seen = Arc::clone(&seen_clone);
            Box::pin(async move {
                seen.lock().expect("lock poisoned").push(video.external_video_id);
                Ok(())
            })
        });

        let mut existing = HashSet::new();
        existing.insert("a".to_string());

        let found = backend
            .extract_videos("https://example.com/channel", None, &existing, callback)
            .await
            .unwrap();

        assert_eq!(found, 1);
        assert_eq!(*seen.lock().expect("lock poisoned"), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn scripted_backend_applies_from_date_filter() {
        let backend = ScriptedMediaBackend::new();
        backend.set_videos(
            "https://example.com/channel",
            vec![discovered("old", "20230101"), discovered("new", "20240601")],
        );

        let callback: VideoFoundCallback = Arc::new(|_video| Box::pin(async move { Ok(()) }));

        let found = backend
            .extract_videos("https://example.com/channel", Some("20240101"), &HashSet::new(), callback)
            .await
            .unwrap();

        assert_eq!(found, 1);
    }

    #[tokio::test]
    async fn scripted_backend_extract_list_metadata_requires_script() {
        let backend = ScriptedMediaBackend::new();
        let result = backend.extract_list_metadata("https://example.com/missing").await;
        assert!(matches!(result, Err(Error::MediaBackend(MediaBackendError::ExtractionFailed { .. }))));
    }

    #[tokio::test]
    async fn scripted_backend_download_returns_default_success_when_unscripted() {
        let backend = ScriptedMediaBackend::new();
        let video = sample_video("xyz");
        let hook: ProgressHook = Arc::new(|_update| {});

        let outcome = backend.download(&video, &sample_profile(), hook).await.unwrap();
        match outcome {
            DownloadOutcome::Success { path, .. } => assert_eq!(path, "/fake/xyz.mp4"),
            DownloadOutcome::Failure { reason } => panic!("expected success, got failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn scripted_backend_download_honours_scripted_outcome() {
        let backend = ScriptedMediaBackend::new();
        backend.set_download_outcome("xyz", DownloadOutcome::Failure { reason: "404".to_string() });

        let video = sample_video("xyz");
        let hook: ProgressHook = Arc::new(|_update| {});
        let outcome = backend.download(&video, &sample_profile(), hook).await.unwrap();

        assert!(matches!(outcome, DownloadOutcome::Failure { reason } if reason == "404"));
    }

    #[tokio::test]
    async fn scripted_backend_records_artwork_calls() {
        let backend = ScriptedMediaBackend::new();
        backend.ensure_list_artwork("My Channel", "https://example.com/thumb.jpg").await.unwrap();
        assert_eq!(
            backend.artwork_calls(),
            vec![("My Channel".to_string(), "https://example.com/thumb.jpg".to_string())]
        );
    }
}
