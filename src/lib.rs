//! # vidqueue
//!
//! Backend library for monitoring video channels and playlists and downloading
//! new videos per configurable quality profiles.
//!
//! ## Design Philosophy
//!
//! vidqueue is designed to be:
//! - **Highly configurable** - Profiles, schedules and notification sinks are all data
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - The REST API is an optional layer over an embeddable engine
//! - **Event-driven** - Consumers subscribe to topics on the event hub, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vidqueue::{Config, Engine, EventHub, MediaBackendConfig, NotifierRegistry, ProcessMediaBackend, Store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = Store::new(&config.store.database_url, config.store.network_share).await?;
//!     let hub = EventHub::new();
//!     let backend = Arc::new(ProcessMediaBackend::new((&config.media_backend).into()));
//!     let notifiers = NotifierRegistry::from_config(&config.notifications);
//!
//!     let engine = Engine::new(store, hub, backend, notifiers, config.engine.clone());
//!     engine.recover().await?;
//!     let _dispatcher = engine.spawn_dispatcher();
//!
//!     vidqueue::run_with_shutdown(engine).await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use std::time::Duration;

/// REST API layer (axum handlers, DTOs, OpenAPI docs)
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Task engine: queue, dispatcher, pause/cancel/retry
pub mod engine;
/// Error types
pub mod error;
/// In-process pub/sub hub backing streaming clients
pub mod event_hub;
/// External extractor/downloader backend abstraction
pub mod media_backend;
/// Outbound notification sinks (webhooks, scripts)
pub mod notifier;
/// In-memory download progress tracking
pub mod progress;
/// Time-of-day/day-of-week download permission windows
pub mod schedule_gate;
/// Pull-style streaming glue for SSE endpoints
pub mod stream_facade;
/// Core domain types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, EngineConfig, MediaBackendConfig, NotificationConfig, ServerConfig, StoreConfig};
pub use db::Store;
pub use engine::{Engine, EngineStats, PauseScope};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use event_hub::EventHub;
pub use media_backend::{MediaBackend, ProcessMediaBackend, ScriptedMediaBackend};
pub use notifier::{Notifier, NotifierRegistry};
pub use types::{
    ListId, ListType, MediaType, NotificationEvent, ProfileId, ScheduleId, SponsorBlockBehavior,
    SyncFrequency, TaskId, TaskLogLevel, TaskStatus, TaskType, VideoId, Weekday,
};

/// Helper function to run the engine with graceful signal handling.
///
/// Waits for a termination signal and then calls [`Engine::shutdown`] with a
/// 30 second grace period for in-flight tasks to finish.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use vidqueue::{Config, Engine, EventHub, NotifierRegistry, ProcessMediaBackend};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let store = vidqueue::Store::new(&config.store.database_url, config.store.network_share).await?;
///     let backend = Arc::new(ProcessMediaBackend::new((&config.media_backend).into()));
///     let engine = Engine::new(store, EventHub::new(), backend, NotifierRegistry::empty(), config.engine.clone());
///
///     vidqueue::run_with_shutdown(engine).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(engine: Engine) {
    wait_for_signal().await;
    engine.shutdown(Duration::from_secs(30)).await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
