//! Thin REST surface over [`crate::engine::Engine`].
//!
//! Deliberately minimal per the core's scope: handlers validate path/query
//! shape via axum extractors and otherwise just call through to `Engine`/
//! `Store`, mapping domain errors to HTTP responses via
//! [`crate::error::ToHttpStatus`]. No request-body business validation lives
//! here beyond what serde's `Deserialize` already rejects.

pub mod dto;
pub mod error_response;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::error::{Error, Result};

pub use state::AppState;

/// OpenAPI document for the whole surface, assembled from every route
/// module's handlers and the DTOs they carry.
#[derive(OpenApi)]
#[openapi(
    paths(
        routes::profiles::list_profiles,
        routes::profiles::get_profile,
        routes::profiles::create_profile,
        routes::profiles::update_profile,
        routes::profiles::delete_profile,
        routes::lists::list_lists,
        routes::lists::get_list,
        routes::lists::create_list,
        routes::lists::update_list,
        routes::lists::delete_list,
        routes::lists::sync_list,
        routes::videos::list_videos,
        routes::videos::get_video,
        routes::videos::download_video,
        routes::tasks::list_tasks,
        routes::tasks::get_task,
        routes::tasks::get_task_logs,
        routes::tasks::cancel_task,
        routes::tasks::retry_task,
        routes::tasks::engine_stats,
        routes::tasks::pause_engine,
        routes::tasks::resume_engine,
        routes::schedules::list_schedules,
        routes::schedules::get_schedule,
        routes::schedules::create_schedule,
        routes::schedules::update_schedule,
        routes::schedules::delete_schedule,
        routes::history::list_history,
        routes::history::list_history_for_list,
        routes::settings::get_settings,
        routes::settings::update_settings,
        routes::settings::get_raw_setting,
        routes::settings::put_raw_setting,
        routes::streams::stream_lists,
        routes::streams::stream_tasks,
        routes::streams::stream_engine_stats,
        routes::streams::stream_progress,
        routes::streams::stream_list_tasks,
        routes::streams::stream_list_history,
    ),
    components(schemas(
        dto::ProfileDto,
        dto::ProfileRequest,
        dto::ListDto,
        dto::ListRequest,
        dto::VideoDto,
        dto::TaskDto,
        dto::TaskLogDto,
        dto::ScheduleDto,
        dto::ScheduleRequest,
        dto::HistoryEntryDto,
        dto::EngineStatsDto,
        dto::ProgressDto,
        routes::settings::SettingsDto,
        routes::settings::SettingsUpdateRequest,
        routes::settings::SettingValue,
        routes::tasks::PauseScopeRequest,
        routes::tasks::PauseScopeDto,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "profiles", description = "Download quality profiles"),
        (name = "lists", description = "Monitored channels/playlists"),
        (name = "videos", description = "Videos discovered by sync"),
        (name = "tasks", description = "Queued sync/download tasks"),
        (name = "engine", description = "Worker-pool stats and pause/resume control"),
        (name = "schedules", description = "Download-permission time windows"),
        (name = "history", description = "Audit log of list/video/task events"),
        (name = "settings", description = "Process-wide settings"),
        (name = "streams", description = "Server-sent event feeds"),
    )
)]
pub struct ApiDoc;

/// Assemble the full router: every entity route, the SSE feeds, and
/// (conditionally) Swagger UI and CORS, layered per `config.server`.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        // Profiles
        .route("/api/v1/profiles", get(routes::profiles::list_profiles).post(routes::profiles::create_profile))
        .route(
            "/api/v1/profiles/:id",
            get(routes::profiles::get_profile).put(routes::profiles::update_profile).delete(routes::profiles::delete_profile),
        )
        // Lists
        .route("/api/v1/lists", get(routes::lists::list_lists).post(routes::lists::create_list))
        .route(
            "/api/v1/lists/:id",
            get(routes::lists::get_list).put(routes::lists::update_list).delete(routes::lists::delete_list),
        )
        .route("/api/v1/lists/:id/sync", post(routes::lists::sync_list))
        // Videos
        .route("/api/v1/lists/:list_id/videos", get(routes::videos::list_videos))
        .route("/api/v1/videos/:id", get(routes::videos::get_video))
        .route("/api/v1/videos/:id/download", post(routes::videos::download_video))
        // Tasks + engine control
        .route("/api/v1/tasks", get(routes::tasks::list_tasks))
        .route("/api/v1/tasks/:id", get(routes::tasks::get_task))
        .route("/api/v1/tasks/:id/logs", get(routes::tasks::get_task_logs))
        .route("/api/v1/tasks/:id/cancel", post(routes::tasks::cancel_task))
        .route("/api/v1/tasks/:id/retry", post(routes::tasks::retry_task))
        .route("/api/v1/engine/stats", get(routes::tasks::engine_stats))
        .route("/api/v1/engine/pause", post(routes::tasks::pause_engine))
        .route("/api/v1/engine/resume", post(routes::tasks::resume_engine))
        // Schedules
        .route("/api/v1/schedules", get(routes::schedules::list_schedules).post(routes::schedules::create_schedule))
        .route(
            "/api/v1/schedules/:id",
            get(routes::schedules::get_schedule).put(routes::schedules::update_schedule).delete(routes::schedules::delete_schedule),
        )
        // History
        .route("/api/v1/history", get(routes::history::list_history))
        .route("/api/v1/lists/:list_id/history", get(routes::history::list_history_for_list))
        // Settings
        .route("/api/v1/settings", get(routes::settings::get_settings).patch(routes::settings::update_settings))
        .route(
            "/api/v1/settings/:key",
            get(routes::settings::get_raw_setting).put(routes::settings::put_raw_setting),
        )
        // Streams
        .route("/api/v1/stream/lists", get(routes::streams::stream_lists))
        .route("/api/v1/stream/tasks", get(routes::streams::stream_tasks))
        .route("/api/v1/stream/engine/stats", get(routes::streams::stream_engine_stats))
        .route("/api/v1/stream/progress", get(routes::streams::stream_progress))
        .route("/api/v1/stream/lists/:list_id/tasks", get(routes::streams::stream_list_tasks))
        .route("/api/v1/stream/lists/:list_id/history", get(routes::streams::stream_list_history))
        // Liveness probe, unauthenticated and undocumented
        .route("/health", get(health));

    let router = if config.server.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.server.cors_enabled {
        router.layer(build_cors_layer(&config.server.cors_origins))
    } else {
        router
    }
}

async fn health() -> &'static str {
    "ok"
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(allowed)).allow_methods(Any).allow_headers(Any)
    }
}

/// Bind and serve the router on `config.server.bind_address` until the
/// process receives a shutdown signal. The caller is responsible for
/// stopping [`crate::engine::Engine`] separately (see [`crate::run_with_shutdown`]);
/// this only owns the HTTP listener's lifetime.
pub async fn serve(state: AppState) -> Result<()> {
    let bind_address = state.config.server.bind_address;
    let app = create_router(state);

    let listener = TcpListener::bind(bind_address).await.map_err(Error::Io)?;
    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app).await.map_err(|e| Error::Other(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
