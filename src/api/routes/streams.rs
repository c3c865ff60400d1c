//! Server-sent event endpoints, each a thin adapter from a
//! [`crate::stream_facade::StreamFacade`] stream to axum's SSE response type.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use futures::StreamExt;

use crate::api::dto::{EngineStatsDto, ListDto, ProgressDto, TaskDto};
use crate::api::state::AppState;
use crate::event_hub::topics;
use crate::stream_facade::{StreamEvent, StreamFacade};
use crate::types::{ListId, TaskType};

fn to_sse<T: serde::Serialize>(event: StreamEvent<T>) -> Result<Event, Infallible> {
    match event {
        StreamEvent::Data(data) => {
            Ok(Event::default().event("data").json_data(data).unwrap_or_else(|_| Event::default().event("error")))
        }
        StreamEvent::Heartbeat => Ok(Event::default().event("heartbeat").data("")),
    }
}

/// GET /api/v1/stream/tasks - Live task list, re-pushed on every change
#[utoipa::path(
    get,
    path = "/api/v1/stream/tasks",
    tag = "streams",
    responses((status = 200, description = "SSE stream of the full task list"))
)]
pub async fn stream_tasks(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hub = state.hub.clone();
    let heartbeat = state.config.engine.heartbeat_interval;
    let fetch_state = state.clone();

    let fetch = Arc::new(move || {
        let state = fetch_state.clone();
        Box::pin(async move {
            let tasks = state.engine.store.list_tasks(None, 200).await?;
            Ok(tasks.into_iter().map(TaskDto::from).collect::<Vec<_>>())
        }) as futures::future::BoxFuture<'static, crate::error::Result<Vec<TaskDto>>>
    });

    let stream = StreamFacade::stream(hub, topics::TASKS, heartbeat, fetch).map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/v1/stream/lists - Live list roster, re-pushed on every insert/update/delete
#[utoipa::path(
    get,
    path = "/api/v1/stream/lists",
    tag = "streams",
    responses((status = 200, description = "SSE stream of the full list roster"))
)]
pub async fn stream_lists(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hub = state.hub.clone();
    let heartbeat = state.config.engine.heartbeat_interval;
    let fetch_state = state.clone();

    let fetch = Arc::new(move || {
        let state = fetch_state.clone();
        Box::pin(async move {
            let lists = state.engine.store.list_lists(false).await?;
            Ok(lists.into_iter().map(ListDto::from).collect::<Vec<_>>())
        }) as futures::future::BoxFuture<'static, crate::error::Result<Vec<ListDto>>>
    });

    let stream = StreamFacade::stream(hub, topics::LISTS, heartbeat, fetch).map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/v1/stream/engine/stats - Live engine stats, re-pushed on every task change
#[utoipa::path(
    get,
    path = "/api/v1/stream/engine/stats",
    tag = "streams",
    responses((status = 200, description = "SSE stream of engine stats"))
)]
pub async fn stream_engine_stats(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hub = state.hub.clone();
    let heartbeat = state.config.engine.heartbeat_interval;
    let fetch_state = state.clone();

    let fetch = Arc::new(move || {
        let state = fetch_state.clone();
        Box::pin(async move {
            let stats = state.engine.get_stats().await?;
            Ok(EngineStatsDto::from(stats))
        }) as futures::future::BoxFuture<'static, crate::error::Result<EngineStatsDto>>
    });

    let stream = StreamFacade::stream(hub, topics::TASKS_STATS, heartbeat, fetch).map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/v1/stream/progress - Live in-flight download progress snapshot
#[utoipa::path(
    get,
    path = "/api/v1/stream/progress",
    tag = "streams",
    responses((status = 200, description = "SSE stream of the progress snapshot"))
)]
pub async fn stream_progress(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hub = state.hub.clone();
    let heartbeat = state.config.engine.heartbeat_interval;
    let progress = state.engine.progress.clone();

    let fetch = Arc::new(move || {
        let progress = progress.clone();
        Box::pin(async move {
            let snapshot = progress.snapshot().await.into_iter().map(ProgressDto::from).collect::<Vec<_>>();
            Ok(snapshot)
        }) as futures::future::BoxFuture<'static, crate::error::Result<Vec<ProgressDto>>>
    });

    let stream = StreamFacade::stream(hub, topics::PROGRESS, heartbeat, fetch).map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/v1/stream/lists/{list_id}/tasks - Live task list scoped to one list
#[utoipa::path(
    get,
    path = "/api/v1/stream/lists/{list_id}/tasks",
    tag = "streams",
    params(("list_id" = i64, Path, description = "List ID")),
    responses((status = 200, description = "SSE stream of this list's tasks"))
)]
pub async fn stream_list_tasks(
    State(state): State<AppState>,
    Path(list_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hub = state.hub.clone();
    let heartbeat = state.config.engine.heartbeat_interval;
    let fetch_state = state.clone();

    let fetch = Arc::new(move || {
        let state = fetch_state.clone();
        Box::pin(async move {
            let tasks = state.engine.store.list_tasks(None, 200).await?;
            let filtered = tasks.into_iter().filter(|t| t.task_type == TaskType::Sync && t.entity_id == list_id);
            Ok(filtered.map(TaskDto::from).collect::<Vec<_>>())
        }) as futures::future::BoxFuture<'static, crate::error::Result<Vec<TaskDto>>>
    });

    let topic = topics::list_tasks(list_id);
    let stream = StreamFacade::stream(hub, topic, heartbeat, fetch).map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/v1/stream/lists/{list_id}/history - Live history feed scoped to one list
#[utoipa::path(
    get,
    path = "/api/v1/stream/lists/{list_id}/history",
    tag = "streams",
    params(("list_id" = i64, Path, description = "List ID")),
    responses((status = 200, description = "SSE stream of this list's history"))
)]
pub async fn stream_list_history(
    State(state): State<AppState>,
    Path(list_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hub = state.hub.clone();
    let heartbeat = state.config.engine.heartbeat_interval;
    let fetch_state = state.clone();

    let fetch = Arc::new(move || {
        let state = fetch_state.clone();
        Box::pin(async move {
            let entries = state.engine.store.query_history(Some(ListId(list_id)), 100, 0).await?;
            Ok(entries.into_iter().map(crate::api::dto::HistoryEntryDto::from).collect::<Vec<_>>())
        }) as futures::future::BoxFuture<'static, crate::error::Result<Vec<crate::api::dto::HistoryEntryDto>>>
    });

    let topic = topics::list_history(list_id);
    let stream = StreamFacade::stream(hub, topic, heartbeat, fetch).map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}
