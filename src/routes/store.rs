use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use serde_json::Value;
use tracing::info;

use crate::{
    error::AppError,
    services::sse_service,
    state::SharedState,
    store::{SharedStore, StorePath},
};

#[utoipa::path(
    get,
    path = "/store/{path}",
    tag = "store",
    params(("path" = String, Path, description = "Slash separated store path, e.g. `level1/status`")),
    responses(
        (status = 200, description = "Current value (`null` when absent)", body = Object),
        (status = 400, description = "Malformed path")
    )
)]
/// Read the current value of a store subtree.
pub async fn read_value(
    State(state): State<SharedState>,
    Path(path): Path<String>,
) -> Result<Json<Value>, AppError> {
    let path = StorePath::parse(&path)?;
    let value = state.store().read(path).await?;
    Ok(Json(value))
}

#[utoipa::path(
    get,
    path = "/sse/store/{path}",
    tag = "sse",
    params(("path" = String, Path, description = "Slash separated store path to watch")),
    responses((status = 200, description = "`value` events for the subtree", content_type = "text/event-stream", body = String))
)]
/// Stream the subtree's current value, then every change to it.
pub async fn watch_value(
    State(state): State<SharedState>,
    Path(path): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe(&state, &path).await?;
    info!(path = %subscription.path(), "New store SSE connection");
    Ok(sse_service::to_sse_stream(subscription))
}

/// Configure the raw store routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/store/{*path}", get(read_value))
        .route("/sse/store/{*path}", get(watch_value))
}
