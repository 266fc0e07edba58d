use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::admin::AdminState;
use crate::dispatch::CacheStats;
use crate::hub::HubStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub projects: usize,
}

#[derive(Serialize)]
pub struct Invalidated {
    pub key: String,
    pub invalidated: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        projects: state.store.project_count(),
    })
}

pub async fn get_hub(State(state): State<AdminState>) -> Result<Json<HubStats>, StatusCode> {
    state
        .app
        .hub
        .stats()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheStats> {
    Json(state.app.dispatcher.cache_stats())
}

/// Accepts `proj-a` or `/proj-a`; the cache key always has the slash.
pub async fn invalidate_project(
    State(state): State<AdminState>,
    Path(prefix): Path<String>,
) -> Json<Invalidated> {
    let key = if prefix.starts_with('/') {
        prefix
    } else {
        format!("/{prefix}")
    };
    let invalidated = state.app.dispatcher.invalidate_project(&key);
    tracing::info!(prefix = %key, invalidated, "Project cache entry invalidated by admin");
    Json(Invalidated { key, invalidated })
}

pub async fn invalidate_rules(
    State(state): State<AdminState>,
    Path(project_id): Path<String>,
) -> Json<Invalidated> {
    let invalidated = state.app.dispatcher.invalidate_rules(&project_id);
    tracing::info!(project_id = %project_id, invalidated, "Rule cache entry invalidated by admin");
    Json(Invalidated {
        key: project_id,
        invalidated,
    })
}

pub async fn reload_store(State(state): State<AdminState>) -> Response {
    match state.store.reload() {
        Ok(change) => {
            let invalidated = state.app.dispatcher.apply_change(&change);
            Json(json!({
                "prefixes": change.prefixes,
                "project_ids": change.project_ids,
                "invalidated": invalidated,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Admin store reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "reload_failed", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}
