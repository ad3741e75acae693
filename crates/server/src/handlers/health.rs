//! Liveness endpoint.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub repositories: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.metadata.health_check().await?;
    for repo in state.registry.iter() {
        repo.storage().health_check().await.map_err(|e| {
            ApiError::Internal(format!("repository {} unavailable: {e}", repo.name()))
        })?;
    }

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        repositories: state.registry.len(),
    }))
}
