//! Configuration handlers.

use crate::api::AppState;
use axum::{Json, extract::State, response::IntoResponse};

/// GET /config - Current config with API keys redacted
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration", body = crate::config::Config)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tubarr.config().redacted())
}
