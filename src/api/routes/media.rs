//! Library listing handlers.

use crate::api::AppState;
use axum::{Json, extract::State, response::IntoResponse};

/// GET /media - Shows, seasons and episodes on disk
#[utoipa::path(
    get,
    path = "/api/v1/media",
    tag = "media",
    responses(
        (status = 200, description = "Organised TV library", body = Vec<crate::app::MediaShow>)
    )
)]
pub async fn list_media(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tubarr.list_media().await)
}

/// GET /movies - Movie folders on disk
#[utoipa::path(
    get,
    path = "/api/v1/movies",
    tag = "media",
    responses(
        (status = 200, description = "Organised movie library", body = Vec<crate::app::MovieEntry>)
    )
)]
pub async fn list_movies(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tubarr.list_movies().await)
}
