//! Tracked playlist and channel subscription handlers.

use super::{
    CheckSourcesResponse, PlaylistInfoQuery, SetEnabledRequest, SubscribeRequest,
    UpdateSubscriptionRequest,
};
use crate::api::AppState;
use crate::error::{Error, SourceError};
use crate::sources::{RemoteEntry, SourceKind, SourceView, SubscriptionUpdate};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

fn not_found(id: String) -> Error {
    SourceError::NotFound { id }.into()
}

/// GET /playlists - Tracked playlists
#[utoipa::path(
    get,
    path = "/api/v1/playlists",
    tag = "sources",
    responses(
        (status = 200, description = "Tracked playlists with progress", body = Vec<SourceView>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_playlists(
    State(state): State<AppState>,
) -> Result<Json<Vec<SourceView>>, Error> {
    Ok(Json(state.tubarr.list_sources(SourceKind::Playlist).await?))
}

/// PUT /playlists/{id} - Enable or disable polling of a playlist
#[utoipa::path(
    put,
    path = "/api/v1/playlists/{id}",
    tag = "sources",
    params(("id" = String, Path, description = "Playlist ID")),
    request_body = SetEnabledRequest,
    responses(
        (status = 204, description = "Playlist updated"),
        (status = 404, description = "Playlist not found")
    )
)]
pub async fn set_playlist_enabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetEnabledRequest>,
) -> Result<StatusCode, Error> {
    if state
        .tubarr
        .set_source_enabled(SourceKind::Playlist, &id, request.enabled)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// DELETE /playlists/{id} - Stop tracking a playlist
#[utoipa::path(
    delete,
    path = "/api/v1/playlists/{id}",
    tag = "sources",
    params(("id" = String, Path, description = "Playlist ID")),
    responses(
        (status = 204, description = "Playlist removed"),
        (status = 404, description = "Playlist not found")
    )
)]
pub async fn delete_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    if state.tubarr.remove_source(SourceKind::Playlist, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// POST /playlists/check - Poll every enabled playlist now
#[utoipa::path(
    post,
    path = "/api/v1/playlists/check",
    tag = "sources",
    responses(
        (status = 200, description = "Jobs queued for new entries", body = CheckSourcesResponse)
    )
)]
pub async fn check_playlists(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.tubarr.check_sources(SourceKind::Playlist).await;
    Json(CheckSourcesResponse::from(jobs))
}

/// GET /playlist_info - Entries of a remote playlist or channel
#[utoipa::path(
    get,
    path = "/api/v1/playlist_info",
    tag = "sources",
    params(PlaylistInfoQuery),
    responses(
        (status = 200, description = "Remote entries in playlist order", body = Vec<RemoteEntry>),
        (status = 400, description = "Missing URL"),
        (status = 502, description = "Listing failed")
    )
)]
pub async fn playlist_info(
    State(state): State<AppState>,
    Query(query): Query<PlaylistInfoQuery>,
) -> Result<Json<Vec<RemoteEntry>>, Error> {
    Ok(Json(state.tubarr.playlist_info(&query.url).await?))
}

/// GET /subscriptions - Channel subscriptions
#[utoipa::path(
    get,
    path = "/api/v1/subscriptions",
    tag = "sources",
    responses(
        (status = 200, description = "Subscriptions with progress", body = Vec<SourceView>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SourceView>>, Error> {
    Ok(Json(state.tubarr.list_sources(SourceKind::Channel).await?))
}

/// POST /subscriptions - Subscribe to a channel's future uploads
#[utoipa::path(
    post,
    path = "/api/v1/subscriptions",
    tag = "sources",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscription created", body = crate::sources::TrackedSource),
        (status = 400, description = "Missing fields or invalid retention"),
        (status = 409, description = "Already subscribed")
    )
)]
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, Error> {
    let source = state
        .tubarr
        .subscribe_channel(
            &request.channel_url,
            &request.show_name,
            request.retention_type.as_deref(),
            request.retention_value.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(source)))
}

/// PUT /subscriptions/{id} - Change a subscription
#[utoipa::path(
    put,
    path = "/api/v1/subscriptions/{id}",
    tag = "sources",
    params(("id" = String, Path, description = "Subscription ID")),
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 204, description = "Subscription updated"),
        (status = 400, description = "Invalid retention"),
        (status = 404, description = "Subscription not found")
    )
)]
pub async fn update_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateSubscriptionRequest>,
) -> Result<StatusCode, Error> {
    let update = SubscriptionUpdate {
        show_name: request.show_name,
        retention_type: request.retention_type,
        retention_value: request.retention_value,
        enabled: request.enabled,
    };
    if state.tubarr.update_subscription(&id, update).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// DELETE /subscriptions/{id} - Unsubscribe and delete the ledger
#[utoipa::path(
    delete,
    path = "/api/v1/subscriptions/{id}",
    tag = "sources",
    params(("id" = String, Path, description = "Subscription ID")),
    responses(
        (status = 204, description = "Subscription removed"),
        (status = 404, description = "Subscription not found")
    )
)]
pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, Error> {
    if state.tubarr.remove_source(SourceKind::Channel, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// POST /subscriptions/check - Poll every enabled subscription now
#[utoipa::path(
    post,
    path = "/api/v1/subscriptions/check",
    tag = "sources",
    responses(
        (status = 200, description = "Jobs queued for new uploads", body = CheckSourcesResponse)
    )
)]
pub async fn check_subscriptions(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.tubarr.check_sources(SourceKind::Channel).await;
    Json(CheckSourcesResponse::from(jobs))
}
