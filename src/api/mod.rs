//! REST API server module
//!
//! An OpenAPI 3.1 described surface over [`Tubarr`]: job submission and
//! inspection, library listings, tracked sources and a live event stream.

use crate::{Result, Tubarr};
use axum::{
    Router,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Prefix under which [`start_api_server`] mounts the router
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router with all route definitions
///
/// Routes are relative; [`start_api_server`] mounts them under
/// [`API_PREFIX`].
///
/// # Routes
///
/// ## Jobs
/// - `POST /jobs` - Queue a TV playlist job
/// - `GET /jobs` - List jobs (without messages)
/// - `GET /jobs/:id` - Job state with recent messages
/// - `DELETE /jobs/:id` - Cancel a job
/// - `POST /movies` - Queue a movie job
/// - `POST /music` - Queue an album job
///
/// ## Library
/// - `GET /media` - Shows, seasons and episodes
/// - `GET /movies` - Movie folders
///
/// ## Tracked sources
/// - `GET /playlists` - Tracked playlists
/// - `PUT /playlists/:id` - Enable or disable a playlist
/// - `DELETE /playlists/:id` - Stop tracking a playlist
/// - `POST /playlists/check` - Poll playlists now
/// - `GET /playlist_info?url=` - Remote entries of a playlist or channel
/// - `GET /subscriptions` - Channel subscriptions
/// - `POST /subscriptions` - Subscribe to a channel
/// - `PUT /subscriptions/:id` - Change a subscription
/// - `DELETE /subscriptions/:id` - Unsubscribe
/// - `POST /subscriptions/check` - Poll subscriptions now
///
/// ## System
/// - `GET /config` - Configuration with secrets redacted
/// - `GET /health` - Health check
/// - `GET /events` - Server-sent events stream
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Swagger UI (if enabled)
pub fn create_router(tubarr: Tubarr) -> Router {
    let web = tubarr.config().web.clone();
    let state = AppState::new(tubarr);

    let router = Router::new()
        // Jobs
        .route("/jobs", post(routes::create_job).get(routes::list_jobs))
        .route(
            "/jobs/:id",
            get(routes::get_job).delete(routes::cancel_job),
        )
        .route(
            "/movies",
            post(routes::create_movie_job).get(routes::list_movies),
        )
        .route("/music", post(routes::create_music_job))
        // Library
        .route("/media", get(routes::list_media))
        // Tracked playlists
        .route("/playlists", get(routes::list_playlists))
        .route("/playlists/check", post(routes::check_playlists))
        .route(
            "/playlists/:id",
            put(routes::set_playlist_enabled).delete(routes::delete_playlist),
        )
        .route("/playlist_info", get(routes::playlist_info))
        // Channel subscriptions
        .route(
            "/subscriptions",
            get(routes::list_subscriptions).post(routes::create_subscription),
        )
        .route("/subscriptions/check", post(routes::check_subscriptions))
        .route(
            "/subscriptions/:id",
            put(routes::update_subscription).delete(routes::delete_subscription),
        )
        // System
        .route("/config", get(routes::get_config))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // SwaggerUi reads the OpenAPI document from the /openapi.json route above
    let router = if web.swagger_ui {
        router.merge(
            SwaggerUi::new("/swagger-ui")
                .url(format!("{API_PREFIX}/openapi.json"), ApiDoc::openapi()),
        )
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if web.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Serve the API on `web.host:web.port` until `shutdown` resolves.
///
/// ```no_run
/// use tubarr::{Config, Tubarr};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let app = Tubarr::new(Config::default()).await?;
/// tubarr::api::start_api_server(app, std::future::pending()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server<F>(tubarr: Tubarr, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let web = &tubarr.config().web;
    let bind_address = format!("{}:{}", web.host, web.port);
    tracing::info!(address = %bind_address, "Starting API server");

    let app = Router::new().nest(API_PREFIX, create_router(tubarr));

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(crate::error::Error::Io)?;
    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
