//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time by utoipa from the
//! handler annotations in [`crate::api::routes`].

use utoipa::OpenApi;

/// OpenAPI documentation for the tubarr REST API
///
/// Served as JSON at `/api/v1/openapi.json` and through Swagger UI at
/// `/api/v1/swagger-ui` when enabled.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tubarr REST API",
        version = "0.1.0",
        description = "Queue TV, movie and music acquisition jobs, follow their progress and manage tracked playlists and channel subscriptions",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000/api/v1", description = "Local server")
    ),
    paths(
        // Jobs
        crate::api::routes::create_job,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::cancel_job,
        crate::api::routes::create_movie_job,
        crate::api::routes::create_music_job,

        // Library
        crate::api::routes::list_media,
        crate::api::routes::list_movies,

        // Tracked sources
        crate::api::routes::list_playlists,
        crate::api::routes::set_playlist_enabled,
        crate::api::routes::delete_playlist,
        crate::api::routes::check_playlists,
        crate::api::routes::playlist_info,
        crate::api::routes::list_subscriptions,
        crate::api::routes::create_subscription,
        crate::api::routes::update_subscription,
        crate::api::routes::delete_subscription,
        crate::api::routes::check_subscriptions,

        // Configuration
        crate::api::routes::get_config,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::MediaKind,
        crate::types::Stage,
        crate::types::JobMessage,
        crate::types::TrackMetadata,
        crate::types::Event,
        crate::job::JobView,
        crate::job::ProcessInfo,
        crate::app::TvJobRequest,
        crate::app::MovieJobRequest,
        crate::app::MusicJobRequest,
        crate::app::MediaShow,
        crate::app::MediaSeason,
        crate::app::MediaEpisode,
        crate::app::MovieEntry,
        crate::sources::SourceKind,
        crate::sources::TrackedSource,
        crate::sources::SourceView,
        crate::sources::RemoteEntry,
        crate::retention::RetentionPolicy,

        crate::config::Config,
        crate::config::MediaConfig,
        crate::config::DownloaderConfig,
        crate::config::ToolsConfig,
        crate::config::JobsConfig,
        crate::config::WebConfig,
        crate::config::UpdateCheckerConfig,
        crate::config::JellyfinConfig,
        crate::config::RetryConfig,
        crate::config::MetadataConfig,
        crate::config::PersistenceConfig,

        crate::api::routes::JobCreated,
        crate::api::routes::JobCancelled,
        crate::api::routes::SetEnabledRequest,
        crate::api::routes::SubscribeRequest,
        crate::api::routes::UpdateSubscriptionRequest,
        crate::api::routes::CheckedSource,
        crate::api::routes::CheckSourcesResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Queue TV, movie and music jobs and follow their progress"),
        (name = "media", description = "Browse the organised library on disk"),
        (name = "sources", description = "Tracked playlists and channel subscriptions"),
        (name = "config", description = "Effective configuration with secrets redacted"),
        (name = "system", description = "Health, OpenAPI spec and the event stream"),
    )
)]
pub struct ApiDoc;
