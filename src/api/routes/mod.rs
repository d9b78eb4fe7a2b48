//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - TV, movie and music job submission and inspection
//! - [`media`] - Organised library listings
//! - [`sources`] - Tracked playlists and channel subscriptions
//! - [`config`] - Configuration
//! - [`system`] - Health, events, OpenAPI

use crate::types::JobId;
use serde::{Deserialize, Serialize};

mod config;
mod jobs;
mod media;
mod sources;
mod system;

pub use config::*;
pub use jobs::*;
pub use media::*;
pub use sources::*;
pub use system::*;

// ============================================================================
// Query/Request/Response Types (shared across handlers)
// ============================================================================

/// Response for job submissions
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct JobCreated {
    /// Id of the queued job
    #[schema(value_type = String)]
    pub job_id: JobId,
}

/// Response for DELETE /jobs/{id}
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct JobCancelled {
    /// Id of the cancelled job
    #[schema(value_type = String)]
    pub job_id: JobId,
    /// Always "cancelled"
    pub status: String,
}

/// Query parameters for GET /playlist_info
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams, utoipa::ToSchema)]
pub struct PlaylistInfoQuery {
    /// Playlist or channel URL
    pub url: String,
}

/// Request body for PUT /playlists/{id}
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SetEnabledRequest {
    /// Whether the source is polled
    pub enabled: bool,
}

/// Request body for POST /subscriptions
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubscribeRequest {
    /// Channel URL
    pub channel_url: String,
    /// Show folder for the channel's uploads
    pub show_name: String,
    /// `keep_all`, `keep_episodes` or `keep_days` (default: keep all)
    #[serde(default)]
    pub retention_type: Option<String>,
    /// Count of episodes or days to keep
    #[serde(default)]
    pub retention_value: Option<String>,
}

/// Request body for PUT /subscriptions/{id}; absent fields are left as is
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UpdateSubscriptionRequest {
    /// New show folder
    #[serde(default)]
    pub show_name: Option<String>,
    /// New retention mode
    #[serde(default)]
    pub retention_type: Option<String>,
    /// New retention value
    #[serde(default)]
    pub retention_value: Option<String>,
    /// Enable or disable polling
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// One job created by a manual source check
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CheckedSource {
    /// Source that had new items
    pub source_id: String,
    /// Job fetching them
    #[schema(value_type = String)]
    pub job_id: JobId,
}

/// Response for POST /playlists/check and POST /subscriptions/check
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CheckSourcesResponse {
    /// Jobs queued by this check
    pub jobs: Vec<CheckedSource>,
}

impl From<Vec<(String, JobId)>> for CheckSourcesResponse {
    fn from(jobs: Vec<(String, JobId)>) -> Self {
        Self {
            jobs: jobs
                .into_iter()
                .map(|(source_id, job_id)| CheckedSource { source_id, job_id })
                .collect(),
        }
    }
}
