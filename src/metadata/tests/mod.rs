use super::*;
use crate::config::{MetadataConfig, RetryConfig};
use std::time::Duration;
use wiremock::MockServer;

mod tmdb;
mod tvdb;

fn config_for(server: &MockServer) -> MetadataConfig {
    MetadataConfig {
        tmdb_api_key: Some("tmdb-key".into()),
        tvdb_api_key: Some("tvdb-key".into()),
        tvdb_pin: Some("1234".into()),
        tmdb_base_url: server.uri(),
        tvdb_base_url: server.uri(),
        request_timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

fn item(title: &str, upload_date: Option<&str>) -> VideoInfo {
    VideoInfo {
        id: "vid".into(),
        title: title.into(),
        description: Some("Summary line\nmore".into()),
        upload_date: upload_date.map(str::to_string),
        playlist_index: Some(1),
        base: PathBuf::from(format!("/media/Show/Season 01/{title} S01E01")),
    }
}
