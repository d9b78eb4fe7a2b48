//! Job submission and queries.

use super::Tubarr;
use crate::error::{Error, Result};
use crate::job::{Job, JobTarget, JobUpdate, JobView};
use crate::pipeline::Numbering;
use crate::sources::{JobSubmitter, RemoteEntry, TrackedJobRequest};
use crate::types::{JobId, TrackMetadata};
use crate::utils::is_playlist_url;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_true() -> bool {
    true
}

/// Request to download a playlist as one show season
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TvJobRequest {
    /// Playlist, channel or video URL
    pub playlist_url: String,
    /// Show name
    pub show_name: String,
    /// Season number text, e.g. "01"
    pub season_num: String,
    /// First episode number, or "auto" for air-date resolution
    pub episode_start: String,
    /// 1-based position in the playlist to start from
    #[serde(default)]
    pub playlist_start: Option<u32>,
    /// Register the playlist for incremental polling (default: true)
    #[serde(default = "default_true")]
    pub track_playlist: bool,
}

/// Request to download one video as a movie
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MovieJobRequest {
    /// Video URL
    pub video_url: String,
    /// Movie name
    pub movie_name: String,
}

/// Request to download an album
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MusicJobRequest {
    /// Album playlist URL
    pub playlist_url: String,
    /// Album name
    pub album_name: String,
    /// Artist name
    pub artist_name: String,
    /// Tag data, in playlist order
    #[serde(default)]
    pub tracks: Vec<TrackMetadata>,
    /// 1-based position in the playlist to start from
    #[serde(default)]
    pub playlist_start: Option<u32>,
}

fn required(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{what} is required")));
    }
    Ok(())
}

fn validate_url(value: &str) -> Result<()> {
    required(value, "URL")?;
    let parsed = url::Url::parse(value.trim())
        .map_err(|e| Error::Validation(format!("Invalid URL '{value}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Validation(format!(
            "Unsupported URL scheme '{}'",
            parsed.scheme()
        )));
    }
    Ok(())
}

/// Labels for the upcoming-work list of a TV job.
///
/// Entries before `playlist_start` are skipped. With a numeric episode start
/// every label carries the episode tag it will be renamed to.
pub(crate) fn remaining_labels(
    entries: &[RemoteEntry],
    season_num: &str,
    episode_start: &str,
    playlist_start: Option<u32>,
) -> Vec<String> {
    let start = playlist_start.unwrap_or(1).max(1);
    let first_episode = match Numbering::parse(episode_start) {
        Some(Numbering::StartAt(n)) => Some(n),
        _ => None,
    };
    entries
        .iter()
        .filter(|entry| entry.index >= start)
        .enumerate()
        .map(|(i, entry)| match first_episode {
            Some(first) => {
                let episode = first.saturating_add(u32::try_from(i).unwrap_or(u32::MAX));
                format!("{} S{season_num}E{episode:02}", entry.title)
            }
            None => entry.title.clone(),
        })
        .collect()
}

impl Tubarr {
    /// Submit a TV job.
    ///
    /// The upcoming-work list is filled from the remote listing (failures
    /// are logged and ignored). Playlist URLs are registered as tracked
    /// sources unless `track_playlist` is false.
    pub async fn create_job(&self, request: TvJobRequest) -> Result<JobId> {
        validate_url(&request.playlist_url)?;
        required(&request.show_name, "Show name")?;
        required(&request.season_num, "Season number")?;
        required(&request.episode_start, "Episode start")?;
        let url = request.playlist_url.trim();

        let remaining = match self.lister.list(url).await {
            Ok(entries) => remaining_labels(
                &entries,
                &request.season_num,
                &request.episode_start,
                request.playlist_start,
            ),
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to list playlist for job preview");
                Vec::new()
            }
        };

        let mut job = Job::new(
            url,
            JobTarget::Tv {
                show_name: request.show_name.clone(),
                season_num: request.season_num.clone(),
                episode_start: request.episode_start.clone(),
                playlist_start: request.playlist_start,
            },
        )
        .with_remaining(remaining);

        if request.track_playlist && is_playlist_url(url) {
            let (source, created) = self
                .tracker
                .register_playlist(
                    url,
                    &request.show_name,
                    &request.season_num,
                    request.playlist_start,
                )
                .await?;
            if created {
                job.apply(JobUpdate::new().message(format!(
                    "Playlist registered for tracking as {}",
                    source.id
                )));
            }
            job = job.with_source(source.id);
        }

        self.scheduler.submit(job)
    }

    /// Submit a movie job
    pub async fn create_movie_job(&self, request: MovieJobRequest) -> Result<JobId> {
        validate_url(&request.video_url)?;
        required(&request.movie_name, "Movie name")?;

        let job = Job::new(
            request.video_url.trim(),
            JobTarget::Movie {
                movie_name: request.movie_name,
            },
        );
        self.scheduler.submit(job)
    }

    /// Submit a music job. Track entries without a title or a positive
    /// track number are dropped with a warning.
    pub async fn create_music_job(&self, request: MusicJobRequest) -> Result<JobId> {
        validate_url(&request.playlist_url)?;
        required(&request.album_name, "Album name")?;
        required(&request.artist_name, "Artist name")?;

        let (tracks, dropped): (Vec<_>, Vec<_>) = request
            .tracks
            .into_iter()
            .partition(TrackMetadata::is_valid);
        if !dropped.is_empty() {
            tracing::warn!(
                dropped = dropped.len(),
                album = %request.album_name,
                "ignoring invalid track entries"
            );
        }
        let titles: Vec<String> = tracks.iter().map(|t| t.title.clone()).collect();

        let mut job = Job::new(
            request.playlist_url.trim(),
            JobTarget::Music {
                album_name: request.album_name,
                artist_name: request.artist_name,
                tracks,
                playlist_start: request.playlist_start,
            },
        )
        .with_remaining(titles);
        job.apply(
            JobUpdate::new()
                .detailed("Music job queued")
                .message("Music job created and queued for processing"),
        );
        self.scheduler.submit(job)
    }

    /// Full view of a job, including its newest messages
    pub fn get_job(&self, id: &JobId) -> Option<JobView> {
        self.scheduler.get(id, self.config.jobs.message_limit)
    }

    /// Every job, newest first, without messages
    pub fn list_jobs(&self) -> Vec<JobView> {
        self.scheduler.list()
    }

    /// Cancel a job. Returns `false` for unknown or finished jobs.
    pub fn cancel_job(&self, id: &JobId) -> bool {
        self.scheduler.cancel(id)
    }
}

#[async_trait]
impl JobSubmitter for Tubarr {
    async fn submit_tracked(&self, request: TrackedJobRequest) -> Result<JobId> {
        let job = Job::new(
            request.url,
            JobTarget::Tv {
                show_name: request.show_name,
                season_num: request.season_num,
                episode_start: request.episode_start,
                playlist_start: request.playlist_start,
            },
        )
        .with_source(request.source_id);
        self.scheduler.submit(job)
    }

    fn has_live_job(&self, source_id: &str) -> bool {
        self.scheduler.has_live_job_for_source(source_id)
    }
}
