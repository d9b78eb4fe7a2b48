//! The job record and its update rules

use crate::types::{JobId, JobMessage, MediaKind, Stage, TrackMetadata};
use crate::utils::timestamp_now;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use utoipa::ToSchema;

/// What a job acquires and where it goes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "media_type", rename_all = "lowercase")]
pub enum JobTarget {
    /// Playlist or channel episodes as one show season
    Tv {
        /// Show name (sanitised into the folder name)
        show_name: String,
        /// Season number text, e.g. "01"
        season_num: String,
        /// First local episode number, or "auto" for air-date resolution
        episode_start: String,
        /// 1-based position in the remote list to start from
        playlist_start: Option<u32>,
    },
    /// A single video stored as a movie
    Movie {
        /// Movie name (folder name before metadata lookup)
        movie_name: String,
    },
    /// An album of tracks
    Music {
        /// Album name
        album_name: String,
        /// Artist name
        artist_name: String,
        /// Tag data, one entry per expected track
        tracks: Vec<TrackMetadata>,
        /// 1-based position in the remote list to start from
        playlist_start: Option<u32>,
    },
}

impl JobTarget {
    /// Media kind of this target
    pub fn kind(&self) -> MediaKind {
        match self {
            JobTarget::Tv { .. } => MediaKind::Tv,
            JobTarget::Movie { .. } => MediaKind::Movie,
            JobTarget::Music { .. } => MediaKind::Music,
        }
    }
}

/// The process a job currently owns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProcessInfo {
    /// OS process id (also the process group id)
    pub pid: Option<u32>,
    /// Tool name
    pub tool: String,
}

/// One unit of acquisition work.
#[derive(Clone, Debug)]
pub struct Job {
    /// Unique id
    pub id: JobId,
    /// Remote URL (playlist, channel or video)
    pub url: String,
    /// What is acquired and where it goes
    pub target: JobTarget,
    /// Tracked source this job fetches for, if any
    pub source_id: Option<String>,
    /// Current stage
    pub stage: Stage,
    /// Overall progress, 0-100
    pub progress: u8,
    /// Progress of the current stage, 0-100
    pub stage_progress: u8,
    /// One-line status for display
    pub detailed_status: String,
    /// File currently worked on
    pub current_file: Option<String>,
    /// Items expected in the current stage
    pub total_files: u32,
    /// Items processed in the current stage
    pub processed_files: u32,
    /// Upcoming work, front first
    pub remaining_files: VecDeque<String>,
    /// Message log, oldest first
    pub messages: Vec<JobMessage>,
    /// Live external process, if any
    pub process: Option<ProcessInfo>,
    /// Creation time
    pub created_at: DateTime<Local>,
    /// Last mutation time
    pub updated_at: DateTime<Local>,
}

impl Job {
    /// New job in `queued`
    pub fn new(url: impl Into<String>, target: JobTarget) -> Self {
        let now = Local::now();
        Self {
            id: JobId::new(),
            url: url.into(),
            target,
            source_id: None,
            stage: Stage::Queued,
            progress: 0,
            stage_progress: 0,
            detailed_status: "Job queued".to_string(),
            current_file: None,
            total_files: 0,
            processed_files: 0,
            remaining_files: VecDeque::new(),
            messages: Vec::new(),
            process: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the job to a tracked source
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Seed the upcoming-work list
    pub fn with_remaining(mut self, remaining: impl IntoIterator<Item = String>) -> Self {
        self.remaining_files = remaining.into_iter().collect();
        self
    }

    /// Media kind
    pub fn kind(&self) -> MediaKind {
        self.target.kind()
    }

    /// Apply an update. Returns `true` when the stage changed.
    ///
    /// Updates to a terminal job are dropped. A stage change that would move
    /// backwards is refused; the rest of the update still applies. Progress
    /// never decreases while the stage stays the same.
    pub fn apply(&mut self, update: JobUpdate) -> bool {
        if self.stage.is_terminal() {
            return false;
        }

        let mut stage_changed = false;
        if let Some(next) = update.stage {
            if next != self.stage && self.stage.can_transition_to(next) {
                self.stage = next;
                stage_changed = true;
            } else if next != self.stage {
                tracing::warn!(
                    job_id = %self.id,
                    from = %self.stage,
                    to = %next,
                    "refusing out-of-order stage transition"
                );
            }
        }

        if let Some(progress) = update.progress {
            let progress = clamp_percent(progress);
            if stage_changed || progress >= self.progress {
                self.progress = progress;
            }
        }
        if let Some(stage_progress) = update.stage_progress {
            let stage_progress = clamp_percent(stage_progress);
            if stage_changed || stage_progress >= self.stage_progress {
                self.stage_progress = stage_progress;
            }
        }
        if let Some(file) = update.current_file {
            self.current_file = Some(file);
        }
        if let Some(total) = update.total_files {
            self.total_files = total;
        }
        if let Some(processed) = update.processed_files {
            self.processed_files = processed;
        }
        if update.pop_remaining {
            self.remaining_files.pop_front();
        }
        if let Some(message) = update.message {
            let text = match (&update.stage, &update.detailed_status) {
                (Some(stage), None) => format!("[{}] {}", stage.description(), message),
                _ => message,
            };
            self.messages.push(JobMessage {
                time: timestamp_now(),
                text,
            });
        }
        if let Some(detailed) = update.detailed_status {
            self.detailed_status = detailed;
        }

        self.updated_at = Local::now();
        stage_changed
    }

    /// Last message text, if any
    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(|m| m.text.as_str())
    }

    /// View with the newest `message_limit` messages
    pub fn view(&self, message_limit: Option<usize>) -> JobView {
        let messages = message_limit.map(|limit| {
            let skip = self.messages.len().saturating_sub(limit);
            self.messages[skip..].to_vec()
        });

        let (show_name, season_num, episode_start, playlist_start) = match &self.target {
            JobTarget::Tv {
                show_name,
                season_num,
                episode_start,
                playlist_start,
            } => (
                Some(show_name.clone()),
                Some(season_num.clone()),
                Some(episode_start.clone()),
                *playlist_start,
            ),
            JobTarget::Music { playlist_start, .. } => (None, None, None, *playlist_start),
            JobTarget::Movie { .. } => (None, None, None, None),
        };
        let movie_name = match &self.target {
            JobTarget::Movie { movie_name } => Some(movie_name.clone()),
            _ => None,
        };
        let (album_name, artist_name) = match &self.target {
            JobTarget::Music {
                album_name,
                artist_name,
                ..
            } => (Some(album_name.clone()), Some(artist_name.clone())),
            _ => (None, None),
        };

        JobView {
            job_id: self.id.clone(),
            media_type: self.kind(),
            playlist_url: self.url.clone(),
            show_name,
            season_num,
            episode_start,
            playlist_start,
            movie_name,
            album_name,
            artist_name,
            source_id: self.source_id.clone(),
            status: self.stage,
            progress: self.progress,
            stage_progress: self.stage_progress,
            detailed_status: self.detailed_status.clone(),
            current_file: self.current_file.clone(),
            total_files: self.total_files,
            processed_files: self.processed_files,
            remaining_files: self.remaining_files.iter().cloned().collect(),
            process: self.process.clone(),
            created_at: self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            updated_at: self.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            messages,
        }
    }
}

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0) as u8
}

/// A batch of field changes applied atomically to a job.
#[derive(Clone, Debug, Default)]
pub struct JobUpdate {
    stage: Option<Stage>,
    progress: Option<f64>,
    stage_progress: Option<f64>,
    detailed_status: Option<String>,
    message: Option<String>,
    current_file: Option<String>,
    total_files: Option<u32>,
    processed_files: Option<u32>,
    pop_remaining: bool,
}

impl JobUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `stage`
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Set overall progress
    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set stage progress
    pub fn stage_progress(mut self, progress: f64) -> Self {
        self.stage_progress = Some(progress);
        self
    }

    /// Set the one-line status
    pub fn detailed(mut self, status: impl Into<String>) -> Self {
        self.detailed_status = Some(status.into());
        self
    }

    /// Append a log message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the current file
    pub fn file(mut self, name: impl Into<String>) -> Self {
        self.current_file = Some(name.into());
        self
    }

    /// Set the item total
    pub fn total_files(mut self, total: u32) -> Self {
        self.total_files = Some(total);
        self
    }

    /// Set the processed-item count
    pub fn processed_files(mut self, processed: u32) -> Self {
        self.processed_files = Some(processed);
        self
    }

    /// Consume one entry of the upcoming-work list
    pub fn pop_remaining(mut self) -> Self {
        self.pop_remaining = true;
        self
    }

    /// Stage this update moves to, if any
    pub fn target_stage(&self) -> Option<Stage> {
        self.stage
    }
}

/// Serialisable view of a job
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobView {
    /// Job id
    pub job_id: JobId,
    /// Media kind
    pub media_type: MediaKind,
    /// Source URL
    pub playlist_url: String,
    /// Show name (tv)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_name: Option<String>,
    /// Season (tv)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_num: Option<String>,
    /// Episode start (tv)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_start: Option<String>,
    /// Remote start position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_start: Option<u32>,
    /// Movie name (movie)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_name: Option<String>,
    /// Album (music)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,
    /// Artist (music)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    /// Tracked source id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Current stage
    pub status: Stage,
    /// Overall progress
    pub progress: u8,
    /// Stage progress
    pub stage_progress: u8,
    /// One-line status
    pub detailed_status: String,
    /// Current file
    pub current_file: Option<String>,
    /// Items in the current stage
    pub total_files: u32,
    /// Items processed in the current stage
    pub processed_files: u32,
    /// Upcoming work
    pub remaining_files: Vec<String>,
    /// Live process
    pub process: Option<ProcessInfo>,
    /// Creation time
    pub created_at: String,
    /// Last update time
    pub updated_at: String,
    /// Message log (single-job view only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<JobMessage>>,
}
