//! Core types for tubarr

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a job (UUID v4 text)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of media a job acquires
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Playlist or channel episodes organised as a show season
    #[default]
    Tv,
    /// A single video stored as a movie
    Movie,
    /// An album of audio tracks
    Music,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MediaKind::Tv => "tv",
            MediaKind::Movie => "movie",
            MediaKind::Music => "music",
        })
    }
}

/// Job stage.
///
/// Non-terminal stages are ordered; a job only moves forward through them,
/// or jumps to `Failed` / `Cancelled`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for a free worker slot
    #[default]
    Queued,
    /// Admitted, checking prerequisites
    InProgress,
    /// Downloader running
    Downloading,
    /// Download finished
    Downloaded,
    /// Renaming and writing episode descriptions
    ProcessingMetadata,
    /// Transcoding
    Converting,
    /// Posters and thumbnails
    GeneratingArtwork,
    /// Collection-level description files
    CreatingNfo,
    /// Copying into the media library
    CopyingToLibrary,
    /// Finished successfully
    Completed,
    /// Stopped by an unrecoverable error
    Failed,
    /// Stopped on request
    Cancelled,
}

impl Stage {
    /// Position in the pipeline order, `None` for failure/cancel
    pub fn rank(self) -> Option<u8> {
        match self {
            Stage::Queued => Some(0),
            Stage::InProgress => Some(1),
            Stage::Downloading => Some(2),
            Stage::Downloaded => Some(3),
            Stage::ProcessingMetadata => Some(4),
            Stage::Converting => Some(5),
            Stage::GeneratingArtwork => Some(6),
            Stage::CreatingNfo => Some(7),
            Stage::CopyingToLibrary => Some(8),
            Stage::Completed => Some(9),
            Stage::Failed | Stage::Cancelled => None,
        }
    }

    /// Completed, failed or cancelled
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed | Stage::Cancelled)
    }

    /// Whether a job in `self` may move to `next`.
    ///
    /// Forward moves may skip stages (a movie job has no collection NFO step);
    /// staying in the same stage is allowed for progress updates.
    pub fn can_transition_to(self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to >= from,
            (None, Some(_)) => false,
        }
    }

    /// Human-readable label used to prefix stage messages
    pub fn description(self) -> &'static str {
        match self {
            Stage::Queued => "Waiting to start",
            Stage::InProgress => "Preparing job",
            Stage::Downloading => "Downloading videos",
            Stage::Downloaded => "Download finished",
            Stage::ProcessingMetadata => "Processing metadata",
            Stage::Converting => "Converting videos to H.265",
            Stage::GeneratingArtwork => "Generating artwork and thumbnails",
            Stage::CreatingNfo => "Creating NFO files",
            Stage::CopyingToLibrary => "Copying to library",
            Stage::Completed => "Processing completed",
            Stage::Failed => "Processing failed",
            Stage::Cancelled => "Cancelled",
        }
    }

    /// Wire name (matches the serde representation)
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Queued => "queued",
            Stage::InProgress => "in_progress",
            Stage::Downloading => "downloading",
            Stage::Downloaded => "downloaded",
            Stage::ProcessingMetadata => "processing_metadata",
            Stage::Converting => "converting",
            Stage::GeneratingArtwork => "generating_artwork",
            Stage::CreatingNfo => "creating_nfo",
            Stage::CopyingToLibrary => "copying_to_library",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
            Stage::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped entry of a job's message log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobMessage {
    /// Local time, `%Y-%m-%d %H:%M:%S`
    pub time: String,
    /// Message text
    pub text: String,
}

/// Tag and numbering data for one music track
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackMetadata {
    /// Track title
    pub title: String,
    /// Track artist
    #[serde(default)]
    pub artist: String,
    /// Album title
    #[serde(default)]
    pub album: String,
    /// Position on the disc (1-based)
    pub track_number: u32,
    /// Tracks on the disc
    #[serde(default)]
    pub total_tracks: Option<u32>,
    /// Disc number (1-based)
    #[serde(default)]
    pub disc_number: Option<u32>,
    /// Discs in the release
    #[serde(default)]
    pub total_discs: Option<u32>,
    /// Release date, any textual form accepted by ID3 TDRC
    #[serde(default)]
    pub release_date: Option<String>,
    /// Genre names
    #[serde(default)]
    pub genres: Vec<String>,
    /// Cover image URL embedded as front cover
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Album artist, defaults to the track artist
    #[serde(default)]
    pub album_artist: Option<String>,
}

impl TrackMetadata {
    /// A track needs a title and a positive number to be usable
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && self.track_number >= 1
    }
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted and waiting for a slot
    JobQueued {
        /// Job ID
        id: JobId,
        /// Media kind
        kind: MediaKind,
    },

    /// Job admitted to a worker slot
    JobStarted {
        /// Job ID
        id: JobId,
    },

    /// Job moved to another stage
    StageChanged {
        /// Job ID
        id: JobId,
        /// New stage
        stage: Stage,
        /// Overall progress (0-100)
        progress: u8,
    },

    /// Job finished successfully
    JobCompleted {
        /// Job ID
        id: JobId,
    },

    /// Job failed
    JobFailed {
        /// Job ID
        id: JobId,
        /// Final message explaining the failure
        error: String,
    },

    /// Job cancelled
    JobCancelled {
        /// Job ID
        id: JobId,
    },

    /// A tracked source was polled
    SourcePolled {
        /// Source ID
        source_id: String,
        /// Job created for new items, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
    },

    /// Shutdown initiated
    Shutdown,
}
