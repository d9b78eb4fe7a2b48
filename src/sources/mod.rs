//! Incremental tracking of playlists and channels
//!
//! A tracked source remembers which remote items were already fetched (an
//! append-only [`Ledger`]), where the last fetch left off (the resume
//! cursor) and how much output to keep ([`RetentionPolicy`]). The
//! [`SourceTracker`] diffs the remote list against the ledger and submits one
//! job per source when new items exist; the [`SourcePoller`] does that on a
//! timer.

mod ledger;
mod poller;
mod remote;
mod tracker;

pub use ledger::Ledger;
pub use poller::SourcePoller;
pub use remote::{RemoteEntry, RemoteLister, YtDlpLister, parse_flat_playlist};
pub use tracker::{JobSubmitter, SourceTracker, SubscriptionUpdate, TrackedJobRequest};

use crate::retention::RetentionPolicy;
use crate::utils::compile_regex;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use utoipa::ToSchema;

static RE_LIST_PARAM: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"list=([^&]+)"));
static RE_NON_WORD: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\W+"));
static RE_CHANNEL_UC: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"(UC[\w-]{5,})"));
static RE_CHANNEL_PATH: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"channel/([^/?]+)"));
static RE_HANDLE: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"@([\w.-]+)"));

/// What kind of remote list a source is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A playlist registered when a TV job was submitted for it
    Playlist,
    /// A channel subscription (season `00`)
    Channel,
}

impl SourceKind {
    /// Storage name
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Playlist => "playlist",
            SourceKind::Channel => "channel",
        }
    }

    /// Parse the storage name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "playlist" => Some(SourceKind::Playlist),
            "channel" => Some(SourceKind::Channel),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered playlist or channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackedSource {
    /// Stable id derived from the URL
    pub id: String,
    /// Playlist or channel
    pub kind: SourceKind,
    /// Remote URL
    pub url: String,
    /// Show the items are filed under
    pub show_name: String,
    /// Season the items are filed under
    pub season_num: String,
    /// Ledger of fetched item ids
    #[schema(value_type = String)]
    pub ledger_path: PathBuf,
    /// Whether polling considers this source
    pub enabled: bool,
    /// 1-based remote position the next fetch starts from
    pub resume_cursor: u32,
    /// Output pruning rule
    pub retention: RetentionPolicy,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Last change of the record
    pub updated_at: DateTime<Utc>,
    /// Last poll of the remote list
    pub last_checked: Option<DateTime<Utc>>,
    /// Error of the last poll, if it failed
    pub last_error: Option<String>,
}

/// A tracked source with derived progress figures, as listed by the API
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SourceView {
    /// The stored record
    #[serde(flatten)]
    pub source: TrackedSource,
    /// Highest episode number known for the source's season
    pub last_episode: u32,
    /// Number of ids in the ledger
    pub downloaded_videos: usize,
}

/// Id of a playlist URL: the `list=` parameter, else the URL without
/// non-word characters.
pub fn playlist_id(url: &str) -> String {
    RE_LIST_PARAM
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| RE_NON_WORD.replace_all(url, "").into_owned())
}

/// Id of a channel URL: a `UC...` id, a `channel/<id>` segment, an
/// `@handle`, else the URL without non-word characters.
pub fn channel_id(url: &str) -> String {
    [&*RE_CHANNEL_UC, &*RE_CHANNEL_PATH, &*RE_HANDLE]
        .iter()
        .find_map(|re| re.captures(url).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| RE_NON_WORD.replace_all(url, "").into_owned())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
