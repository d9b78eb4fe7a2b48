//! Per-item metadata: downloader sidecars, episode resolution and lookups
//!
//! The downloader writes one `<name>.info.json` sidecar per item. The
//! metadata stage reads them as [`VideoInfo`], maps each to an episode
//! number (by offset or through an [`EpisodeResolver`]) and writes NFO files
//! rendered by [`nfo`].

pub mod nfo;
mod tmdb;
mod tvdb;

pub use tmdb::{MovieDetails, TmdbClient, TmdbMovie, clean_title, similarity};
pub use tvdb::{TvdbClient, TvdbEpisode};

use crate::error::{MetadataError, Result};
use crate::utils::compile_regex;
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Suffix of downloader sidecar files
pub const SIDECAR_SUFFIX: &str = ".info.json";

static RE_TITLE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"(\d{1,2})(?:st|nd|rd|th)?[\s_]+([A-Za-z]+)[\s_]+(\d{4})")
});

/// Fields of a downloader sidecar that the pipeline consumes
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct VideoInfo {
    /// Remote item id
    #[serde(default)]
    pub id: String,
    /// Item title
    #[serde(default = "unknown_title")]
    pub title: String,
    /// Full description
    #[serde(default)]
    pub description: Option<String>,
    /// Upload date as `YYYYMMDD`
    #[serde(default)]
    pub upload_date: Option<String>,
    /// Position in the remote list
    #[serde(default)]
    pub playlist_index: Option<u32>,
    /// Sidecar path without the `.info.json` suffix
    #[serde(skip)]
    pub base: PathBuf,
}

fn unknown_title() -> String {
    "Unknown Title".to_string()
}

impl VideoInfo {
    /// Read and parse a sidecar file
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MetadataError::Sidecar {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let mut info: VideoInfo =
            serde_json::from_str(&text).map_err(|e| MetadataError::Sidecar {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        info.base = sidecar_base(path);
        Ok(info)
    }

    /// First line of the description, empty when absent
    pub fn summary(&self) -> &str {
        self.description
            .as_deref()
            .and_then(|d| d.lines().next())
            .unwrap_or("")
    }

    /// Upload date as `YYYY-MM-DD`
    pub fn air_date(&self) -> Option<String> {
        normalize_upload_date(self.upload_date.as_deref()?)
    }

    /// Year of the upload date
    pub fn year(&self) -> Option<&str> {
        self.upload_date
            .as_deref()
            .filter(|d| d.len() >= 4)
            .map(|d| &d[..4])
    }
}

/// Strip `.info.json` from a sidecar path
pub fn sidecar_base(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_suffix(SIDECAR_SUFFIX) {
        Some(base) => PathBuf::from(base),
        None => path.to_path_buf(),
    }
}

/// Sidecar files in `folder`, sorted by name
pub fn find_sidecars(folder: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.to_string_lossy().ends_with(SIDECAR_SUFFIX))
        .collect();
    files.sort();
    files
}

/// A resolved season/episode for one downloaded item
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeMatch {
    /// Season number
    pub season: u32,
    /// Episode number
    pub episode: u32,
    /// Air date as `YYYY-MM-DD`
    pub air_date: Option<String>,
    /// Sidecar base path of the item
    pub base: PathBuf,
    /// Item title
    pub title: String,
    /// First line of the description
    pub description: String,
}

/// Maps downloaded items to episode numbers.
#[async_trait]
pub trait EpisodeResolver: Send + Sync {
    /// Resolve every item or fail; partial results are never returned
    async fn resolve(&self, show_name: &str, items: &[VideoInfo]) -> Result<Vec<EpisodeMatch>>;
}

/// Resolves items by their air date against TVDB
pub struct AirdateResolver {
    tvdb: Arc<TvdbClient>,
}

impl AirdateResolver {
    /// Resolver backed by `tvdb`
    pub fn new(tvdb: Arc<TvdbClient>) -> Self {
        Self { tvdb }
    }
}

#[async_trait]
impl EpisodeResolver for AirdateResolver {
    async fn resolve(&self, show_name: &str, items: &[VideoInfo]) -> Result<Vec<EpisodeMatch>> {
        let mut matches = Vec::with_capacity(items.len());
        for item in items {
            let Some(air_date) = item.air_date().or_else(|| date_from_title(&item.title)) else {
                return Err(MetadataError::Resolution {
                    item: item.title.clone(),
                    reason: "could not determine air date".to_string(),
                }
                .into());
            };

            let Some(episode) = self.tvdb.episode_by_air_date(show_name, &air_date).await? else {
                return Err(MetadataError::Resolution {
                    item: item.title.clone(),
                    reason: format!("TVDB lookup failed for '{}' on {}", show_name, air_date),
                }
                .into());
            };

            tracing::debug!(
                title = %item.title,
                season = episode.season,
                episode = episode.episode,
                "resolved episode by air date"
            );
            matches.push(EpisodeMatch {
                season: episode.season,
                episode: episode.episode,
                air_date: Some(episode.aired.unwrap_or(air_date)),
                base: item.base.clone(),
                title: item.title.clone(),
                description: item.summary().to_string(),
            });
        }
        Ok(matches)
    }
}

/// `20190501` → `2019-05-01`
pub fn normalize_upload_date(upload_date: &str) -> Option<String> {
    NaiveDate::parse_from_str(upload_date.trim(), "%Y%m%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Dates written out in titles: `1st May 2019`, `9th_March_2018`
pub fn date_from_title(title: &str) -> Option<String> {
    let caps = RE_TITLE_DATE.captures(title)?;
    let text = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&text, "%d %B %Y")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
