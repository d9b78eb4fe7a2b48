//! Listing of the organised library on disk.

use super::Tubarr;
use crate::utils::{VIDEO_EXTENSIONS, compile_regex, file_name, list_files_with_extensions};
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use utoipa::ToSchema;

static RE_EPISODE: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"S(\d+)E(\d+)"));
static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"(\d+)"));

/// One episode file
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MediaEpisode {
    /// File stem
    pub name: String,
    /// Absolute path
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Modification time, `%Y-%m-%d %H:%M:%S`
    pub modified: String,
    /// Episode number from the `SxxEyy` tag
    pub episode_num: Option<u32>,
}

/// One `Season NN` folder
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MediaSeason {
    /// Folder name
    pub name: String,
    /// Absolute path
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Season poster, relative to the output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Episodes ordered by number, unnumbered last
    pub episodes: Vec<MediaEpisode>,
}

/// One show folder
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MediaShow {
    /// Folder name
    pub name: String,
    /// Absolute path
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Show poster, relative to the output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    /// Seasons ordered by name
    pub seasons: Vec<MediaSeason>,
    /// Episodes across all seasons
    pub episode_count: usize,
}

/// One movie folder with its video file
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MovieEntry {
    /// Folder name
    pub name: String,
    /// Video file path
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Modification time, `%Y-%m-%d %H:%M:%S`
    pub modified: String,
}

fn subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn is_season_dir(path: &Path) -> bool {
    file_name(path).starts_with("Season ")
}

fn size_and_mtime(path: &Path) -> (u64, String) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let modified = meta
                .modified()
                .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            (meta.len(), modified)
        }
        Err(_) => (0, String::new()),
    }
}

fn relative_if_exists(path: &Path, root: &Path) -> Option<String> {
    path.is_file()
        .then(|| path.strip_prefix(root).ok())
        .flatten()
        .map(|p| p.to_string_lossy().into_owned())
}

fn season(dir: &Path, root: &Path) -> MediaSeason {
    let number = RE_DIGITS
        .captures(&file_name(dir))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let mut episodes: Vec<MediaEpisode> = list_files_with_extensions(dir, &["mp4"])
        .into_iter()
        .map(|path| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let episode_num = RE_EPISODE
                .captures(&name)
                .and_then(|c| c.get(2))
                .and_then(|m| m.as_str().parse().ok());
            let (size, modified) = size_and_mtime(&path);
            MediaEpisode {
                name,
                path,
                size,
                modified,
                episode_num,
            }
        })
        .collect();
    episodes.sort_by(|a, b| {
        (a.episode_num.is_none(), a.episode_num, &a.name)
            .cmp(&(b.episode_num.is_none(), b.episode_num, &b.name))
    });

    MediaSeason {
        name: file_name(dir),
        path: dir.to_path_buf(),
        poster: relative_if_exists(&dir.join(format!("season{number}-poster.jpg")), root),
        episodes,
    }
}

/// Folders under `root` holding at least one season, skipping the music library
pub(crate) fn scan_shows(root: &Path, music_dir: &Path) -> Vec<MediaShow> {
    subdirs(root)
        .into_iter()
        .filter(|dir| dir != music_dir)
        .filter_map(|show_dir| {
            let seasons: Vec<MediaSeason> = subdirs(&show_dir)
                .iter()
                .filter(|dir| is_season_dir(dir))
                .map(|dir| season(dir, root))
                .collect();
            if seasons.is_empty() {
                return None;
            }
            Some(MediaShow {
                name: file_name(&show_dir),
                poster: relative_if_exists(&show_dir.join("poster.jpg"), root),
                episode_count: seasons.iter().map(|s| s.episodes.len()).sum(),
                path: show_dir,
                seasons,
            })
        })
        .collect()
}

/// Movie folders under `root`: folders without seasons that hold a video
pub(crate) fn scan_movies(root: &Path, music_dir: &Path) -> Vec<MovieEntry> {
    subdirs(root)
        .into_iter()
        .filter(|dir| dir != music_dir)
        .filter(|dir| !subdirs(dir).iter().any(|sub| is_season_dir(sub)))
        .filter_map(|dir| {
            let video = list_files_with_extensions(&dir, VIDEO_EXTENSIONS)
                .into_iter()
                .next()?;
            let (size, modified) = size_and_mtime(&video);
            Some(MovieEntry {
                name: file_name(&dir),
                path: video,
                size,
                modified,
            })
        })
        .collect()
}

impl Tubarr {
    /// Shows, seasons and episodes in the output directory
    pub async fn list_media(&self) -> Vec<MediaShow> {
        let root = self.config.media.output_dir.clone();
        let music = self.config.media.music_dir();
        tokio::task::spawn_blocking(move || scan_shows(&root, &music))
            .await
            .unwrap_or_default()
    }

    /// Movies in the output directory
    pub async fn list_movies(&self) -> Vec<MovieEntry> {
        let root = self.config.media.output_dir.clone();
        let music = self.config.media.music_dir();
        tokio::task::spawn_blocking(move || scan_movies(&root, &music))
            .await
            .unwrap_or_default()
    }
}
