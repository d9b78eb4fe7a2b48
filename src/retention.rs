//! Retention policies for tracked-source output
//!
//! A tracked source's season folder holds numbered items (`... S00E07 ...`).
//! After a job for the source completes, [`enforce`] prunes the folder down
//! to the policy: everything, the newest N items by number, or the items
//! modified within the last N days. All files sharing a pruned item number
//! (media, `.nfo`, thumbnails) go together.

use crate::error::SourceError;
use crate::utils::{VIDEO_EXTENSIONS, episode_number_regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use utoipa::ToSchema;

/// How much tracked-source output to keep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Never prune
    #[default]
    #[serde(rename = "all")]
    KeepAll,
    /// Keep the N highest-numbered items
    #[serde(rename = "episodes")]
    KeepLastItems(u32),
    /// Keep items modified within the last N days
    #[serde(rename = "days")]
    KeepLastDays(u32),
}

impl RetentionPolicy {
    /// Build a policy from loosely typed input.
    ///
    /// `kind` accepts `keep_all`/`all`, `keep_episodes`/`episodes` and
    /// `keep_days`/`days` (case-insensitive, default `keep_all`). The count
    /// policies require a positive integer value.
    pub fn normalise(kind: Option<&str>, value: Option<&str>) -> Result<Self, SourceError> {
        let kind = kind
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| "keep_all".to_string());

        match kind.as_str() {
            "keep_all" | "all" => Ok(Self::KeepAll),
            "keep_episodes" | "episodes" => {
                positive_value(value, "keep episodes").map(Self::KeepLastItems)
            }
            "keep_days" | "days" => positive_value(value, "last days").map(Self::KeepLastDays),
            _ => Err(SourceError::InvalidRetention(
                "Unsupported retention policy".to_string(),
            )),
        }
    }

    /// Storage form: `(mode, value)`
    pub fn to_parts(self) -> (&'static str, Option<i64>) {
        match self {
            Self::KeepAll => ("all", None),
            Self::KeepLastItems(n) => ("episodes", Some(i64::from(n))),
            Self::KeepLastDays(n) => ("days", Some(i64::from(n))),
        }
    }

    /// Inverse of [`to_parts`](Self::to_parts). Unknown or non-positive
    /// stored values fall back to [`KeepAll`](Self::KeepAll).
    pub fn from_parts(mode: &str, value: Option<i64>) -> Self {
        let value = value
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0);
        match (mode, value) {
            ("episodes", Some(n)) => Self::KeepLastItems(n),
            ("days", Some(n)) => Self::KeepLastDays(n),
            _ => Self::KeepAll,
        }
    }
}

fn positive_value(value: Option<&str>, policy: &str) -> Result<u32, SourceError> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Err(SourceError::InvalidRetention(format!(
            "Retention value is required for {} policy",
            policy
        )));
    };
    let number: i64 = raw.parse().map_err(|_| {
        SourceError::InvalidRetention("Retention value must be an integer".to_string())
    })?;
    if number <= 0 {
        return Err(SourceError::InvalidRetention(
            "Retention value must be greater than zero".to_string(),
        ));
    }
    u32::try_from(number).map_err(|_| {
        SourceError::InvalidRetention("Retention value must be an integer".to_string())
    })
}

/// One numbered item of a season folder
#[derive(Debug)]
struct NumberedItem {
    files: Vec<PathBuf>,
    /// File whose modification time represents the item
    primary: PathBuf,
}

/// Group the files of `folder` by their `S{season}E{n}` number.
fn numbered_items(folder: &Path, season: &str) -> std::io::Result<BTreeMap<u32, NumberedItem>> {
    let pattern = episode_number_regex(season);
    let mut items: BTreeMap<u32, NumberedItem> = BTreeMap::new();

    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(number) = pattern
            .captures(name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };

        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        match items.get_mut(&number) {
            Some(item) => {
                if is_video {
                    item.primary = path.clone();
                }
                item.files.push(path);
            }
            None => {
                items.insert(
                    number,
                    NumberedItem {
                        files: vec![path.clone()],
                        primary: path,
                    },
                );
            }
        }
    }
    Ok(items)
}

/// Prune `folder` according to `policy`, returning the removed files.
///
/// A missing folder is not an error. Files that cannot be removed are logged
/// and skipped.
pub fn enforce(folder: &Path, season: &str, policy: RetentionPolicy) -> std::io::Result<Vec<PathBuf>> {
    if policy == RetentionPolicy::KeepAll || !folder.is_dir() {
        return Ok(Vec::new());
    }

    let items = numbered_items(folder, season)?;
    let doomed: Vec<u32> = match policy {
        RetentionPolicy::KeepAll => Vec::new(),
        RetentionPolicy::KeepLastItems(keep) => {
            let excess = items.len().saturating_sub(keep as usize);
            items.keys().take(excess).copied().collect()
        }
        RetentionPolicy::KeepLastDays(days) => {
            let window = Duration::from_secs(u64::from(days) * 24 * 60 * 60);
            let threshold = SystemTime::now()
                .checked_sub(window)
                .unwrap_or(SystemTime::UNIX_EPOCH);
            items
                .iter()
                .filter(|(_, item)| {
                    std::fs::metadata(&item.primary)
                        .and_then(|m| m.modified())
                        .is_ok_and(|modified| modified < threshold)
                })
                .map(|(number, _)| *number)
                .collect()
        }
    };

    let mut removed = Vec::new();
    for number in doomed {
        let Some(item) = items.get(&number) else {
            continue;
        };
        for file in &item.files {
            match std::fs::remove_file(file) {
                Ok(()) => removed.push(file.clone()),
                Err(e) => tracing::warn!(path = %file.display(), error = %e, "failed to remove file"),
            }
        }
    }

    if !removed.is_empty() {
        tracing::info!(
            folder = %folder.display(),
            files = removed.len(),
            ?policy,
            "retention pruned old items"
        );
    }
    Ok(removed)
}
