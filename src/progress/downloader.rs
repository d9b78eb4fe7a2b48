//! yt-dlp output dialect

use super::{LineParser, ProgressEvent};
use crate::utils::compile_regex;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static RE_DESTINATION: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"Destination:\s+(.+?)\s*$"));
static RE_ITEM_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"of\s+(\d+)\s+item|item\s+\d+\s+of\s+(\d+)"));
static RE_PERCENT: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"(\d+(?:\.\d+)?)%"));

/// Lines such as:
///
/// ```text
/// [download] Destination: /media/Show/Season 01/Title S01E03.mp4
/// [download] Downloading item 3 of 10
/// [download]  42.5% of 10.00MiB at 2.00MiB/s ETA 00:03
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct DownloaderDialect;

impl LineParser for DownloaderDialect {
    fn parse(&self, line: &str) -> Option<ProgressEvent> {
        let line = line.trim();
        let tagged = line.contains("[download]");

        if tagged && line.contains("Destination:") {
            let raw = RE_DESTINATION.captures(line)?.get(1)?.as_str();
            let name = Path::new(raw)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| raw.to_string());
            return Some(ProgressEvent::FileStarted { name });
        }

        if tagged && line.contains("item") && line.contains("of") {
            let caps = RE_ITEM_TOTAL.captures(line)?;
            let total = caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()?;
            return Some(ProgressEvent::ItemCount { total });
        }

        if line.contains('%') {
            let pct: f64 = RE_PERCENT.captures(line)?.get(1)?.as_str().parse().ok()?;
            return Some(ProgressEvent::Percent(pct.clamp(0.0, 100.0)));
        }

        None
    }
}

/// What a downloader event changed, ready to apply to a job
#[derive(Clone, Debug, PartialEq)]
pub enum DownloadUpdate {
    /// A new file began; one entry of the upcoming-work list is consumed
    FileStarted {
        /// Base name of the file
        name: String,
        /// Files started so far
        processed_files: u32,
    },
    /// The item total became known
    Total {
        /// Item total
        total_files: u32,
    },
    /// Per-file percentage advanced
    Progress {
        /// Overall progress, 0-99
        overall: f64,
        /// Current file percentage
        file_percent: f64,
        /// Name of the file being downloaded
        current_file: String,
    },
}

/// Running totals of one download stage.
#[derive(Clone, Debug, Default)]
pub struct DownloadTracker {
    total_files: u32,
    processed_files: u32,
    current_file: String,
}

impl DownloadTracker {
    /// Fresh tracker with nothing started
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker with known counters
    pub fn with_counts(total_files: u32, processed_files: u32) -> Self {
        Self {
            total_files,
            processed_files,
            current_file: String::new(),
        }
    }

    /// Files started so far
    pub fn processed_files(&self) -> u32 {
        self.processed_files
    }

    /// Item total, 0 while unknown
    pub fn total_files(&self) -> u32 {
        self.total_files
    }

    /// Fold one event into the totals.
    pub fn apply(&mut self, event: ProgressEvent) -> Option<DownloadUpdate> {
        match event {
            ProgressEvent::FileStarted { name } => {
                self.processed_files += 1;
                self.current_file = name.clone();
                Some(DownloadUpdate::FileStarted {
                    name,
                    processed_files: self.processed_files,
                })
            }
            ProgressEvent::ItemCount { total } => {
                self.total_files = total;
                Some(DownloadUpdate::Total { total_files: total })
            }
            ProgressEvent::Percent(pct) => Some(DownloadUpdate::Progress {
                overall: self.overall(pct),
                file_percent: pct,
                current_file: self.current_file.clone(),
            }),
            ProgressEvent::Elapsed(_) => None,
        }
    }

    /// `((processed - 1) / total) * 100 + pct / total`, capped at 99.
    ///
    /// Without a known total the per-file percentage stands in.
    pub fn overall(&self, file_percent: f64) -> f64 {
        let overall = if self.total_files > 0 {
            let total = f64::from(self.total_files);
            let done = f64::from(self.processed_files.saturating_sub(1));
            done / total * 100.0 + file_percent / total
        } else {
            file_percent
        };
        overall.clamp(0.0, 99.0)
    }
}
