//! Download stage: yt-dlp invocation and progress tracking

use super::{PercentThrottle, StageContext};
use crate::config::Config;
use crate::error::{JobError, Result};
use crate::job::JobUpdate;
use crate::process::{ProcessObserver, RunOutcome, ToolCommand};
use crate::progress::{DownloadTracker, DownloadUpdate, DownloaderDialect, LineParser};
use crate::types::Stage;
use crate::utils::existing_max_index;
use std::path::Path;
use tracing::{debug, info};

/// What the downloader keeps of each item
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadMode {
    /// Best video and audio merged into MP4, with an info sidecar
    Video,
    /// Best audio extracted to MP3
    Audio,
}

/// One downloader run
#[derive(Clone, Copy, Debug)]
pub struct DownloadRequest<'a> {
    /// Playlist, channel or video URL
    pub url: &'a str,
    /// Destination folder
    pub folder: &'a Path,
    /// Season text embedded in video file names
    pub season: &'a str,
    /// Explicit 1-based start position
    pub playlist_start: Option<u32>,
    /// Archive of already fetched ids
    pub ledger: Option<&'a Path>,
    /// Video or audio
    pub mode: DownloadMode,
}

/// Argument vector for a downloader run.
///
/// Without an explicit start, a folder that already holds episodes but has
/// no ledger resumes after the highest local episode number.
pub fn download_command(config: &Config, ytdlp: &Path, request: &DownloadRequest<'_>) -> ToolCommand {
    let quality = config.media.quality;
    let mut command = ToolCommand::new(ytdlp).args(["--ignore-errors", "--no-warnings"]);

    command = match request.mode {
        DownloadMode::Video => command
            .arg("-f")
            .arg(format!(
                "bestvideo[height<={quality}]+bestaudio/best[height<={quality}]"
            ))
            .arg("-o")
            .arg(format!(
                "{}/%(title)s S{}E%(playlist_index)02d.%(ext)s",
                request.folder.display(),
                request.season
            ))
            .args([
                "--write-info-json",
                "--restrict-filenames",
                "--merge-output-format",
                "mp4",
            ]),
        DownloadMode::Audio => command
            .args(["-f", "bestaudio/best", "-x", "--audio-format", "mp3"])
            .arg("-o")
            .arg(format!(
                "{}/%(playlist_index)03d - %(title)s.%(ext)s",
                request.folder.display()
            )),
    };

    command = command
        .args(["--progress", "--no-cookies-from-browser"])
        .arg(request.url);

    if let Some(ledger) = request.ledger {
        command = command.arg("--download-archive").arg(ledger);
    }

    let start = request.playlist_start.or_else(|| {
        let has_ledger = request.ledger.is_some_and(Path::exists);
        if request.mode == DownloadMode::Video && !has_ledger {
            let last = existing_max_index(request.folder, request.season);
            (last > 0).then_some(last + 1)
        } else {
            None
        }
    });
    if let Some(start) = start {
        command = command.arg("--playlist-start").arg(start.to_string());
    }

    match config
        .downloader
        .cookies_path
        .as_deref()
        .filter(|path| path.exists())
    {
        Some(cookies) => {
            let mut flag = std::ffi::OsString::from("--cookies=");
            flag.push(cookies);
            command.insert_arg(0, flag)
        }
        None => command.insert_arg(0, "--no-cookies"),
    }
}

pub(crate) async fn run_download_stage(
    ctx: &StageContext<'_>,
    request: &DownloadRequest<'_>,
) -> Result<()> {
    if let Some(parent) = request.ledger.and_then(Path::parent) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let command = download_command(ctx.config, &ctx.tools.ytdlp, request);

    let noun = match request.mode {
        DownloadMode::Video => "playlist",
        DownloadMode::Audio => "album",
    };
    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::Downloading)
            .progress(0.0)
            .stage_progress(0.0)
            .detailed(format!("Starting download of {noun}"))
            .message(format!("Starting download of {noun}: {}", request.url)),
    );
    info!(job_id = %ctx.job.id(), url = request.url, "starting download");
    debug!(job_id = %ctx.job.id(), %command, "downloader command");

    let job = ctx.job;
    let observer: &dyn ProcessObserver = job;
    let mut tracker = DownloadTracker::new();
    let mut throttle = PercentThrottle::new(10.0);

    let outcome = ctx
        .runner
        .stream(&command, job.cancel_token(), Some(observer), |line| {
            let line = line.trim();
            if line.is_empty() {
                return;
            }
            debug!(job_id = %job.id(), line, "downloader");

            let update = match DownloaderDialect.parse(line).and_then(|e| tracker.apply(e)) {
                Some(DownloadUpdate::FileStarted {
                    name,
                    processed_files,
                }) => JobUpdate::new()
                    .file(name.clone())
                    .processed_files(processed_files)
                    .pop_remaining()
                    .detailed(format!("Downloading: {name}"))
                    .message(format!("Downloading file: {name}")),
                Some(DownloadUpdate::Total { total_files }) => {
                    JobUpdate::new().total_files(total_files).message(line)
                }
                Some(DownloadUpdate::Progress {
                    overall,
                    file_percent,
                    current_file,
                }) => {
                    let update = JobUpdate::new()
                        .progress(overall)
                        .stage_progress(overall)
                        .detailed(format!("Downloading: {current_file} ({file_percent:.1}%)"));
                    if throttle.should_log(tracker.processed_files(), file_percent) {
                        update.message(line)
                    } else {
                        update
                    }
                }
                None => JobUpdate::new().message(line),
            };
            job.update(update);
        })
        .await?;

    match outcome {
        RunOutcome::Cancelled => Err(ctx.cancelled()),
        outcome if outcome.success() => {
            ctx.job.update(
                JobUpdate::new()
                    .stage(Stage::Downloaded)
                    .progress(100.0)
                    .stage_progress(100.0)
                    .detailed("Download completed")
                    .message("Download completed successfully"),
            );
            Ok(())
        }
        outcome => {
            let code = outcome
                .code()
                .map_or_else(|| "none".to_string(), |c| c.to_string());
            ctx.job.fail(
                "Download failed",
                format!("Download failed with return code {code}"),
            );
            Err(JobError::DownloadFailed {
                reason: format!("downloader exited with code {code}"),
            }
            .into())
        }
    }
}
