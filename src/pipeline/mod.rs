//! Acquisition pipeline for one job
//!
//! [`Pipeline`] is the scheduler's [`JobExecutor`]. It checks the external
//! toolchain and then drives a job through the stages of its media kind:
//!
//! 1. Download - yt-dlp with progress parsing and a per-source ledger
//! 2. Metadata - episode numbering, renames and NFO files (movies: TMDb)
//! 3. Convert - optional H.265 transcode with per-file failure isolation
//! 4. Artwork - posters and thumbnails from extracted frames
//! 5. NFO - season and show documents
//! 6. Library - copy into the media server library and request a rescan
//!
//! Music jobs replace stages 2-5 with track preparation (MP3 conversion,
//! renaming and ID3 tagging). Cancellation is checked between stages and,
//! through the process runner, on every line of tool output.

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, JobError, Result, ToolError};
use crate::job::{Job, JobTarget, JobUpdate};
use crate::metadata::{AirdateResolver, EpisodeResolver, TmdbClient, TvdbClient};
use crate::process::{ProcessObserver, ProcessRunner, RunOutcome, ToolCommand, Toolchain};
use crate::scheduler::{JobExecutor, JobHandle};
use crate::sources::{Ledger, SourceTracker, playlist_id};
use crate::types::{Stage, TrackMetadata};
use crate::utils::{
    AUDIO_EXTENSIONS, VIDEO_EXTENSIONS, list_files_with_extensions, sanitize_name, season_folder,
    season_episode_files,
};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

mod artwork;
mod convert;
mod download;
mod library;
mod metadata;
mod movie;
mod music;

pub use download::{DownloadMode, DownloadRequest, download_command};
pub use library::{LibraryNotifier, RefreshOutcome};
pub use metadata::{Numbering, renumber};

use library::LibraryBatch;

/// Everything a stage needs to act on its job
pub(crate) struct StageContext<'a> {
    pub(crate) job: &'a JobHandle,
    pub(crate) config: &'a Config,
    pub(crate) tools: &'a Toolchain,
    pub(crate) runner: &'a ProcessRunner,
    /// Per-job scratch directory for intermediate frames and covers
    pub(crate) scratch: &'a Path,
}

impl StageContext<'_> {
    /// Run a tool to completion as the job's current process
    pub(crate) async fn run_tool(&self, command: &ToolCommand) -> Result<()> {
        let observer: &dyn ProcessObserver = self.job;
        let outcome = self
            .runner
            .run(command, self.job.cancel_token(), Some(observer))
            .await?;
        self.check_outcome(command, outcome)
    }

    /// Stdout of a short probe; `None` when the tool exits non-zero
    pub(crate) async fn probe(&self, command: &ToolCommand) -> Result<Option<String>> {
        let output = self.runner.capture(command, self.job.cancel_token()).await?;
        match output.outcome {
            RunOutcome::Cancelled => Err(self.cancelled()),
            outcome if outcome.success() => Ok(Some(output.stdout)),
            _ => Ok(None),
        }
    }

    pub(crate) fn check_outcome(&self, command: &ToolCommand, outcome: RunOutcome) -> Result<()> {
        match outcome {
            RunOutcome::Cancelled => Err(self.cancelled()),
            outcome if outcome.success() => Ok(()),
            outcome => Err(ToolError::Failed {
                tool: command.tool_name(),
                exit_code: outcome.code(),
            }
            .into()),
        }
    }

    pub(crate) fn cancelled(&self) -> Error {
        JobError::Cancelled {
            id: self.job.id().to_string(),
        }
        .into()
    }
}

/// Emits a progress message once per `step` percent of each item
#[derive(Debug)]
pub(crate) struct PercentThrottle {
    step: f64,
    last: Option<(u32, u32)>,
}

impl PercentThrottle {
    pub(crate) fn new(step: f64) -> Self {
        Self { step, last: None }
    }

    pub(crate) fn should_log(&mut self, item: u32, percent: f64) -> bool {
        let bucket = (percent / self.step).floor().max(0.0) as u32;
        if self.last == Some((item, bucket)) {
            return false;
        }
        self.last = Some((item, bucket));
        true
    }
}

/// `base` with `suffix` appended to its last component
pub(crate) fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// Remove a file, ignoring a missing one
pub(crate) async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove file");
        }
    }
}

/// Runs jobs through download, metadata, conversion, artwork and library stages
pub struct Pipeline {
    config: Arc<Config>,
    db: Arc<Database>,
    tools: Toolchain,
    runner: ProcessRunner,
    http: reqwest::Client,
    tracker: Option<Arc<SourceTracker>>,
    resolver: Option<Arc<dyn EpisodeResolver>>,
    tmdb: Option<Arc<TmdbClient>>,
    library: Option<LibraryNotifier>,
}

impl Pipeline {
    /// Build a pipeline from configuration.
    ///
    /// Metadata clients are created when their API keys are configured and
    /// the library notifier when the server host and key are.
    pub fn new(config: Arc<Config>, db: Arc<Database>) -> Result<Self> {
        let timeout = config.metadata.request_timeout;
        let resolver = TvdbClient::from_config(&config.metadata)?
            .map(|tvdb| Arc::new(AirdateResolver::new(Arc::new(tvdb))) as Arc<dyn EpisodeResolver>);
        let tmdb = TmdbClient::from_config(&config.metadata)?.map(Arc::new);
        let library = LibraryNotifier::from_config(&config.jellyfin, timeout)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            tools: Toolchain::from_config(&config),
            runner: ProcessRunner::new(config.jobs.cancel_grace, config.jobs.probe_timeout),
            config,
            db,
            http,
            tracker: None,
            resolver,
            tmdb,
            library,
        })
    }

    /// Report completions of tracked-source jobs to `tracker`
    pub fn with_tracker(mut self, tracker: Arc<SourceTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Use `resolver` for automatic episode numbering
    pub fn with_resolver(mut self, resolver: Arc<dyn EpisodeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use `tmdb` for movie metadata
    pub fn with_tmdb(mut self, tmdb: Arc<TmdbClient>) -> Self {
        self.tmdb = Some(tmdb);
        self
    }

    /// Notify `library` after copies
    pub fn with_library(mut self, library: LibraryNotifier) -> Self {
        self.library = Some(library);
        self
    }

    /// Binaries this pipeline invokes
    pub fn toolchain(&self) -> &Toolchain {
        &self.tools
    }

    fn ledger_path(&self, job: &Job) -> PathBuf {
        let id = job
            .source_id
            .clone()
            .unwrap_or_else(|| playlist_id(&job.url));
        Ledger::for_source(&self.config.persistence.archive_dir(), &id)
            .path()
            .to_path_buf()
    }

    async fn run(&self, ctx: &StageContext<'_>, job: &Job) -> Result<()> {
        match &job.target {
            JobTarget::Tv {
                show_name,
                season_num,
                episode_start,
                playlist_start,
            } => {
                self.run_tv(ctx, job, show_name, season_num, episode_start, *playlist_start)
                    .await
            }
            JobTarget::Movie { movie_name } => self.run_movie(ctx, job, movie_name).await,
            JobTarget::Music {
                album_name,
                artist_name,
                tracks,
                playlist_start,
            } => {
                self.run_music(ctx, job, album_name, artist_name, tracks, *playlist_start)
                    .await
            }
        }
    }

    async fn run_tv(
        &self,
        ctx: &StageContext<'_>,
        job: &Job,
        show_name: &str,
        season_num: &str,
        episode_start: &str,
        playlist_start: Option<u32>,
    ) -> Result<()> {
        let Some(numbering) = Numbering::parse(episode_start) else {
            ctx.job.fail(
                "Invalid episode start",
                format!("Invalid episode start: {episode_start}"),
            );
            return Err(JobError::InvalidEpisodeStart {
                value: episode_start.to_string(),
            }
            .into());
        };
        let resolver = match numbering {
            Numbering::Auto => match &self.resolver {
                Some(resolver) => Some(resolver.as_ref()),
                None => {
                    ctx.job.fail(
                        "Episode detection unavailable",
                        "Automatic episode detection requires a TVDB API key",
                    );
                    return Err(Error::Validation(
                        "automatic episode detection is not configured".to_string(),
                    ));
                }
            },
            Numbering::StartAt(_) => None,
        };

        let folder = season_folder(&self.config.media.output_dir, show_name, season_num);
        tokio::fs::create_dir_all(&folder).await?;
        ctx.job
            .message(format!("Created folder structure: {}", folder.display()));

        let ledger = self.ledger_path(job);
        download::run_download_stage(
            ctx,
            &DownloadRequest {
                url: &job.url,
                folder: &folder,
                season: season_num,
                playlist_start,
                ledger: Some(&ledger),
                mode: DownloadMode::Video,
            },
        )
        .await?;
        ctx.job.ensure_active()?;

        metadata::run_metadata_stage(
            ctx,
            &self.db,
            &folder,
            show_name,
            season_num,
            numbering,
            resolver,
        )
        .await?;
        ctx.job.ensure_active()?;

        let videos = season_episode_files(&folder, season_num, &["webm", "mp4"]);
        convert::run_convert_stage(ctx, videos).await?;
        ctx.job.ensure_active()?;

        artwork::run_tv_artwork_stage(ctx, &folder, show_name, season_num).await?;
        ctx.job.ensure_active()?;

        metadata::run_nfo_stage(ctx, &folder, show_name, season_num).await?;
        ctx.job.ensure_active()?;

        let jellyfin = &self.config.jellyfin;
        if let (true, Some(tv_path)) = (jellyfin.enabled, jellyfin.tv_path.as_ref()) {
            let show_folder = folder.parent().unwrap_or(&folder);
            let show_dest = tv_path.join(sanitize_name(show_name));
            let season_dest = show_dest.join(format!("Season {season_num}"));
            let show_files = ["tvshow.nfo", "poster.jpg", "fanart.jpg"]
                .iter()
                .map(|name| show_folder.join(name))
                .filter(|path| path.is_file())
                .collect();
            let batches = [
                LibraryBatch {
                    files: list_files_with_extensions(&folder, &["mp4", "nfo", "jpg"]),
                    dest: season_dest,
                },
                LibraryBatch {
                    files: show_files,
                    dest: show_dest,
                },
            ];
            library::run_library_stage(ctx, &batches, self.library.as_ref()).await?;
        }
        Ok(())
    }

    async fn run_movie(&self, ctx: &StageContext<'_>, job: &Job, movie_name: &str) -> Result<()> {
        let folder = self.config.media.output_dir.join(sanitize_name(movie_name));
        tokio::fs::create_dir_all(&folder).await?;
        ctx.job
            .message(format!("Created movie folder: {}", folder.display()));

        let ledger = self.ledger_path(job);
        download::run_download_stage(
            ctx,
            &DownloadRequest {
                url: &job.url,
                folder: &folder,
                season: "01",
                playlist_start: None,
                ledger: Some(&ledger),
                mode: DownloadMode::Video,
            },
        )
        .await?;
        ctx.job.ensure_active()?;

        movie::run_movie_metadata_stage(ctx, &folder, movie_name, self.tmdb.as_deref()).await?;
        ctx.job.ensure_active()?;

        convert::run_convert_stage(ctx, list_files_with_extensions(&folder, VIDEO_EXTENSIONS))
            .await?;
        ctx.job.ensure_active()?;

        artwork::run_movie_artwork_stage(ctx, &folder).await?;
        ctx.job.ensure_active()?;

        let jellyfin = &self.config.jellyfin;
        if let (true, Some(movie_path)) = (jellyfin.enabled, jellyfin.movie_path.as_ref()) {
            let batches = [LibraryBatch {
                files: library::files_in(&folder),
                dest: movie_path.join(crate::utils::file_name(&folder)),
            }];
            library::run_library_stage(ctx, &batches, self.library.as_ref()).await?;
        }
        Ok(())
    }

    async fn run_music(
        &self,
        ctx: &StageContext<'_>,
        job: &Job,
        album_name: &str,
        artist_name: &str,
        tracks: &[TrackMetadata],
        playlist_start: Option<u32>,
    ) -> Result<()> {
        let artist_dir = sanitize_name(artist_name);
        let album_dir = sanitize_name(album_name);
        let folder = self.config.media.music_dir().join(&artist_dir).join(&album_dir);
        tokio::fs::create_dir_all(&folder).await?;
        ctx.job
            .message(format!("Created album folder: {}", folder.display()));

        let ledger = self.ledger_path(job);
        download::run_download_stage(
            ctx,
            &DownloadRequest {
                url: &job.url,
                folder: &folder,
                season: "01",
                playlist_start,
                ledger: Some(&ledger),
                mode: DownloadMode::Audio,
            },
        )
        .await?;
        ctx.job.ensure_active()?;

        let files = list_files_with_extensions(&folder, AUDIO_EXTENSIONS);
        let album = music::AlbumDefaults {
            album: album_name,
            artist: artist_name,
        };
        let prepared =
            music::run_track_stage(ctx, &self.http, &self.config.metadata.retry, &folder, &album, tracks, &files)
                .await?;
        if prepared.is_empty() {
            ctx.job
                .fail("No tracks prepared", "No music tracks were prepared");
            return Err(JobError::DownloadFailed {
                reason: "no music tracks were prepared".to_string(),
            }
            .into());
        }
        ctx.job.ensure_active()?;

        let jellyfin = &self.config.jellyfin;
        if let (true, Some(music_path)) = (jellyfin.enabled, jellyfin.music_path.as_ref()) {
            let batches = [LibraryBatch {
                files: library::files_in(&folder),
                dest: music_path.join(artist_dir).join(album_dir),
            }];
            library::run_library_stage(ctx, &batches, self.library.as_ref()).await?;
        }
        Ok(())
    }

    /// Tracked-source bookkeeping after a job reached `completed`
    async fn finish_tracked(&self, handle: &JobHandle, source_id: &str) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        match tracker.job_completed(source_id).await {
            Ok(removed) if !removed.is_empty() => info!(
                job_id = %handle.id(),
                source_id,
                removed = removed.len(),
                "retention removed old files"
            ),
            Ok(_) => {}
            Err(e) => warn!(
                job_id = %handle.id(),
                source_id,
                error = %e,
                "failed to update tracked source"
            ),
        }
    }
}

#[async_trait]
impl JobExecutor for Pipeline {
    async fn execute(&self, handle: JobHandle) -> Result<()> {
        let Some(job) = handle.snapshot() else {
            return Err(JobError::NotFound {
                id: handle.id().to_string(),
            }
            .into());
        };

        handle.update(
            JobUpdate::new()
                .stage(Stage::InProgress)
                .detailed("Starting job")
                .message("Starting job processing"),
        );
        info!(job_id = %handle.id(), kind = %job.kind(), url = %job.url, "job started");

        if let Err(e) = self.tools.check() {
            let missing = match &e {
                Error::Job(JobError::MissingDependencies { missing }) => missing.join(", "),
                other => other.to_string(),
            };
            handle.fail(
                "Missing dependencies",
                format!("Missing dependencies: {missing}"),
            );
            return Err(e);
        }
        handle.ensure_active()?;

        let scratch = std::env::temp_dir().join(format!("tubarr-{}", handle.id()));
        tokio::fs::create_dir_all(&scratch).await?;
        let ctx = StageContext {
            job: &handle,
            config: &self.config,
            tools: &self.tools,
            runner: &self.runner,
            scratch: &scratch,
        };

        let result = self.run(&ctx, &job).await;
        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            warn!(path = %scratch.display(), error = %e, "failed to remove scratch directory");
        }
        result?;
        handle.ensure_active()?;

        handle.update(
            JobUpdate::new()
                .stage(Stage::Completed)
                .progress(100.0)
                .stage_progress(100.0)
                .detailed("Job completed")
                .message("Job completed successfully"),
        );
        info!(job_id = %handle.id(), "job completed");

        // Runs once the job is terminal, so its outcome only reaches the log.
        if let Some(source_id) = &job.source_id {
            self.finish_tracked(&handle, source_id).await;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
