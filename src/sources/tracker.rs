//! Registration, polling and completion bookkeeping of tracked sources

use super::{
    Ledger, RemoteEntry, RemoteLister, SourceKind, SourceView, TrackedSource, channel_id,
    playlist_id,
};
use crate::db::Database;
use crate::error::{Error, Result, SourceError};
use crate::retention::{self, RetentionPolicy};
use crate::types::JobId;
use crate::utils::{existing_max_index, season_folder};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Season that channel subscriptions are filed under
const CHANNEL_SEASON: &str = "00";

/// A job the tracker wants submitted for a source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedJobRequest {
    /// Source the job fetches for
    pub source_id: String,
    /// Remote URL
    pub url: String,
    /// Show name
    pub show_name: String,
    /// Season number text
    pub season_num: String,
    /// First local episode number, zero-padded
    pub episode_start: String,
    /// 1-based remote position to start from
    pub playlist_start: Option<u32>,
}

/// Where polling hands its jobs.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Submit a job for a tracked source
    async fn submit_tracked(&self, request: TrackedJobRequest) -> Result<JobId>;

    /// Whether a non-terminal job already exists for the source
    fn has_live_job(&self, source_id: &str) -> bool;
}

/// Changes to a channel subscription; `None` leaves a field as is
#[derive(Clone, Debug, Default)]
pub struct SubscriptionUpdate {
    /// New show name
    pub show_name: Option<String>,
    /// New retention policy name
    pub retention_type: Option<String>,
    /// New retention value
    pub retention_value: Option<String>,
    /// Enable or disable polling
    pub enabled: Option<bool>,
}

/// Keeps tracked sources, their ledgers and their output in step.
pub struct SourceTracker {
    db: Arc<Database>,
    lister: Arc<dyn RemoteLister>,
    archive_dir: PathBuf,
    output_dir: PathBuf,
    /// Serialises polling so two checks never submit for the same source
    poll_lock: Mutex<()>,
}

impl SourceTracker {
    /// Create a tracker.
    ///
    /// * `archive_dir` - directory holding one ledger per source
    /// * `output_dir` - media root the sources' season folders live under
    pub fn new(
        db: Arc<Database>,
        lister: Arc<dyn RemoteLister>,
        archive_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            lister,
            archive_dir,
            output_dir,
            poll_lock: Mutex::new(()),
        }
    }

    /// The remote lister
    pub fn lister(&self) -> &Arc<dyn RemoteLister> {
        &self.lister
    }

    /// Ledger of a source id
    pub fn ledger(&self, id: &str) -> Ledger {
        Ledger::for_source(&self.archive_dir, id)
    }

    /// Look up a source
    pub async fn get(&self, id: &str) -> Result<Option<TrackedSource>> {
        self.db.get_source(id).await
    }

    /// Register a source unless one with the same id exists.
    ///
    /// Returns the stored record and whether it was newly created.
    pub async fn register(
        &self,
        url: &str,
        kind: SourceKind,
        show_name: &str,
        season_num: &str,
        retention: RetentionPolicy,
        resume_cursor: u32,
    ) -> Result<(TrackedSource, bool)> {
        let id = match kind {
            SourceKind::Playlist => playlist_id(url),
            SourceKind::Channel => channel_id(url),
        };
        let now = Utc::now();
        let source = TrackedSource {
            ledger_path: self.ledger(&id).path().to_path_buf(),
            id,
            kind,
            url: url.to_string(),
            show_name: show_name.to_string(),
            season_num: season_num.to_string(),
            enabled: true,
            resume_cursor: resume_cursor.max(1),
            retention,
            created_at: now,
            updated_at: now,
            last_checked: None,
            last_error: None,
        };

        let created = self.db.insert_source(&source).await?;
        let stored = self
            .db
            .get_source(&source.id)
            .await?
            .ok_or_else(|| SourceError::NotFound {
                id: source.id.clone(),
            })?;
        if created {
            info!(source_id = %stored.id, kind = %kind, url, "registered tracked source");
        }
        Ok((stored, created))
    }

    /// Track a playlist a TV job was submitted for.
    ///
    /// When newly registered with a start position past 1, the ids of the
    /// skipped entries are seeded into the ledger so polling never fetches
    /// them. Listing failures while seeding are logged and ignored.
    pub async fn register_playlist(
        &self,
        url: &str,
        show_name: &str,
        season_num: &str,
        playlist_start: Option<u32>,
    ) -> Result<(TrackedSource, bool)> {
        let start = playlist_start.unwrap_or(1).max(1);
        let (source, created) = self
            .register(
                url,
                SourceKind::Playlist,
                show_name,
                season_num,
                RetentionPolicy::KeepAll,
                start,
            )
            .await?;

        if created && start > 1 {
            match self.lister.list(url).await {
                Ok(entries) => {
                    let skipped: Vec<String> = entries
                        .iter()
                        .filter(|e| e.index < start)
                        .map(RemoteEntry::archive_line)
                        .collect();
                    let ledger = self.ledger(&source.id);
                    let seeded = ledger.append(&skipped).await?;
                    debug!(source_id = %source.id, seeded, "seeded playlist ledger");
                }
                Err(e) => {
                    error!(source_id = %source.id, error = %e, "failed to seed ledger");
                }
            }
        }
        Ok((source, created))
    }

    /// Subscribe to a channel so that only future uploads are fetched.
    ///
    /// Items are filed under season `00`. Every id currently on the channel
    /// is seeded into the ledger.
    pub async fn subscribe(
        &self,
        url: &str,
        show_name: &str,
        retention_type: Option<&str>,
        retention_value: Option<&str>,
    ) -> Result<TrackedSource> {
        let url = url.trim();
        let show_name = show_name.trim();
        if url.is_empty() || show_name.is_empty() {
            return Err(Error::Validation(
                "Channel URL and show name are required".to_string(),
            ));
        }
        let retention = RetentionPolicy::normalise(retention_type, retention_value)?;

        let id = channel_id(url);
        if self.db.get_source(&id).await?.is_some() {
            return Err(SourceError::AlreadyExists {
                id,
                reason: "Subscription already exists for this channel".to_string(),
            }
            .into());
        }

        let (source, _) = self
            .register(
                url,
                SourceKind::Channel,
                show_name,
                CHANNEL_SEASON,
                retention,
                1,
            )
            .await?;

        let ledger = self.ledger(&source.id);
        if ledger.is_empty().await? {
            match self.lister.list(url).await {
                Ok(entries) => {
                    let seeded = ledger
                        .append(entries.iter().map(RemoteEntry::archive_line))
                        .await?;
                    info!(source_id = %source.id, seeded, "seeded subscription ledger");
                }
                Err(e) => {
                    warn!(source_id = %source.id, error = %e, "failed to seed subscription ledger");
                }
            }
        }
        Ok(source)
    }

    /// Apply changes to a subscription. Returns `false` if it does not exist.
    pub async fn update_subscription(&self, id: &str, update: SubscriptionUpdate) -> Result<bool> {
        let Some(source) = self.db.get_source(id).await? else {
            return Ok(false);
        };
        if source.kind != SourceKind::Channel {
            return Ok(false);
        }

        if let Some(show_name) = update.show_name.as_deref().map(str::trim) {
            if !show_name.is_empty() {
                self.db.set_source_show(id, show_name).await?;
            }
        }
        if let Some(kind) = update.retention_type.as_deref().filter(|k| !k.trim().is_empty()) {
            let retention =
                RetentionPolicy::normalise(Some(kind), update.retention_value.as_deref())?;
            self.db.set_source_retention(id, retention).await?;
        }
        if let Some(enabled) = update.enabled {
            self.db.set_source_enabled(id, enabled).await?;
        }
        Ok(true)
    }

    /// Enable or disable polling. Returns `false` if the source does not exist.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        let updated = self.db.set_source_enabled(id, enabled).await?;
        if updated {
            info!(source_id = id, enabled, "tracked source toggled");
        }
        Ok(updated)
    }

    /// Stop tracking a source and delete its ledger.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let Some(source) = self.db.get_source(id).await? else {
            return Ok(false);
        };
        self.db.delete_source(id).await?;
        if let Err(e) = Ledger::new(&source.ledger_path).remove().await {
            warn!(source_id = id, error = %e, "failed to remove ledger");
        }
        info!(source_id = id, "tracked source removed");
        Ok(true)
    }

    /// Sources of one kind with their progress figures
    pub async fn list(&self, kind: SourceKind) -> Result<Vec<SourceView>> {
        let sources = self.db.list_sources(kind).await?;
        let mut views = Vec::with_capacity(sources.len());
        for source in sources {
            let last_episode = self
                .last_episode(&source.show_name, &source.season_num)
                .await?;
            let downloaded_videos = match Ledger::new(&source.ledger_path).len().await {
                Ok(n) => n,
                Err(e) => {
                    warn!(source_id = %source.id, error = %e, "failed to read ledger");
                    0
                }
            };
            views.push(SourceView {
                source,
                last_episode,
                downloaded_videos,
            });
        }
        Ok(views)
    }

    /// Highest known episode of a season: the tracker's counter or the
    /// highest number already on disk, whichever is larger.
    pub async fn last_episode(&self, show_name: &str, season_num: &str) -> Result<u32> {
        let recorded = self.db.get_last_episode(show_name, season_num).await?;
        let on_disk = existing_max_index(&self.folder(show_name, season_num), season_num);
        Ok(recorded.max(on_disk))
    }

    fn folder(&self, show_name: &str, season_num: &str) -> PathBuf {
        season_folder(&self.output_dir, show_name, season_num)
    }

    /// Poll every enabled source of both kinds.
    pub async fn poll_all(&self, submitter: &dyn JobSubmitter) -> Vec<(String, JobId)> {
        let mut jobs = self.poll(SourceKind::Playlist, submitter).await;
        jobs.extend(self.poll(SourceKind::Channel, submitter).await);
        jobs
    }

    /// Poll every enabled source of one kind, submitting at most one job per
    /// source. A failing source is logged and recorded; the rest still run.
    pub async fn poll(&self, kind: SourceKind, submitter: &dyn JobSubmitter) -> Vec<(String, JobId)> {
        let _guard = self.poll_lock.lock().await;

        let sources = match self.db.list_sources(kind).await {
            Ok(sources) => sources,
            Err(e) => {
                error!(kind = %kind, error = %e, "failed to load tracked sources");
                return Vec::new();
            }
        };

        let mut jobs = Vec::new();
        for source in sources {
            if !source.enabled {
                debug!(source_id = %source.id, "tracked source disabled, skipping");
                continue;
            }
            if submitter.has_live_job(&source.id) {
                debug!(source_id = %source.id, "job already running for source, skipping");
                continue;
            }

            let outcome = self.poll_source(&source, submitter).await;
            let recorded_error = outcome.as_ref().err().map(|e| e.to_string());
            if let Err(e) = self
                .db
                .record_source_check(&source.id, recorded_error.as_deref())
                .await
            {
                warn!(source_id = %source.id, error = %e, "failed to record source check");
            }

            match outcome {
                Ok(Some(job_id)) => jobs.push((source.id.clone(), job_id)),
                Ok(None) => info!(source_id = %source.id, url = %source.url, "no updates found"),
                Err(e) => error!(source_id = %source.id, url = %source.url, error = %e, "failed to check source"),
            }
        }
        jobs
    }

    async fn poll_source(
        &self,
        source: &TrackedSource,
        submitter: &dyn JobSubmitter,
    ) -> Result<Option<JobId>> {
        let entries = self.lister.list(&source.url).await?;
        let fetched = Ledger::new(&source.ledger_path).load().await?;

        let Some(playlist_start) = next_fetch_start(source, &entries, &fetched) else {
            return Ok(None);
        };

        let last_episode = self
            .last_episode(&source.show_name, &source.season_num)
            .await?;
        let request = TrackedJobRequest {
            source_id: source.id.clone(),
            url: source.url.clone(),
            show_name: source.show_name.clone(),
            season_num: source.season_num.clone(),
            episode_start: format!("{:02}", last_episode + 1),
            playlist_start,
        };
        let job_id = submitter.submit_tracked(request).await?;
        info!(
            source_id = %source.id,
            job_id = %job_id,
            episode_start = last_episode + 1,
            "submitted job for new items"
        );
        Ok(Some(job_id))
    }

    /// Bookkeeping after a job for `source_id` completed: advance the resume
    /// cursor (playlists), record the last episode and enforce retention.
    ///
    /// Returns the files removed by retention.
    pub async fn job_completed(&self, source_id: &str) -> Result<Vec<PathBuf>> {
        let Some(source) = self.db.get_source(source_id).await? else {
            return Err(SourceError::NotFound {
                id: source_id.to_string(),
            }
            .into());
        };

        if source.kind == SourceKind::Playlist {
            let count = Ledger::new(&source.ledger_path).len().await?;
            let cursor = u32::try_from(count + 1).unwrap_or(u32::MAX);
            self.db.set_resume_cursor(&source.id, cursor).await?;
            debug!(source_id, cursor, "advanced resume cursor");
        }

        let folder = self.folder(&source.show_name, &source.season_num);
        let on_disk = existing_max_index(&folder, &source.season_num);
        if on_disk > 0 {
            self.db
                .set_last_episode(&source.show_name, &source.season_num, on_disk)
                .await?;
        }

        enforce_retention(&folder, &source.season_num, source.retention).await
    }
}

/// Decide whether a source has new items and where the fetch starts.
///
/// Returns `None` when nothing is new, `Some(None)` to start from the top and
/// `Some(Some(n))` to start at remote position `n`. Playlists consider only
/// entries at or past the resume cursor and restart there; channels list
/// newest first, so the fetch starts at the lowest new position.
fn next_fetch_start(
    source: &TrackedSource,
    entries: &[RemoteEntry],
    fetched: &HashSet<String>,
) -> Option<Option<u32>> {
    match source.kind {
        SourceKind::Playlist => {
            let cursor = source.resume_cursor.max(1);
            let any_new = entries
                .iter()
                .any(|e| e.index >= cursor && !fetched.contains(&e.id));
            any_new.then_some((cursor != 1).then_some(cursor))
        }
        SourceKind::Channel => entries
            .iter()
            .filter(|e| !fetched.contains(&e.id))
            .map(|e| e.index)
            .min()
            .map(Some),
    }
}

async fn enforce_retention(
    folder: &Path,
    season: &str,
    policy: RetentionPolicy,
) -> Result<Vec<PathBuf>> {
    let folder = folder.to_path_buf();
    let season = season.to_string();
    tokio::task::spawn_blocking(move || retention::enforce(&folder, &season, policy))
        .await
        .map_err(|e| Error::Other(format!("retention task failed: {}", e)))?
        .map_err(Error::from)
}
