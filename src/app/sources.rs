//! Tracked playlists and channel subscriptions.

use super::Tubarr;
use crate::error::{Error, Result};
use crate::sources::{RemoteEntry, SourceKind, SourceView, SubscriptionUpdate, TrackedSource};
use crate::types::{Event, JobId};

impl Tubarr {
    /// Current entries of a remote playlist or channel
    pub async fn playlist_info(&self, url: &str) -> Result<Vec<RemoteEntry>> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Validation("URL is required".to_string()));
        }
        self.lister.list(url).await
    }

    /// Tracked sources of one kind with their progress figures
    pub async fn list_sources(&self, kind: SourceKind) -> Result<Vec<SourceView>> {
        self.tracker.list(kind).await
    }

    /// Enable or disable polling of a source of `kind`.
    /// Returns `false` when no such source exists.
    pub async fn set_source_enabled(&self, kind: SourceKind, id: &str, enabled: bool) -> Result<bool> {
        if !self.source_is(kind, id).await? {
            return Ok(false);
        }
        self.tracker.set_enabled(id, enabled).await
    }

    /// Stop tracking a source of `kind` and delete its ledger
    pub async fn remove_source(&self, kind: SourceKind, id: &str) -> Result<bool> {
        if !self.source_is(kind, id).await? {
            return Ok(false);
        }
        self.tracker.remove(id).await
    }

    /// Subscribe to a channel's future uploads
    pub async fn subscribe_channel(
        &self,
        url: &str,
        show_name: &str,
        retention_type: Option<&str>,
        retention_value: Option<&str>,
    ) -> Result<TrackedSource> {
        self.tracker
            .subscribe(url, show_name, retention_type, retention_value)
            .await
    }

    /// Change a channel subscription. Returns `false` when it does not exist.
    pub async fn update_subscription(&self, id: &str, update: SubscriptionUpdate) -> Result<bool> {
        self.tracker.update_subscription(id, update).await
    }

    /// Poll every enabled source of `kind` now, returning the jobs created
    pub async fn check_sources(&self, kind: SourceKind) -> Vec<(String, JobId)> {
        let jobs = self.tracker.poll(kind, self).await;
        for (source_id, job_id) in &jobs {
            self.event_tx
                .send(Event::SourcePolled {
                    source_id: source_id.clone(),
                    job_id: Some(job_id.clone()),
                })
                .ok();
        }
        jobs
    }

    async fn source_is(&self, kind: SourceKind, id: &str) -> Result<bool> {
        Ok(self
            .tracker
            .get(id)
            .await?
            .is_some_and(|source| source.kind == kind))
    }
}
