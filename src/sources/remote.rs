//! Listing the items of a remote playlist or channel

use crate::error::{Result, SourceError, ToolError};
use crate::process::{ProcessRunner, ToolCommand};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

/// One item of a remote list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RemoteEntry {
    /// 1-based position in the list
    pub index: u32,
    /// Opaque item id
    pub id: String,
    /// Item title
    pub title: String,
    /// Extractor name as used in downloader archive lines, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
}

impl RemoteEntry {
    /// The line the downloader writes to its archive for this item
    pub fn archive_line(&self) -> String {
        match &self.extractor {
            Some(extractor) => format!("{} {}", extractor, self.id),
            None => self.id.clone(),
        }
    }
}

/// Fetches the current item list of a source.
#[async_trait]
pub trait RemoteLister: Send + Sync {
    /// Entries of `url` in remote order
    async fn list(&self, url: &str) -> Result<Vec<RemoteEntry>>;
}

/// Lists sources with `yt-dlp --flat-playlist --dump-single-json`
#[derive(Clone, Debug)]
pub struct YtDlpLister {
    ytdlp: PathBuf,
    cookies: Option<PathBuf>,
    runner: ProcessRunner,
    shutdown: CancellationToken,
}

impl YtDlpLister {
    /// Create a lister. `shutdown` aborts a listing in progress.
    pub fn new(
        ytdlp: PathBuf,
        cookies: Option<PathBuf>,
        runner: ProcessRunner,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ytdlp,
            cookies,
            runner,
            shutdown,
        }
    }

    fn command(&self, url: &str) -> ToolCommand {
        let mut command = ToolCommand::new(&self.ytdlp).args(["--flat-playlist", "--dump-single-json"]);
        if let Some(cookies) = &self.cookies {
            command = command.arg("--cookies").arg(cookies);
        }
        command.arg(url)
    }
}

#[async_trait]
impl RemoteLister for YtDlpLister {
    async fn list(&self, url: &str) -> Result<Vec<RemoteEntry>> {
        let command = self.command(url);
        let output = self.runner.capture(&command, &self.shutdown).await?;
        if !output.outcome.success() {
            tracing::debug!(url, stderr = %output.stderr.trim(), "listing failed");
            return Err(ToolError::Failed {
                tool: command.tool_name(),
                exit_code: output.outcome.code(),
            }
            .into());
        }
        parse_flat_playlist(&output.stdout).map_err(|reason| {
            SourceError::Listing {
                url: url.to_string(),
                reason,
            }
            .into()
        })
    }
}

#[derive(Deserialize)]
struct FlatPlaylist {
    #[serde(default)]
    entries: Vec<Option<FlatEntry>>,
}

#[derive(Deserialize)]
struct FlatEntry {
    id: Option<String>,
    title: Option<String>,
    playlist_index: Option<u32>,
    ie_key: Option<String>,
}

/// Parse a flat-playlist JSON document.
///
/// Entries without an id are dropped. Positions come from `playlist_index`
/// when present, else from the entry's place in the document.
pub fn parse_flat_playlist(json: &str) -> std::result::Result<Vec<RemoteEntry>, String> {
    let doc: FlatPlaylist = serde_json::from_str(json).map_err(|e| e.to_string())?;
    Ok(doc
        .entries
        .into_iter()
        .enumerate()
        .filter_map(|(pos, entry)| {
            let entry = entry?;
            let id = entry.id.filter(|id| !id.is_empty())?;
            Some(RemoteEntry {
                index: entry
                    .playlist_index
                    .unwrap_or_else(|| u32::try_from(pos + 1).unwrap_or(u32::MAX)),
                id,
                title: entry.title.unwrap_or_else(|| "Video".to_string()),
                extractor: entry.ie_key.map(|k| k.to_lowercase()),
            })
        })
        .collect())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::flat_playlist_json;

    #[test]
    fn parses_entries_with_positions() {
        let json = flat_playlist_json(&[("a1", "First"), ("b2", "Second")]);
        let entries = parse_flat_playlist(&json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].id, "b2");
        assert_eq!(entries[0].archive_line(), "youtube a1");
    }

    #[test]
    fn missing_fields_fall_back() {
        let json = r#"{"entries": [null, {"id": ""}, {"id": "x"}, {"title": "no id"}]}"#;
        let entries = parse_flat_playlist(json).unwrap();
        assert_eq!(
            entries,
            vec![RemoteEntry {
                index: 3,
                id: "x".into(),
                title: "Video".into(),
                extractor: None,
            }]
        );
        assert_eq!(entries[0].archive_line(), "x");
    }

    #[test]
    fn single_video_document_has_no_entries() {
        assert!(
            parse_flat_playlist(r#"{"id": "v", "title": "Single"}"#)
                .unwrap()
                .is_empty()
        );
        assert!(parse_flat_playlist("not json").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lister_runs_downloader_and_reports_failures() {
        use crate::test_support::write_script;

        let dir = tempfile::TempDir::new().unwrap();
        let json = flat_playlist_json(&[("a1", "First")]);
        std::fs::write(dir.path().join("list.json"), &json).unwrap();
        let ok = write_script(
            dir.path(),
            "yt-dlp",
            &format!("cat '{}'", dir.path().join("list.json").display()),
        );
        let lister = YtDlpLister::new(ok, None, ProcessRunner::default(), CancellationToken::new());
        let entries = lister.list("https://example.com/playlist?list=PL1").await.unwrap();
        assert_eq!(entries[0].id, "a1");

        let bad = write_script(dir.path(), "broken", "echo nope >&2; exit 2");
        let lister = YtDlpLister::new(bad, None, ProcessRunner::default(), CancellationToken::new());
        let err = lister.list("https://example.com").await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Tool(ToolError::Failed {
                exit_code: Some(2),
                ..
            })
        ));
    }
}
