//! Episode metadata and NFO stages for shows

use super::{StageContext, with_suffix};
use crate::db::Database;
use crate::error::{JobError, Result};
use crate::job::JobUpdate;
use crate::metadata::{EpisodeMatch, EpisodeResolver, SIDECAR_SUFFIX, VideoInfo, find_sidecars, nfo};
use crate::types::Stage;
use crate::utils::{VIDEO_EXTENSIONS, clean_filename, compile_regex, file_name};
use regex::NoExpand;
use std::path::Path;
use tracing::debug;

/// How downloaded items get their episode numbers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Numbering {
    /// Shift remote positions so that the first item becomes this episode
    StartAt(u32),
    /// Resolve every item through an [`EpisodeResolver`]
    Auto,
}

impl Numbering {
    /// An integer or `auto` (any case)
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("auto") {
            return Some(Self::Auto);
        }
        value.parse().ok().map(Self::StartAt)
    }
}

/// Replace the `S<season>E<n>` tag of a file stem with a new season and episode.
///
/// ```
/// use tubarr::pipeline::renumber;
/// assert_eq!(renumber("Pilot S01E05", "01", "01", 3), "Pilot S01E03");
/// ```
pub fn renumber(stem: &str, season: &str, new_season: &str, episode: u32) -> String {
    let pattern = compile_regex(&format!(r"\s?S{}E\d+", regex::escape(season)));
    let tag = format!(" S{new_season}E{episode:02}");
    pattern
        .replace_all(stem, NoExpand(&tag))
        .trim_start()
        .to_string()
}

/// Matches for `items` numbered from `start`, relative to the lowest remote position.
///
/// `None` when an episode number does not fit in `u32`.
fn offset_matches(items: &[VideoInfo], season: u32, start: u32) -> Option<Vec<EpisodeMatch>> {
    let first = items
        .iter()
        .filter_map(|item| item.playlist_index)
        .min()
        .unwrap_or(1);
    let offset = i64::from(start) - i64::from(first);

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let index = item
                .playlist_index
                .map_or(i64::from(first) + i as i64, i64::from);
            Some(EpisodeMatch {
                season,
                episode: u32::try_from((index + offset).max(0)).ok()?,
                air_date: item.air_date(),
                base: item.base.clone(),
                title: item.title.clone(),
                description: item.summary().to_string(),
            })
        })
        .collect()
}

/// Last episode of a batch of `total` items numbered from `start`
fn last_offset_episode(start: u32, total: usize) -> Option<u32> {
    let span = u32::try_from(total.saturating_sub(1)).ok()?;
    start.checked_add(span)
}

pub(crate) async fn run_metadata_stage(
    ctx: &StageContext<'_>,
    db: &Database,
    folder: &Path,
    show_name: &str,
    season_num: &str,
    numbering: Numbering,
    resolver: Option<&dyn EpisodeResolver>,
) -> Result<()> {
    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::ProcessingMetadata)
            .progress(0.0)
            .stage_progress(0.0)
            .detailed("Processing metadata from videos")
            .message("Processing metadata and creating NFO files"),
    );

    let sidecars = find_sidecars(folder);
    if sidecars.is_empty() {
        ctx.job.warn("Warning: No JSON metadata files found");
        ctx.job
            .update(JobUpdate::new().detailed("No metadata files found"));
        return Ok(());
    }

    let mut items = Vec::with_capacity(sidecars.len());
    for sidecar in &sidecars {
        items.push(VideoInfo::load(sidecar).await?);
    }
    items.sort_by_key(|item| (item.playlist_index.is_none(), item.playlist_index));

    let season: u32 = season_num.trim().parse().unwrap_or(0);
    let matches = match (numbering, resolver) {
        (Numbering::StartAt(start), _) => {
            match offset_matches(&items, season, start)
                .filter(|_| last_offset_episode(start, items.len()).is_some())
            {
                Some(matches) => matches,
                None => {
                    ctx.job.fail(
                        "Invalid episode start",
                        format!(
                            "Invalid episode start: {start} is too large for {} videos",
                            items.len()
                        ),
                    );
                    return Err(JobError::InvalidEpisodeStart {
                        value: start.to_string(),
                    }
                    .into());
                }
            }
        }
        (Numbering::Auto, Some(resolver)) => match resolver.resolve(show_name, &items).await {
            Ok(matches) => matches,
            Err(e) => {
                ctx.job.fail(
                    "Episode detection failed",
                    format!("Episode detection failed: {e}"),
                );
                return Err(e);
            }
        },
        (Numbering::Auto, None) => offset_matches(&items, season, 1).unwrap_or_default(),
    };

    let total = matches.len();
    ctx.job.update(
        JobUpdate::new()
            .total_files(u32::try_from(total).unwrap_or(u32::MAX))
            .detailed(format!("Processing metadata for {total} videos")),
    );

    for (i, item) in matches.iter().enumerate() {
        ctx.job.ensure_active()?;

        let season_tag = match numbering {
            Numbering::Auto => format!("{:02}", item.season),
            Numbering::StartAt(_) => season_num.to_string(),
        };
        let mut stem = renumber(&file_name(&item.base), season_num, &season_tag, item.episode);
        if ctx.config.media.clean_filenames {
            stem = clean_filename(&stem);
        }
        let dir = item.base.parent().unwrap_or(folder);

        ctx.job.update(
            JobUpdate::new()
                .file(stem.clone())
                .processed_files(u32::try_from(i + 1).unwrap_or(u32::MAX))
                .detailed(format!("Processing metadata: {stem}"))
                .message(format!("Processing metadata for {}", item.title)),
        );

        for ext in VIDEO_EXTENSIONS {
            let original = with_suffix(&item.base, &format!(".{ext}"));
            if !original.exists() {
                continue;
            }
            let renamed = dir.join(format!("{stem}.{ext}"));
            if renamed != original {
                tokio::fs::rename(&original, &renamed).await?;
                ctx.job.message(format!("Renamed file to {stem}.{ext}"));
            }
            break;
        }

        let episode = format!("{:02}", item.episode);
        let document = nfo::episode(&nfo::EpisodeNfo {
            title: &item.title,
            season: &season_tag,
            episode: &episode,
            plot: &item.description,
            aired: item.air_date.as_deref().unwrap_or_default(),
            show_title: show_name,
        });
        tokio::fs::write(dir.join(format!("{stem}.nfo")), document).await?;
        ctx.job
            .message(format!("Created NFO file for {}", item.title));

        tokio::fs::remove_file(with_suffix(&item.base, SIDECAR_SUFFIX)).await?;
        debug!(job_id = %ctx.job.id(), episode = item.episode, file = %stem, "episode processed");

        let percent = (i + 1) as f64 / total as f64 * 100.0;
        ctx.job.update(JobUpdate::new().stage_progress(percent));
    }

    let last = match numbering {
        Numbering::StartAt(start) => last_offset_episode(start, total),
        Numbering::Auto => matches
            .iter()
            .filter(|m| m.season == season)
            .map(|m| m.episode)
            .max(),
    };
    if let Some(last) = last {
        db.set_last_episode(show_name, season_num, last).await?;
    }

    ctx.job.update(
        JobUpdate::new()
            .stage_progress(100.0)
            .detailed("Metadata processing completed")
            .message(format!("Processed metadata for {total} videos")),
    );
    Ok(())
}

pub(crate) async fn run_nfo_stage(
    ctx: &StageContext<'_>,
    folder: &Path,
    show_name: &str,
    season_num: &str,
) -> Result<()> {
    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::CreatingNfo)
            .stage_progress(0.0)
            .detailed("Creating NFO files")
            .message("Creating season and show NFO files"),
    );

    tokio::fs::write(folder.join("season.nfo"), nfo::season(season_num, show_name)).await?;
    let show_folder = folder.parent().unwrap_or(folder);
    tokio::fs::write(show_folder.join("tvshow.nfo"), nfo::tvshow(show_name)).await?;

    ctx.job.update(
        JobUpdate::new()
            .stage_progress(100.0)
            .detailed("NFO files created")
            .message("Created NFO files"),
    );
    Ok(())
}
