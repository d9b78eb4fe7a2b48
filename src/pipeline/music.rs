//! Music track preparation: MP3 conversion, naming and ID3 tags

use super::{StageContext, remove_quietly};
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::job::JobUpdate;
use crate::process::ToolCommand;
use crate::retry::with_retry;
use crate::types::{Stage, TrackMetadata};
use crate::utils::{file_name, sanitize_name};
use std::path::{Path, PathBuf};

/// Album-level values used when a track leaves them empty
#[derive(Clone, Copy, Debug)]
pub(crate) struct AlbumDefaults<'a> {
    pub(crate) album: &'a str,
    pub(crate) artist: &'a str,
}

/// `NN - Title.mp3`
pub(crate) fn track_file_name(track: &TrackMetadata) -> String {
    format!("{:02} - {}.mp3", track.track_number, sanitize_name(&track.title))
}

fn mp3_command(ffmpeg: &Path, input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new(ffmpeg)
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(input)
        .args(["-vn", "-codec:a", "libmp3lame", "-q:a", "2"])
        .arg(output)
}

fn pair(number: u32, total: Option<u32>) -> String {
    match total {
        Some(total) if total > 0 => format!("{number}/{total}"),
        _ => number.to_string(),
    }
}

/// `ffmpeg` invocation writing ID3v2.3 tags (and an optional cover) into `output`
pub(crate) fn tag_command(
    ffmpeg: &Path,
    input: &Path,
    cover: Option<&Path>,
    track: &TrackMetadata,
    album: &AlbumDefaults<'_>,
    output: &Path,
) -> ToolCommand {
    let mut command = ToolCommand::new(ffmpeg)
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(input);
    command = match cover {
        Some(cover) => command
            .arg("-i")
            .arg(cover)
            .args(["-map", "0:a", "-map", "1:v", "-c", "copy"])
            .args(["-metadata:s:v", "title=Album cover"])
            .args(["-metadata:s:v", "comment=Cover (front)"]),
        None => command.args(["-map", "0:a", "-c", "copy"]),
    };

    let artist = non_empty(&track.artist).unwrap_or(album.artist);
    let album_name = non_empty(&track.album).unwrap_or(album.album);
    let album_artist = track
        .album_artist
        .as_deref()
        .and_then(non_empty)
        .unwrap_or(artist);

    let mut tags = vec![
        ("title", track.title.clone()),
        ("artist", artist.to_string()),
        ("album", album_name.to_string()),
        ("album_artist", album_artist.to_string()),
        ("track", pair(track.track_number, track.total_tracks)),
    ];
    if let Some(disc) = track.disc_number {
        tags.push(("disc", pair(disc, track.total_discs)));
    }
    if let Some(date) = track.release_date.as_deref().and_then(non_empty) {
        tags.push(("date", date.to_string()));
    }
    if !track.genres.is_empty() {
        tags.push(("genre", track.genres.join(", ")));
    }

    command = command.args(["-id3v2_version", "3"]);
    for (key, value) in tags {
        command = command.arg("-metadata").arg(format!("{key}={value}"));
    }
    command.arg(output)
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

pub(crate) async fn run_track_stage(
    ctx: &StageContext<'_>,
    http: &reqwest::Client,
    retry: &RetryConfig,
    folder: &Path,
    album: &AlbumDefaults<'_>,
    tracks: &[TrackMetadata],
    files: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let total = tracks.len().min(files.len());
    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::ProcessingMetadata)
            .stage_progress(0.0)
            .total_files(u32::try_from(total).unwrap_or(u32::MAX))
            .processed_files(0)
            .detailed("Preparing music tracks")
            .message(format!(
                "Preparing {total} tracks ({} downloaded files, {} track entries)",
                files.len(),
                tracks.len()
            )),
    );

    let mut prepared = Vec::with_capacity(total);
    for (i, (track, file)) in tracks.iter().zip(files).enumerate() {
        ctx.job.ensure_active()?;

        let mp3 = match ensure_mp3(ctx, file).await {
            Ok(mp3) => mp3,
            Err(e) if ctx.job.is_cancelled() => return Err(e),
            Err(e) => {
                ctx.job
                    .warn(format!("Failed to prepare track {}: {e}", track.title));
                break;
            }
        };

        let name = track_file_name(track);
        let dest = folder.join(&name);
        if dest != mp3 {
            tokio::fs::rename(&mp3, &dest).await?;
        }

        match tag_track(ctx, http, retry, folder, &dest, track, album).await {
            Ok(()) => {}
            Err(e) if ctx.job.is_cancelled() => return Err(e),
            Err(e) => ctx.job.warn(format!("Failed to tag {name}: {e}")),
        }

        prepared.push(dest);
        ctx.job.update(
            JobUpdate::new()
                .file(name.clone())
                .processed_files(u32::try_from(i + 1).unwrap_or(u32::MAX))
                .pop_remaining()
                .stage_progress((i + 1) as f64 / total as f64 * 100.0)
                .detailed(format!("Prepared {}/{total} tracks", i + 1))
                .message(format!("Prepared track {name}")),
        );
    }

    ctx.job.update(
        JobUpdate::new()
            .detailed("Music tracks prepared")
            .message(format!("Prepared {} of {total} tracks", prepared.len())),
    );
    Ok(prepared)
}

/// Convert `file` to MP3 unless it already is one, removing the source afterwards
async fn ensure_mp3(ctx: &StageContext<'_>, file: &Path) -> Result<PathBuf> {
    let is_mp3 = file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
    if is_mp3 {
        return Ok(file.to_path_buf());
    }

    let target = file.with_extension("mp3");
    ctx.job
        .message(format!("Converting {} to MP3", file_name(file)));
    ctx.run_tool(&mp3_command(&ctx.tools.ffmpeg, file, &target))
        .await?;
    remove_quietly(file).await;
    Ok(target)
}

async fn fetch_cover(
    http: &reqwest::Client,
    retry: &RetryConfig,
    url: &str,
    dest: &Path,
) -> Result<()> {
    let bytes = with_retry(retry, "cover art", || async {
        let response = http.get(url).send().await?.error_for_status()?;
        Ok::<_, Error>(response.bytes().await?)
    })
    .await?;
    tokio::fs::write(dest, &bytes).await?;
    Ok(())
}

async fn tag_track(
    ctx: &StageContext<'_>,
    http: &reqwest::Client,
    retry: &RetryConfig,
    folder: &Path,
    mp3: &Path,
    track: &TrackMetadata,
    album: &AlbumDefaults<'_>,
) -> Result<()> {
    let mut cover = None;
    if let Some(url) = track.cover_url.as_deref().and_then(non_empty) {
        let dest = ctx
            .scratch
            .join(format!("cover_{:02}.jpg", track.track_number));
        match fetch_cover(http, retry, url, &dest).await {
            Ok(()) => cover = Some(dest),
            Err(e) => ctx.job.warn(format!("Failed to fetch cover art: {e}")),
        }
    }

    let tagged = folder.join(format!(".tagging-{:02}.mp3", track.track_number));
    let command = tag_command(&ctx.tools.ffmpeg, mp3, cover.as_deref(), track, album, &tagged);
    if let Err(e) = ctx.run_tool(&command).await {
        remove_quietly(&tagged).await;
        return Err(e);
    }
    tokio::fs::rename(&tagged, mp3).await?;
    Ok(())
}
