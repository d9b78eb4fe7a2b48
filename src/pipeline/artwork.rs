//! Poster and thumbnail generation

use super::{StageContext, with_suffix};
use crate::error::{Result, ToolError};
use crate::job::JobUpdate;
use crate::process::ToolCommand;
use crate::types::Stage;
use crate::utils::{VIDEO_EXTENSIONS, file_name, list_files_with_extensions, season_episode_files};
use std::path::{Path, PathBuf};

/// Episodes sampled for the season collage
const SEASON_FRAMES: usize = 6;

fn frame_command(ffmpeg: &Path, video: &Path, filter: &str, frames: u32, output: &Path) -> ToolCommand {
    ToolCommand::new(ffmpeg)
        .args(["-y", "-loglevel", "error", "-i"])
        .arg(video)
        .arg("-vf")
        .arg(filter)
        .arg("-frames:v")
        .arg(frames.to_string())
        .arg(output)
}

fn thumbnail_command(ffmpeg: &Path, video: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new(ffmpeg)
        .args(["-y", "-loglevel", "error", "-ss", "00:01:30", "-i"])
        .arg(video)
        .args(["-vframes", "1", "-q:v", "2"])
        .arg(output)
}

pub(crate) async fn run_tv_artwork_stage(
    ctx: &StageContext<'_>,
    folder: &Path,
    show_name: &str,
    season_num: &str,
) -> Result<()> {
    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::GeneratingArtwork)
            .stage_progress(0.0)
            .detailed("Generating artwork")
            .message("Generating thumbnails and artwork"),
    );

    let episodes = season_episode_files(folder, season_num, &["mp4"]);
    if episodes.is_empty() {
        ctx.job.warn("No episodes found for artwork generation");
        return Ok(());
    }

    match season_artwork(ctx, folder, show_name, season_num, &episodes).await {
        Ok(()) => {}
        Err(e) if ctx.job.is_cancelled() => return Err(e),
        Err(e) => ctx.job.warn(format!("Error generating artwork: {e}")),
    }

    let total = episodes.len();
    for (i, episode) in episodes.iter().enumerate() {
        ctx.job.ensure_active()?;
        let thumb = with_suffix(&episode.with_extension(""), "-thumb.jpg");
        match ctx
            .run_tool(&thumbnail_command(&ctx.tools.ffmpeg, episode, &thumb))
            .await
        {
            Ok(()) => {}
            Err(e) if ctx.job.is_cancelled() => return Err(e),
            Err(e) => ctx.job.warn(format!(
                "Failed to generate thumbnail for {}: {e}",
                file_name(episode)
            )),
        }
        let percent = 50.0 + (i + 1) as f64 / total as f64 * 50.0;
        ctx.job.update(JobUpdate::new().stage_progress(percent));
    }

    ctx.job.update(
        JobUpdate::new()
            .stage_progress(100.0)
            .detailed("Artwork generated")
            .message("Artwork generation completed"),
    );
    Ok(())
}

/// Show poster, season collage and season banner
async fn season_artwork(
    ctx: &StageContext<'_>,
    folder: &Path,
    show_name: &str,
    season_num: &str,
    episodes: &[PathBuf],
) -> Result<()> {
    let tools = ctx.tools;
    let show_folder = folder.parent().unwrap_or(folder);
    let frames_dir = ctx.scratch.join("season_frames");
    tokio::fs::create_dir_all(&frames_dir).await?;

    let poster_frame = frames_dir.join("show_poster.jpg");
    ctx.run_tool(&frame_command(
        &tools.ffmpeg,
        &episodes[0],
        "select=eq(pict_type\\,I),scale=1000:-1",
        1,
        &poster_frame,
    ))
    .await?;
    ctx.run_tool(
        &ToolCommand::new(&tools.convert)
            .arg(&poster_frame)
            .args([
                "-resize",
                "1000x1500^",
                "-gravity",
                "center",
                "-extent",
                "1000x1500",
                "-gravity",
                "north",
                "-fill",
                "white",
                "-pointsize",
                "72",
                "-annotate",
                "+0+50",
            ])
            .arg(show_name)
            .arg(show_folder.join("poster.jpg")),
    )
    .await?;
    ctx.job.update(
        JobUpdate::new()
            .stage_progress(20.0)
            .message("Created show poster"),
    );

    let mut frames = Vec::with_capacity(SEASON_FRAMES);
    for (i, episode) in episodes.iter().take(SEASON_FRAMES).enumerate() {
        let frame = frames_dir.join(format!("frame_{i:03}.jpg"));
        ctx.run_tool(&frame_command(&tools.ffmpeg, episode, "thumbnail", 1, &frame))
            .await?;
        frames.push(frame);
    }

    let season_poster = folder.join(format!("season{season_num}-poster.jpg"));
    let montage = ToolCommand::new(&tools.montage)
        .args(&frames)
        .args([
            "-geometry",
            "400x225+5+5",
            "-background",
            "black",
            "-tile",
            "3x2",
            "jpg:-",
        ]);
    let annotate = ToolCommand::new(&tools.convert)
        .args([
            "-",
            "-resize",
            "1000x1500",
            "-gravity",
            "south",
            "-background",
            "black",
            "-splice",
            "0x100",
            "-fill",
            "white",
            "-pointsize",
            "60",
            "-annotate",
            "+0+20",
        ])
        .arg(format!("Season {season_num}"))
        .arg(&season_poster);
    let outcome = ctx
        .runner
        .pipe(&montage, &annotate, ctx.job.cancel_token())
        .await?;
    ctx.check_outcome(&montage, outcome)?;

    ctx.run_tool(
        &ToolCommand::new(&tools.convert)
            .arg(&season_poster)
            .args(["-resize", "1000x562!"])
            .arg(folder.join(format!("season{season_num}.jpg"))),
    )
    .await?;
    ctx.job.update(
        JobUpdate::new()
            .stage_progress(50.0)
            .message("Created season artwork"),
    );
    Ok(())
}

pub(crate) async fn run_movie_artwork_stage(ctx: &StageContext<'_>, folder: &Path) -> Result<()> {
    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::GeneratingArtwork)
            .stage_progress(0.0)
            .detailed("Generating movie artwork")
            .message("Generating movie artwork"),
    );

    let poster = folder.join("poster.jpg");
    if poster.exists() {
        ctx.job.message("Poster already exists, skipping artwork");
        return Ok(());
    }
    let videos = list_files_with_extensions(folder, VIDEO_EXTENSIONS);
    let Some(movie) = videos.first() else {
        ctx.job.warn("No movie file found for artwork generation");
        return Ok(());
    };

    match movie_poster(ctx, movie, &poster).await {
        Ok(()) => ctx.job.update(
            JobUpdate::new()
                .stage_progress(100.0)
                .detailed("Artwork generated")
                .message("Created movie poster"),
        ),
        Err(e) if ctx.job.is_cancelled() => return Err(e),
        Err(e) => ctx
            .job
            .warn(format!("Error generating movie artwork: {e}")),
    }
    Ok(())
}

/// Three frames stacked vertically
async fn movie_poster(ctx: &StageContext<'_>, movie: &Path, poster: &Path) -> Result<()> {
    let frames_dir = ctx.scratch.join("movie_frames");
    tokio::fs::create_dir_all(&frames_dir).await?;

    ctx.run_tool(&frame_command(
        &ctx.tools.ffmpeg,
        movie,
        "select=not(mod(n\\,1000)),scale=1000:-1",
        3,
        &frames_dir.join("frame_%03d.jpg"),
    ))
    .await?;

    let frames = list_files_with_extensions(&frames_dir, &["jpg"]);
    if frames.is_empty() {
        return Err(ToolError::BadOutput {
            tool: "ffmpeg".to_string(),
            reason: "no frames extracted".to_string(),
        }
        .into());
    }
    ctx.run_tool(
        &ToolCommand::new(&ctx.tools.convert)
            .args(&frames)
            .arg("-append")
            .arg(poster),
    )
    .await
}
