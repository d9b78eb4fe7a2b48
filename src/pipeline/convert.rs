//! H.265 conversion stage

use super::{PercentThrottle, StageContext, remove_quietly, with_suffix};
use crate::config::Config;
use crate::error::Result;
use crate::job::JobUpdate;
use crate::process::{ProcessObserver, ToolCommand};
use crate::progress::{
    LineParser, ProgressEvent, TranscoderDialect, parse_codec_probe, parse_duration_probe,
    transcode_progress,
};
use crate::types::Stage;
use crate::utils::file_name;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, trace};

#[derive(Debug, PartialEq, Eq)]
enum FileOutcome {
    Converted,
    AlreadyHevc,
}

/// `ffmpeg` invocation transcoding `input` into `output`
pub(crate) fn transcode_command(config: &Config, ffmpeg: &Path, input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-c:v", "libx265", "-preset", "medium", "-crf"])
        .arg(config.media.crf.to_string())
        .args(["-tag:v", "hvc1", "-c:a", "aac", "-b:a", "128k"])
        .arg(output)
}

fn codec_probe(ffprobe: &Path, input: &Path) -> ToolCommand {
    ToolCommand::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=codec_name",
            "-of",
            "json",
        ])
        .arg(input)
}

fn duration_probe(ffprobe: &Path, input: &Path) -> ToolCommand {
    ToolCommand::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
}

pub(crate) async fn run_convert_stage(ctx: &StageContext<'_>, files: Vec<PathBuf>) -> Result<()> {
    if !ctx.config.media.use_h265 {
        ctx.job.update(
            JobUpdate::new()
                .detailed("H.265 conversion disabled")
                .message("H.265 conversion disabled, skipping"),
        );
        return Ok(());
    }

    ctx.job.update(
        JobUpdate::new()
            .stage(Stage::Converting)
            .progress(0.0)
            .stage_progress(0.0)
            .detailed("Preparing video conversion to H.265")
            .message("Starting video conversion to H.265"),
    );
    if files.is_empty() {
        ctx.job.update(
            JobUpdate::new()
                .detailed("No videos to convert")
                .message("No video files found for conversion"),
        );
        return Ok(());
    }

    let total = files.len();
    ctx.job.update(
        JobUpdate::new()
            .total_files(u32::try_from(total).unwrap_or(u32::MAX))
            .processed_files(0)
            .detailed(format!("Converting {total} video files to H.265")),
    );

    let mut failures = 0;
    for (index, video) in files.iter().enumerate() {
        ctx.job.ensure_active()?;
        let name = file_name(video);
        match convert_file(ctx, video, &name, index, total).await {
            Ok(FileOutcome::Converted) => {
                ctx.job.update(
                    JobUpdate::new()
                        .detailed(format!("Converted {}/{total} files", index + 1))
                        .message(format!("Successfully converted {name} to H.265")),
                );
            }
            Ok(FileOutcome::AlreadyHevc) => {
                ctx.job
                    .message(format!("Skipping already H.265 encoded file: {name}"));
            }
            Err(e) if ctx.job.is_cancelled() => return Err(e),
            Err(e) => {
                failures += 1;
                ctx.job.warn(format!("Failed to convert {name}: {e}"));
                ctx.job
                    .update(JobUpdate::new().detailed(format!("Error converting {name}")));
            }
        }
    }

    let summary = if failures > 0 {
        format!("Video conversion completed with {failures} failed files")
    } else {
        "Video conversion completed".to_string()
    };
    info!(job_id = %ctx.job.id(), total, failures, "conversion stage finished");
    ctx.job.update(
        JobUpdate::new()
            .progress(100.0)
            .stage_progress(100.0)
            .detailed("Video conversion completed")
            .message(summary),
    );
    Ok(())
}

async fn convert_file(
    ctx: &StageContext<'_>,
    video: &Path,
    name: &str,
    index: usize,
    total: usize,
) -> Result<FileOutcome> {
    let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
    ctx.job
        .update(JobUpdate::new().file(name).processed_files(position));

    let is_mp4 = video
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
    if is_mp4 {
        let codec = ctx
            .probe(&codec_probe(&ctx.tools.ffprobe, video))
            .await?
            .and_then(|stdout| parse_codec_probe(&stdout));
        if matches!(codec.as_deref(), Some("hevc" | "h265")) {
            return Ok(FileOutcome::AlreadyHevc);
        }
    }

    let duration = ctx
        .probe(&duration_probe(&ctx.tools.ffprobe, video))
        .await?
        .and_then(|stdout| parse_duration_probe(&stdout));

    let base = video.with_extension("");
    let temp = with_suffix(&base, ".temp.mp4");
    let target = with_suffix(&base, ".mp4");
    let command = transcode_command(ctx.config, &ctx.tools.ffmpeg, video, &temp);

    ctx.job.update(
        JobUpdate::new()
            .detailed(format!("Converting {name} to H.265 (file {position}/{total})"))
            .message(format!("Converting {name} to H.265 ({position}/{total})")),
    );

    let job = ctx.job;
    let observer: &dyn ProcessObserver = job;
    let mut throttle = PercentThrottle::new(20.0);
    let streamed = ctx
        .runner
        .stream(&command, job.cancel_token(), Some(observer), |line| {
            trace!(job_id = %job.id(), line, "transcoder");
            let Some(ProgressEvent::Elapsed(elapsed)) = TranscoderDialect.parse(line) else {
                return;
            };
            let Some(duration) = duration.filter(|d| *d > Duration::ZERO) else {
                return;
            };
            let (file_percent, overall) = transcode_progress(elapsed, duration, index, total);
            let update = JobUpdate::new()
                .progress(overall)
                .stage_progress(overall)
                .detailed(format!(
                    "Converting {name}: {file_percent}% (file {position}/{total})"
                ));
            let update = if file_percent > 0 && throttle.should_log(position, f64::from(file_percent)) {
                update.message(format!("Converting {name}: {file_percent}% complete"))
            } else {
                update
            };
            job.update(update);
        })
        .await;

    let outcome = match streamed {
        Ok(outcome) => outcome,
        Err(e) => {
            remove_quietly(&temp).await;
            return Err(e);
        }
    };
    if let Err(e) = ctx.check_outcome(&command, outcome) {
        remove_quietly(&temp).await;
        return Err(e);
    }

    tokio::fs::rename(&temp, &target).await?;
    if video != target {
        tokio::fs::remove_file(video).await?;
    }
    Ok(FileOutcome::Converted)
}
