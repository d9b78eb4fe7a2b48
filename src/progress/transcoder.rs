//! ffmpeg / ffprobe output dialect

use super::{LineParser, ProgressEvent};
use crate::utils::compile_regex;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static RE_TIME: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"time=(\d+):(\d+):(\d+(?:\.\d+)?)"));

/// ffmpeg status lines, e.g.
/// `frame= 240 fps= 60 q=28.0 size= 512kB time=00:00:10.01 bitrate= 419.0kbits/s`
#[derive(Clone, Copy, Debug, Default)]
pub struct TranscoderDialect;

impl LineParser for TranscoderDialect {
    fn parse(&self, line: &str) -> Option<ProgressEvent> {
        if !line.contains("time=") {
            return None;
        }
        parse_timestamp(line).map(ProgressEvent::Elapsed)
    }
}

/// Extract the `time=HH:MM:SS.ss` token of a status line
pub fn parse_timestamp(line: &str) -> Option<Duration> {
    let caps = RE_TIME.captures(line)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Duration::try_from_secs_f64(hours * 3600.0 + minutes * 60.0 + seconds).ok()
}

/// Output of `ffprobe -show_entries format=duration -of default=noprint_wrappers=1:nokey=1`
pub fn parse_duration_probe(stdout: &str) -> Option<Duration> {
    let secs: f64 = stdout.lines().next()?.trim().parse().ok()?;
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Output of `ffprobe -select_streams v:0 -show_entries stream=codec_name -of json`
pub fn parse_codec_probe(stdout: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(stdout).ok()?;
    value
        .get("streams")?
        .as_array()?
        .first()?
        .get("codec_name")?
        .as_str()
        .map(|s| s.to_lowercase())
}

/// Per-file and aggregate progress of a batch transcode.
///
/// `index` is the 0-based position of the file in the batch. Returns
/// `(file_percent, overall)`; the file figure is capped at 100 and the
/// aggregate at 99.
pub fn transcode_progress(
    elapsed: Duration,
    duration: Duration,
    index: usize,
    total: usize,
) -> (u8, f64) {
    if duration.is_zero() || total == 0 {
        return (0, 0.0);
    }
    let ratio = elapsed.as_secs_f64() / duration.as_secs_f64();
    let file_percent = (ratio * 100.0).clamp(0.0, 100.0) as u8;
    let total = total as f64;
    let overall = (index as f64 / total * 100.0 + f64::from(file_percent) / total).min(99.0);
    (file_percent, overall)
}
