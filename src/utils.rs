//! Utility functions for naming, path layout and directory scans

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RE_UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| compile_regex(r#"[\\/:"*?<>|]"#));
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\s+"));
static RE_DASH: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\s*-\s*"));
static RE_EPISODE_TAG: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"S\d+E\d+"));

/// Video containers produced by the downloader
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];

/// Audio containers produced by the downloader in audio mode
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "opus", "webm", "ogg", "flac", "wav", "aac"];

/// Compile a regex whose pattern is a literal or built from `regex::escape`d input.
#[allow(clippy::expect_used)]
pub(crate) fn compile_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("pattern is a literal or escaped")
}

/// Make a show, movie, artist or album name safe as a single path component.
///
/// Underscores become spaces, reserved characters are removed and runs of
/// whitespace collapse to one space.
///
/// ```
/// use tubarr::utils::sanitize_name;
/// assert_eq!(sanitize_name("  My_Show: Part 1?"), "My Show Part 1");
/// ```
pub fn sanitize_name(name: &str) -> String {
    let spaced = name.trim().replace('_', " ");
    let stripped = RE_UNSAFE_CHARS.replace_all(&spaced, "");
    RE_WHITESPACE
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Tidy a downloaded episode filename around its `SxxEyy` tag.
///
/// The part before the tag gets underscores replaced, dashes spaced and
/// whitespace collapsed; the tag is always separated by a single space.
pub fn clean_filename(name: &str) -> String {
    let Some(tag) = RE_EPISODE_TAG.find(name) else {
        return name.replace('_', " ");
    };

    let prefix = name[..tag.start()].replace('_', " ");
    let prefix = RE_DASH.replace_all(&prefix, " - ");
    let prefix = RE_WHITESPACE.replace_all(&prefix, " ");
    let prefix = prefix.trim();
    let suffix = &name[tag.end()..];

    if prefix.is_empty() {
        if suffix.is_empty() || suffix.starts_with(' ') {
            return format!("{}{}", tag.as_str(), suffix);
        }
        return format!("{} {}", tag.as_str(), suffix);
    }
    format!("{} {}{}", prefix, tag.as_str(), suffix)
}

/// `<output_dir>/<show>/Season <season>`
pub fn season_folder(output_dir: &Path, show_name: &str, season: &str) -> PathBuf {
    output_dir
        .join(sanitize_name(show_name))
        .join(format!("Season {}", season))
}

/// Regex capturing the episode number of `S<season>E<n>` names
pub fn episode_number_regex(season: &str) -> Regex {
    compile_regex(&format!(r"S{}E(\d+)", regex::escape(season)))
}

/// Highest episode number among `.mp4` files of a season folder, 0 when none.
pub fn existing_max_index(folder: &Path, season: &str) -> u32 {
    let pattern = episode_number_regex(season);
    let Ok(entries) = std::fs::read_dir(folder) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".mp4"))
        .filter_map(|name| {
            pattern
                .captures(&name)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0)
}

/// Files directly inside `dir` whose extension is one of `extensions`, sorted by name.
pub fn list_files_with_extensions(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    files
}

/// Episode files of a season (`*S<season>E*.<ext>`), sorted by name.
pub fn season_episode_files(folder: &Path, season: &str, extensions: &[&str]) -> Vec<PathBuf> {
    let marker = format!("S{}E", season);
    list_files_with_extensions(folder, extensions)
        .into_iter()
        .filter(|path| file_name(path).contains(&marker))
        .collect()
}

/// Lossy file name of a path, empty when absent
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether a URL points at a playlist rather than a single video
pub fn is_playlist_url(url: &str) -> bool {
    url.contains("list=") || url.contains("/playlist")
}

/// Current local time formatted for job messages
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Escape text for inclusion in XML element content
pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
