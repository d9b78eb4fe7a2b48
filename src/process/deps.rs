//! Pre-flight check for required external binaries

use crate::config::Config;
use crate::error::{JobError, Result};
use std::path::{Path, PathBuf};

/// Binaries a job needs, resolved from configuration
#[derive(Clone, Debug)]
pub struct Toolchain {
    /// yt-dlp
    pub ytdlp: PathBuf,
    /// ffmpeg
    pub ffmpeg: PathBuf,
    /// ffprobe
    pub ffprobe: PathBuf,
    /// ImageMagick convert
    pub convert: PathBuf,
    /// ImageMagick montage
    pub montage: PathBuf,
}

impl Toolchain {
    /// Take tool paths from the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            ytdlp: config.downloader.ytdlp_path.clone(),
            ffmpeg: config.tools.ffmpeg_path.clone(),
            ffprobe: config.tools.ffprobe_path.clone(),
            convert: config.tools.convert_path.clone(),
            montage: config.tools.montage_path.clone(),
        }
    }

    /// Names of tools that cannot be executed, in a stable order
    pub fn missing(&self) -> Vec<String> {
        [
            &self.ffmpeg,
            &self.ffprobe,
            &self.convert,
            &self.montage,
            &self.ytdlp,
        ]
        .into_iter()
        .filter(|path| !is_available(path))
        .map(|path| path.display().to_string())
        .collect()
    }

    /// Fail with [`JobError::MissingDependencies`] when any tool is absent
    pub fn check(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(JobError::MissingDependencies { missing }.into())
        }
    }
}

/// A bare name is looked up on PATH; anything with a directory part must
/// exist and be executable.
pub fn is_available(path: &Path) -> bool {
    if path.components().count() > 1 || path.is_absolute() {
        return is_executable(path);
    }
    which::which(path).is_ok()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
