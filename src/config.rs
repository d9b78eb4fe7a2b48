//! Configuration types for tubarr
//!
//! Configuration is assembled once at startup: built-in defaults, then
//! environment variables, then the YAML file named by `CONFIG_FILE`. The result
//! is validated before any component is constructed.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};
use utoipa::ToSchema;

/// Default location of the YAML configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config/config.yml";

const REDACTED: &str = "********";

/// Media output settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MediaConfig {
    /// Root directory for shows and movies (default: "./media")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Root directory for music (default: `<output_dir>/Music`)
    #[serde(default)]
    pub music_output_dir: Option<PathBuf>,

    /// Maximum video height requested from the downloader (default: 1080)
    #[serde(default = "default_quality")]
    pub quality: u32,

    /// Transcode to H.265 after download
    #[serde(default = "default_true")]
    pub use_h265: bool,

    /// Constant rate factor for the H.265 encoder (default: 28)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Normalise episode filenames after renaming
    #[serde(default = "default_true")]
    pub clean_filenames: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            music_output_dir: None,
            quality: default_quality(),
            use_h265: true,
            crf: default_crf(),
            clean_filenames: true,
        }
    }
}

impl MediaConfig {
    /// Effective music root
    pub fn music_dir(&self) -> PathBuf {
        self.music_output_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("Music"))
    }
}

/// External downloader settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloaderConfig {
    /// Path or name of the yt-dlp binary
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// Netscape cookie file handed to the downloader when it exists
    #[serde(default)]
    pub cookies_path: Option<PathBuf>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            cookies_path: None,
        }
    }
}

/// Paths of the transcoder and image toolkit binaries
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ToolsConfig {
    /// ffmpeg binary (default: "ffmpeg" from PATH)
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// ffprobe binary (default: "ffprobe" from PATH)
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// ImageMagick convert binary (default: "convert" from PATH)
    #[serde(default = "default_convert_path")]
    pub convert_path: PathBuf,

    /// ImageMagick montage binary (default: "montage" from PATH)
    #[serde(default = "default_montage_path")]
    pub montage_path: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            convert_path: default_convert_path(),
            montage_path: default_montage_path(),
        }
    }
}

/// Scheduler and job table settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobsConfig {
    /// Completed/failed jobs kept in the job table (default: 10)
    #[serde(default = "default_completed_jobs_limit")]
    pub completed_jobs_limit: usize,

    /// Jobs allowed to run at once (default: 1)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Messages returned in a single-job view (default: 200)
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,

    /// Grace period between SIGTERM and SIGKILL on cancellation (default: 5s)
    #[serde(default = "default_cancel_grace", with = "duration_serde")]
    pub cancel_grace: Duration,

    /// Upper bound for short probe commands such as ffprobe (default: 120s)
    #[serde(default = "default_probe_timeout", with = "duration_serde")]
    pub probe_timeout: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            completed_jobs_limit: default_completed_jobs_limit(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            message_limit: default_message_limit(),
            cancel_grace: default_cancel_grace(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

/// REST API settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebConfig {
    /// Serve the REST API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind host (default: "0.0.0.0")
    #[serde(default = "default_web_host")]
    pub host: String,

    /// Bind port (default: 8000)
    #[serde(default = "default_web_port")]
    pub port: u16,

    /// Allow cross-origin requests from any origin
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Serve Swagger UI at /swagger-ui
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_web_host(),
            port: default_web_port(),
            cors_enabled: true,
            swagger_ui: true,
        }
    }
}

/// Periodic tracked-source polling
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCheckerConfig {
    /// Run the background poller
    #[serde(default)]
    pub enabled: bool,

    /// Minutes between polling cycles (default: 60)
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for UpdateCheckerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_interval_minutes(),
        }
    }
}

impl UpdateCheckerConfig {
    /// Polling interval, never shorter than one minute
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

/// Media library server integration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JellyfinConfig {
    /// Copy finished jobs into the library
    #[serde(default)]
    pub enabled: bool,

    /// Library root for shows (required when enabled)
    #[serde(default)]
    pub tv_path: Option<PathBuf>,

    /// Library root for movies
    #[serde(default)]
    pub movie_path: Option<PathBuf>,

    /// Library root for music
    #[serde(default)]
    pub music_path: Option<PathBuf>,

    /// Server host used for library refresh
    #[serde(default)]
    pub host: Option<String>,

    /// Server port (default: 8096)
    #[serde(default = "default_jellyfin_port")]
    pub port: u16,

    /// API key used for library refresh
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for JellyfinConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tv_path: None,
            movie_path: None,
            music_path: None,
            host: None,
            port: default_jellyfin_port(),
            api_key: None,
        }
    }
}

/// Retry configuration for transient HTTP failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Third-party metadata services
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MetadataConfig {
    /// TMDb API key; movie lookups are skipped without it
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    /// TVDB v4 API key used for air-date episode resolution
    #[serde(default)]
    pub tvdb_api_key: Option<String>,

    /// Optional TVDB subscriber PIN
    #[serde(default)]
    pub tvdb_pin: Option<String>,

    /// TMDb API base URL
    #[serde(default = "default_tmdb_base_url")]
    pub tmdb_base_url: String,

    /// TVDB API base URL
    #[serde(default = "default_tvdb_base_url")]
    pub tvdb_base_url: String,

    /// Per-request timeout for metadata and library calls (default: 10s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Retry policy for metadata requests
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tvdb_api_key: None,
            tvdb_pin: None,
            tmdb_base_url: default_tmdb_base_url(),
            tvdb_base_url: default_tvdb_base_url(),
            request_timeout: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// On-disk state locations
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Directory holding the database and ledgers (default: "./config")
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl PersistenceConfig {
    /// SQLite database holding tracked sources
    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("tubarr.db")
    }

    /// Directory of per-source ledger files
    pub fn archive_dir(&self) -> PathBuf {
        self.state_dir.join("archives")
    }
}

/// Main configuration for tubarr
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Output locations and encoding
    #[serde(default)]
    pub media: MediaConfig,

    /// External downloader
    #[serde(default)]
    pub downloader: DownloaderConfig,

    /// Transcoder and image toolkit binaries
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Scheduler limits
    #[serde(default)]
    pub jobs: JobsConfig,

    /// REST API
    #[serde(default)]
    pub web: WebConfig,

    /// Background source polling
    #[serde(default)]
    pub update_checker: UpdateCheckerConfig,

    /// Library server integration
    #[serde(default)]
    pub jellyfin: JellyfinConfig,

    /// Metadata services
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Database and ledger locations
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Load from the process environment and the YAML file named by
    /// `CONFIG_FILE`, then validate.
    pub fn load() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let path = lookup("CONFIG_FILE").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        let yaml = match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(Error::Config {
                    message: format!("failed to read {}: {}", path, e),
                    key: Some("CONFIG_FILE".to_string()),
                });
            }
        };
        Self::from_sources(lookup, yaml.as_deref())
    }

    /// Build from an environment lookup and optional YAML text.
    ///
    /// YAML values win over environment values, which win over defaults.
    pub fn from_sources<F>(env: F, yaml: Option<&str>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        config.apply_env(&env)?;

        if let Some(text) = yaml.filter(|t| !t.trim().is_empty()) {
            config = config.overlay_yaml(text)?;
        }

        config.finalize()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = env("OUTPUT_DIR") {
            self.media.output_dir = PathBuf::from(v);
        }
        if let Some(v) = env("MUSIC_OUTPUT_DIR") {
            self.media.music_output_dir = Some(PathBuf::from(v));
        }
        parse_env(env, "VIDEO_QUALITY", &mut self.media.quality)?;
        parse_env_bool(env, "USE_H265", &mut self.media.use_h265)?;
        parse_env(env, "CRF", &mut self.media.crf)?;
        parse_env_bool(env, "CLEAN_FILENAMES", &mut self.media.clean_filenames)?;

        if let Some(v) = env("YTDLP_PATH") {
            self.downloader.ytdlp_path = PathBuf::from(v);
        }
        if let Some(v) = env("COOKIES_PATH") {
            self.downloader.cookies_path = Some(PathBuf::from(v));
        }

        if let Some(v) = env("FFMPEG_PATH") {
            self.tools.ffmpeg_path = PathBuf::from(v);
        }
        if let Some(v) = env("FFPROBE_PATH") {
            self.tools.ffprobe_path = PathBuf::from(v);
        }
        if let Some(v) = env("CONVERT_PATH") {
            self.tools.convert_path = PathBuf::from(v);
        }
        if let Some(v) = env("MONTAGE_PATH") {
            self.tools.montage_path = PathBuf::from(v);
        }

        parse_env(
            env,
            "COMPLETED_JOBS_LIMIT",
            &mut self.jobs.completed_jobs_limit,
        )?;
        parse_env(env, "MAX_CONCURRENT_JOBS", &mut self.jobs.max_concurrent_jobs)?;

        parse_env_bool(env, "WEB_ENABLED", &mut self.web.enabled)?;
        if let Some(v) = env("WEB_HOST") {
            self.web.host = v;
        }
        parse_env(env, "WEB_PORT", &mut self.web.port)?;

        parse_env_bool(env, "UPDATE_CHECKER_ENABLED", &mut self.update_checker.enabled)?;
        parse_env(
            env,
            "UPDATE_CHECKER_INTERVAL",
            &mut self.update_checker.interval_minutes,
        )?;

        parse_env_bool(env, "JELLYFIN_ENABLED", &mut self.jellyfin.enabled)?;
        if let Some(v) = env("JELLYFIN_TV_PATH") {
            self.jellyfin.tv_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env("JELLYFIN_MOVIE_PATH") {
            self.jellyfin.movie_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env("JELLYFIN_MUSIC_PATH") {
            self.jellyfin.music_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env("JELLYFIN_HOST") {
            self.jellyfin.host = Some(v);
        }
        parse_env(env, "JELLYFIN_PORT", &mut self.jellyfin.port)?;
        if let Some(v) = env("JELLYFIN_API_KEY") {
            self.jellyfin.api_key = Some(v);
        }

        if let Some(v) = env("TMDB_API_KEY") {
            self.metadata.tmdb_api_key = Some(v);
        }
        if let Some(v) = env("TVDB_API_KEY") {
            self.metadata.tvdb_api_key = Some(v);
        }
        if let Some(v) = env("TVDB_PIN") {
            self.metadata.tvdb_pin = Some(v);
        }

        if let Some(v) = env("STATE_DIR") {
            self.persistence.state_dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Merge a YAML document over the current values, key by key.
    fn overlay_yaml(&self, text: &str) -> Result<Self> {
        let mut overlay: serde_yaml::Value = serde_yaml::from_str(text)?;

        // `cookies_path` historically sits at the top level of the file
        if let serde_yaml::Value::Mapping(map) = &mut overlay
            && let Some(cookies) = map.remove("cookies_path")
        {
            let section = map
                .entry("downloader".into())
                .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
            if let serde_yaml::Value::Mapping(downloader) = section {
                downloader.insert("cookies_path".into(), cookies);
            }
        }

        let mut base = serde_yaml::to_value(self)?;
        merge_yaml(&mut base, overlay);
        Ok(serde_yaml::from_value(base)?)
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.media.output_dir.as_os_str().is_empty() && !self.media.output_dir.is_absolute() {
            self.media.output_dir = std::path::absolute(&self.media.output_dir)?;
        }
        if let Some(cookies) = &self.downloader.cookies_path
            && !cookies.exists()
        {
            tracing::warn!(path = ?cookies, "cookie file not found, continuing without cookies");
        }
        Ok(())
    }

    /// Check ranges and cross-field requirements.
    pub fn validate(&self) -> Result<()> {
        if self.media.output_dir.as_os_str().is_empty() {
            return Err(config_error("output directory must not be empty", "media.output_dir"));
        }
        if self.media.quality == 0 {
            return Err(config_error("quality must be greater than zero", "media.quality"));
        }
        if self.media.crf > 51 {
            return Err(config_error("crf must be between 0 and 51", "media.crf"));
        }
        if self.downloader.ytdlp_path.as_os_str().is_empty() {
            return Err(config_error(
                "downloader path must not be empty",
                "downloader.ytdlp_path",
            ));
        }
        if self.jobs.completed_jobs_limit < 1 {
            return Err(config_error(
                "completed_jobs_limit must be at least 1",
                "jobs.completed_jobs_limit",
            ));
        }
        if self.jobs.max_concurrent_jobs < 1 {
            return Err(config_error(
                "max_concurrent_jobs must be at least 1",
                "jobs.max_concurrent_jobs",
            ));
        }
        if self.jobs.message_limit < 1 {
            return Err(config_error(
                "message_limit must be at least 1",
                "jobs.message_limit",
            ));
        }
        if self.jobs.cancel_grace.is_zero() {
            return Err(config_error(
                "cancel_grace must be at least one second",
                "jobs.cancel_grace",
            ));
        }
        if self.web.port == 0 {
            return Err(config_error("port must be between 1 and 65535", "web.port"));
        }
        if self.update_checker.interval_minutes < 1 {
            return Err(config_error(
                "interval_minutes must be at least 1",
                "update_checker.interval_minutes",
            ));
        }
        if self.jellyfin.enabled && self.jellyfin.tv_path.is_none() {
            return Err(config_error(
                "tv_path is required when library integration is enabled",
                "jellyfin.tv_path",
            ));
        }
        if self.jellyfin.port == 0 {
            return Err(config_error("port must be between 1 and 65535", "jellyfin.port"));
        }
        Ok(())
    }

    /// Copy with every secret replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [
            &mut copy.jellyfin.api_key,
            &mut copy.metadata.tmdb_api_key,
            &mut copy.metadata.tvdb_api_key,
            &mut copy.metadata.tvdb_pin,
        ] {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn parse_env<T: FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()> {
    if let Some(raw) = env(key) {
        *target = raw.trim().parse().map_err(|_| Error::Config {
            message: format!("invalid value {:?}", raw),
            key: Some(key.to_string()),
        })?;
    }
    Ok(())
}

fn parse_env_bool(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    target: &mut bool,
) -> Result<()> {
    if let Some(raw) = env(key) {
        *target = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(Error::Config {
                    message: format!("invalid boolean {:?}", raw),
                    key: Some(key.to_string()),
                });
            }
        };
    }
    Ok(())
}

fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./media")
}

fn default_quality() -> u32 {
    1080
}

fn default_crf() -> u8 {
    28
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_convert_path() -> PathBuf {
    PathBuf::from("convert")
}

fn default_montage_path() -> PathBuf {
    PathBuf::from("montage")
}

fn default_completed_jobs_limit() -> usize {
    10
}

fn default_max_concurrent_jobs() -> usize {
    1
}

fn default_message_limit() -> usize {
    200
}

fn default_cancel_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8000
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_jellyfin_port() -> u16 {
    8096
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_tmdb_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tvdb_base_url() -> String {
    "https://api4.thetvdb.com/v4".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./config")
}

// Duration serialization helper (as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::from_sources(env_from(&[]), None).unwrap();
        assert_eq!(config.media.quality, 1080);
        assert_eq!(config.media.crf, 28);
        assert_eq!(config.jobs.max_concurrent_jobs, 1);
        assert_eq!(config.jobs.completed_jobs_limit, 10);
        assert_eq!(config.jobs.message_limit, 200);
        assert_eq!(config.web.port, 8000);
        assert!(config.media.output_dir.is_absolute());
        assert!(!config.update_checker.enabled);
    }

    #[test]
    fn environment_overrides_defaults() {
        let env = env_from(&[
            ("VIDEO_QUALITY", "720"),
            ("USE_H265", "false"),
            ("MAX_CONCURRENT_JOBS", "3"),
            ("WEB_PORT", "9000"),
            ("JELLYFIN_API_KEY", "secret"),
        ]);
        let config = Config::from_sources(env, None).unwrap();
        assert_eq!(config.media.quality, 720);
        assert!(!config.media.use_h265);
        assert_eq!(config.jobs.max_concurrent_jobs, 3);
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.jellyfin.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn yaml_overrides_environment_per_key() {
        let env = env_from(&[("VIDEO_QUALITY", "720"), ("CRF", "30")]);
        let yaml = "media:\n  crf: 22\ncookies_path: /nonexistent/cookies.txt\n";
        let config = Config::from_sources(env, Some(yaml)).unwrap();
        assert_eq!(config.media.quality, 720, "untouched env value survives");
        assert_eq!(config.media.crf, 22);
        assert_eq!(
            config.downloader.cookies_path,
            Some(PathBuf::from("/nonexistent/cookies.txt"))
        );
    }

    #[test]
    fn unparseable_env_value_names_the_key() {
        let err = Config::from_sources(env_from(&[("CRF", "high")]), None).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("CRF")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let cases: &[(&str, &str, &str)] = &[
            ("CRF", "52", "media.crf"),
            ("VIDEO_QUALITY", "0", "media.quality"),
            ("MAX_CONCURRENT_JOBS", "0", "jobs.max_concurrent_jobs"),
            ("COMPLETED_JOBS_LIMIT", "0", "jobs.completed_jobs_limit"),
            ("WEB_PORT", "0", "web.port"),
            ("UPDATE_CHECKER_INTERVAL", "0", "update_checker.interval_minutes"),
        ];
        for (var, value, expected_key) in cases {
            let err = Config::from_sources(env_from(&[(var, value)]), None).unwrap_err();
            match err {
                Error::Config { key, .. } => assert_eq!(key.as_deref(), Some(*expected_key)),
                other => panic!("unexpected error for {var}: {other}"),
            }
        }
    }

    #[test]
    fn library_integration_requires_tv_path() {
        let err = Config::from_sources(env_from(&[("JELLYFIN_ENABLED", "true")]), None)
            .unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(k), .. } if k == "jellyfin.tv_path"));
    }

    #[test]
    fn redacted_hides_secrets_only_when_set() {
        let env = env_from(&[("TMDB_API_KEY", "abc")]);
        let config = Config::from_sources(env, None).unwrap().redacted();
        assert_eq!(config.metadata.tmdb_api_key.as_deref(), Some(REDACTED));
        assert!(config.metadata.tvdb_api_key.is_none());
    }

    #[test]
    fn update_interval_has_one_minute_floor() {
        let checker = UpdateCheckerConfig {
            enabled: true,
            interval_minutes: 0,
        };
        assert_eq!(checker.interval(), Duration::from_secs(60));
    }

    #[test]
    fn music_dir_defaults_under_output() {
        let media = MediaConfig {
            output_dir: PathBuf::from("/srv/media"),
            ..Default::default()
        };
        assert_eq!(media.music_dir(), PathBuf::from("/srv/media/Music"));
    }

    #[test]
    #[serial]
    fn load_reads_process_environment_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.yml");
        std::fs::write(&file, "web:\n  port: 8123\n").unwrap();

        // SAFETY: serialised with every other env-mutating test
        unsafe {
            std::env::set_var("CONFIG_FILE", &file);
            std::env::set_var("VIDEO_QUALITY", "480");
        }
        let config = Config::load();
        unsafe {
            std::env::remove_var("CONFIG_FILE");
            std::env::remove_var("VIDEO_QUALITY");
        }

        let config = config.unwrap();
        assert_eq!(config.web.port, 8123);
        assert_eq!(config.media.quality, 480);
    }
}
