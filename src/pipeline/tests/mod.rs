use super::*;
use crate::job::Job;
use crate::test_support::{detached_handle, write_script};
use std::time::Duration;
use tempfile::TempDir;

mod flows;
mod music;

/// Leading part of every fake downloader: finds the output folder and ledger
const YTDLP_ARGS: &str = r#"while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    --download-archive) archive="$2"; shift ;;
  esac
  shift
done
dir=$(dirname "$out")
mkdir -p "$dir""#;

/// Writes its last argument and reports transcode progress
const FAKE_FFMPEG: &str = r#"for last; do :; done
case "$last" in *%03d*) last=$(echo "$last" | sed 's/%03d/001/') ;; esac
echo "frame=  10 fps=1 time=00:00:05.00 bitrate=1.0kbits/s" >&2
echo "frame=  20 fps=1 time=00:00:10.00 bitrate=1.0kbits/s" >&2
printf 'ffmpeg' > "$last""#;

const FAKE_CONVERT: &str = r#"case "$1" in -) cat > /dev/null ;; esac
for last; do :; done
printf 'image' > "$last""#;

const FAKE_MONTAGE: &str = "printf 'collage'";

fn fake_ffprobe(codec: &str) -> String {
    format!(
        r#"case "$*" in
  *format=duration*) echo "10.0" ;;
  *) echo '{{"streams":[{{"codec_name":"{codec}"}}]}}' ;;
esac"#
    )
}

fn ytdlp(body: &str) -> String {
    format!("{YTDLP_ARGS}\n{body}")
}

/// A temp workspace with fake tools and a configuration pointing at them
struct Rig {
    dir: TempDir,
    config: Config,
}

impl Rig {
    fn new(ytdlp_body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();

        let mut config = Config::default();
        config.media.output_dir = dir.path().join("media");
        config.persistence.state_dir = dir.path().join("state");
        config.jobs.cancel_grace = Duration::from_millis(200);
        config.jobs.probe_timeout = Duration::from_secs(10);
        config.downloader.ytdlp_path = write_script(&bin, "yt-dlp", &ytdlp(ytdlp_body));
        config.tools.ffmpeg_path = write_script(&bin, "ffmpeg", FAKE_FFMPEG);
        config.tools.ffprobe_path = write_script(&bin, "ffprobe", &fake_ffprobe("h264"));
        config.tools.convert_path = write_script(&bin, "convert", FAKE_CONVERT);
        config.tools.montage_path = write_script(&bin, "montage", FAKE_MONTAGE);
        Self { dir, config }
    }

    fn bin(&self) -> std::path::PathBuf {
        self.dir.path().join("bin")
    }

    /// Replace one fake tool
    fn tool(&mut self, name: &str, body: &str) {
        let path = write_script(&self.bin(), name, body);
        match name {
            "ffmpeg" => self.config.tools.ffmpeg_path = path,
            "ffprobe" => self.config.tools.ffprobe_path = path,
            "convert" => self.config.tools.convert_path = path,
            "montage" => self.config.tools.montage_path = path,
            _ => self.config.downloader.ytdlp_path = path,
        }
    }

    fn season_dir(&self, show: &str, season: &str) -> std::path::PathBuf {
        let dir = season_folder(&self.config.media.output_dir, show, season);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn database(&self) -> Arc<Database> {
        Arc::new(
            Database::new(&self.config.persistence.database_path())
                .await
                .unwrap(),
        )
    }

    fn stage(&self, job: Job) -> StageRig {
        let scratch = self.dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        StageRig {
            handle: detached_handle(job),
            tools: Toolchain::from_config(&self.config),
            runner: ProcessRunner::new(Duration::from_millis(200), Duration::from_secs(10)),
            scratch,
        }
    }
}

/// Everything a [`StageContext`] borrows
struct StageRig {
    handle: JobHandle,
    tools: Toolchain,
    runner: ProcessRunner,
    scratch: std::path::PathBuf,
}

impl StageRig {
    fn ctx<'a>(&'a self, config: &'a Config) -> StageContext<'a> {
        StageContext {
            job: &self.handle,
            config,
            tools: &self.tools,
            runner: &self.runner,
            scratch: &self.scratch,
        }
    }

    fn job(&self) -> Job {
        self.handle.snapshot().unwrap()
    }

    fn messages(&self) -> Vec<String> {
        self.job().messages.into_iter().map(|m| m.text).collect()
    }

    fn has_message(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

fn tv_job(url: &str, episode_start: &str) -> Job {
    Job::new(
        url,
        JobTarget::Tv {
            show_name: "Show".into(),
            season_num: "01".into(),
            episode_start: episode_start.into(),
            playlist_start: None,
        },
    )
}

fn write_sidecar(dir: &std::path::Path, stem: &str, id: &str, index: u32) {
    let json = serde_json::json!({
        "id": id,
        "title": stem.split(" S0").next().unwrap_or(stem).replace('_', " "),
        "playlist_index": index,
        "upload_date": "20240105",
        "description": "First line\nSecond line",
    });
    std::fs::write(dir.join(format!("{stem}.info.json")), json.to_string()).unwrap();
    std::fs::write(dir.join(format!("{stem}.mp4")), b"video").unwrap();
}
