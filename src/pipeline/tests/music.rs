use super::*;
use crate::config::RetryConfig;
use crate::pipeline::music::{self, AlbumDefaults, tag_command, track_file_name};
use crate::types::TrackMetadata;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn track(number: u32, title: &str) -> TrackMetadata {
    TrackMetadata {
        title: title.into(),
        track_number: number,
        ..Default::default()
    }
}

fn music_job(tracks: Vec<TrackMetadata>) -> Job {
    Job::new(
        "https://music.example.com/playlist?list=OLAK5",
        JobTarget::Music {
            album_name: "Album".into(),
            artist_name: "Artist".into(),
            tracks,
            playlist_start: None,
        },
    )
}

fn quick_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        jitter: false,
        ..Default::default()
    }
}

const ALBUM: AlbumDefaults<'static> = AlbumDefaults {
    album: "Album",
    artist: "Artist",
};

#[test]
fn track_names_are_numbered_and_sanitized() {
    assert_eq!(track_file_name(&track(3, "Intro")), "03 - Intro.mp3");
    assert_eq!(track_file_name(&track(12, "What? / Why")), "12 - What Why.mp3");
}

#[test]
fn tags_fall_back_to_album_values() {
    let mut entry = track(2, "Song");
    entry.total_tracks = Some(10);
    entry.disc_number = Some(1);
    entry.release_date = Some("2021-03-04".into());
    entry.genres = vec!["Jazz".into(), "Soul".into()];

    let command = tag_command(
        Path::new("ffmpeg"),
        Path::new("in.mp3"),
        None,
        &entry,
        &ALBUM,
        Path::new("out.mp3"),
    );
    let args = command.args_lossy();
    let tags: Vec<&str> = args
        .iter()
        .zip(args.iter().skip(1))
        .filter(|(flag, _)| *flag == "-metadata")
        .map(|(_, value)| value.as_str())
        .collect();

    assert_eq!(
        tags,
        [
            "title=Song",
            "artist=Artist",
            "album=Album",
            "album_artist=Artist",
            "track=2/10",
            "disc=1",
            "date=2021-03-04",
            "genre=Jazz, Soul",
        ]
    );
    assert_eq!(command.value_of("-id3v2_version").unwrap(), "3");
    assert!(!args.iter().any(|a| a == "1:v"));
    assert_eq!(args.last().unwrap(), "out.mp3");
}

#[test]
fn cover_is_mapped_as_second_input() {
    let mut entry = track(1, "Song");
    entry.artist = "Guest".into();
    entry.album_artist = Some("Band".into());

    let command = tag_command(
        Path::new("ffmpeg"),
        Path::new("in.mp3"),
        Some(Path::new("cover.jpg")),
        &entry,
        &ALBUM,
        Path::new("out.mp3"),
    );
    let args = command.args_lossy();

    assert!(args.windows(2).any(|w| w == ["-i", "cover.jpg"]));
    assert!(args.windows(2).any(|w| w == ["-map", "1:v"]));
    assert!(args.iter().any(|a| a == "artist=Guest"));
    assert!(args.iter().any(|a| a == "album_artist=Band"));
}

#[cfg(unix)]
#[tokio::test]
async fn tracks_are_converted_renamed_and_tagged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cover.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let rig = Rig::new("exit 0");
    let folder = rig.dir.path().join("music/Artist/Album");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("001 - intro.webm"), b"webm").unwrap();
    std::fs::write(folder.join("002 - song.mp3"), b"mp3").unwrap();

    let mut second = track(2, "Song Two");
    second.cover_url = Some(format!("{}/cover.jpg", server.uri()));
    let tracks = vec![track(1, "Intro"), second, track(3, "Never Downloaded")];
    let stage = rig.stage(music_job(tracks.clone()).with_remaining(
        tracks.iter().map(|t| t.title.clone()),
    ));
    let files = crate::utils::list_files_with_extensions(&folder, AUDIO_EXTENSIONS);

    let prepared = music::run_track_stage(
        &stage.ctx(&rig.config),
        &reqwest::Client::new(),
        &quick_retry(),
        &folder,
        &ALBUM,
        &tracks,
        &files,
    )
    .await
    .unwrap();

    assert_eq!(
        prepared,
        [folder.join("01 - Intro.mp3"), folder.join("02 - Song Two.mp3")]
    );
    assert!(!folder.join("001 - intro.webm").exists());
    assert!(!folder.join("002 - song.mp3").exists());
    assert_eq!(std::fs::read(folder.join("02 - Song Two.mp3")).unwrap(), b"ffmpeg");
    assert!(!folder.join(".tagging-02.mp3").exists());

    let job = stage.job();
    assert_eq!(job.processed_files, 2);
    assert_eq!(job.total_files, 2);
    assert_eq!(job.remaining_files, ["Never Downloaded".to_string()]);
    assert_eq!(job.last_message(), Some("Prepared 2 of 2 tracks"));
}

#[cfg(unix)]
#[tokio::test]
async fn failed_cover_download_still_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let rig = Rig::new("exit 0");
    let folder = rig.dir.path().join("music/Artist/Album");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("001 - intro.mp3"), b"mp3").unwrap();

    let mut entry = track(1, "Intro");
    entry.cover_url = Some(format!("{}/missing.jpg", server.uri()));
    let stage = rig.stage(music_job(vec![entry.clone()]));

    let prepared = music::run_track_stage(
        &stage.ctx(&rig.config),
        &reqwest::Client::new(),
        &quick_retry(),
        &folder,
        &ALBUM,
        &[entry],
        &[folder.join("001 - intro.mp3")],
    )
    .await
    .unwrap();

    assert_eq!(prepared.len(), 1);
    assert!(stage.has_message("Failed to fetch cover art"));
    assert_eq!(std::fs::read(folder.join("01 - Intro.mp3")).unwrap(), b"ffmpeg");
}
