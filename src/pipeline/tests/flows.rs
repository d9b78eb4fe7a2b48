//! Whole jobs driven through the scheduler with fake tools

use super::*;
use crate::scheduler::{Scheduler, SchedulerLimits};
use crate::sources::{RemoteEntry, RemoteLister};
use crate::types::TrackMetadata;
use tokio::sync::broadcast;

/// Lister for sources whose ledger never needs seeding
struct EmptyLister;

#[async_trait]
impl RemoteLister for EmptyLister {
    async fn list(&self, _url: &str) -> Result<Vec<RemoteEntry>> {
        Ok(Vec::new())
    }
}

/// Downloader writing two episodes with sidecars and recording them in the ledger
const TWO_EPISODES: &str = r#"echo "[download] Downloading item 1 of 2"
echo "[download] Destination: $dir/Pilot_Part S01E01.mp4"
printf 'v' > "$dir/Pilot_Part S01E01.mp4"
echo '{"id":"e1","title":"Pilot Part","playlist_index":1,"upload_date":"20240105"}' > "$dir/Pilot_Part S01E01.info.json"
echo "[download] 100% of 1.00MiB"
echo "[download] Downloading item 2 of 2"
echo "[download] Destination: $dir/Second S01E02.mp4"
printf 'v' > "$dir/Second S01E02.mp4"
echo '{"id":"e2","title":"Second","playlist_index":2,"upload_date":"20240112"}' > "$dir/Second S01E02.info.json"
echo "[download] 100% of 1.00MiB"
printf 'youtube e1\nyoutube e2\n' >> "$archive""#;

async fn run_to_end(pipeline: Pipeline, job: Job) -> Job {
    let (events, _) = broadcast::channel(64);
    let scheduler = Scheduler::new(
        Arc::new(pipeline),
        SchedulerLimits {
            max_concurrent_jobs: 1,
            completed_jobs_limit: 10,
        },
        events,
    );
    let id = scheduler.submit(job).unwrap();
    tokio::time::timeout(Duration::from_secs(30), scheduler.wait_idle())
        .await
        .expect("job did not finish");
    scheduler.snapshot(&id).unwrap()
}

async fn pipeline(rig: &Rig) -> Pipeline {
    Pipeline::new(Arc::new(rig.config.clone()), rig.database().await).unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn tv_job_runs_every_stage_and_copies_to_the_library() {
    let mut rig = Rig::new(TWO_EPISODES);
    let library = rig.dir.path().join("library/tv");
    rig.config.jellyfin.enabled = true;
    rig.config.jellyfin.tv_path = Some(library.clone());

    let job = run_to_end(
        pipeline(&rig).await,
        tv_job("https://www.youtube.com/playlist?list=PLshow", "1"),
    )
    .await;

    assert_eq!(job.stage, Stage::Completed, "{:?}", job.messages);
    assert_eq!(job.progress, 100);
    assert_eq!(job.last_message(), Some("Job completed successfully"));

    let season = rig.dir.path().join("media/Show/Season 01");
    for file in [
        "Pilot Part S01E01.mp4",
        "Pilot Part S01E01.nfo",
        "Pilot Part S01E01-thumb.jpg",
        "Second S01E02.mp4",
        "season.nfo",
        "season01-poster.jpg",
        "season01.jpg",
    ] {
        assert!(season.join(file).exists(), "{file} missing from season folder");
        assert!(
            library.join("Show/Season 01").join(file).exists(),
            "{file} missing from library"
        );
    }
    assert!(library.join("Show/tvshow.nfo").exists());
    assert!(library.join("Show/poster.jpg").exists());
    assert!(crate::metadata::find_sidecars(&season).is_empty());

    let ledger = rig.dir.path().join("state/archives/PLshow.txt");
    assert_eq!(
        std::fs::read_to_string(ledger).unwrap(),
        "youtube e1\nyoutube e2\n"
    );
    let db = rig.database().await;
    assert_eq!(db.get_last_episode("Show", "01").await.unwrap(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn missing_tools_fail_before_any_folder_is_created() {
    let mut rig = Rig::new(TWO_EPISODES);
    rig.config.tools.montage_path = rig.bin().join("montage-missing");

    let job = run_to_end(
        pipeline(&rig).await,
        tv_job("https://www.youtube.com/playlist?list=PLshow", "1"),
    )
    .await;

    assert_eq!(job.stage, Stage::Failed);
    let message = job.last_message().unwrap();
    assert!(message.starts_with("Missing dependencies: "), "{message}");
    assert!(message.contains("montage-missing"));
    assert!(!rig.dir.path().join("media/Show").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn invalid_episode_start_fails_the_job() {
    let rig = Rig::new(TWO_EPISODES);

    let job = run_to_end(
        pipeline(&rig).await,
        tv_job("https://www.youtube.com/playlist?list=PLshow", "first"),
    )
    .await;

    assert_eq!(job.stage, Stage::Failed);
    assert_eq!(job.last_message(), Some("Invalid episode start: first"));
}

#[cfg(unix)]
#[tokio::test]
async fn auto_numbering_needs_a_resolver() {
    let rig = Rig::new(TWO_EPISODES);

    let job = run_to_end(
        pipeline(&rig).await,
        tv_job("https://www.youtube.com/playlist?list=PLshow", "auto"),
    )
    .await;

    assert_eq!(job.stage, Stage::Failed);
    assert_eq!(
        job.last_message(),
        Some("Automatic episode detection requires a TVDB API key")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn tracked_job_advances_the_resume_cursor() {
    let rig = Rig::new(TWO_EPISODES);
    let db = rig.database().await;
    let tracker = Arc::new(SourceTracker::new(
        db.clone(),
        Arc::new(EmptyLister),
        rig.config.persistence.archive_dir(),
        rig.config.media.output_dir.clone(),
    ));
    let url = "https://www.youtube.com/playlist?list=PLtracked";
    let (source, created) = tracker
        .register_playlist(url, "Show", "01", None)
        .await
        .unwrap();
    assert!(created);
    assert_eq!(source.resume_cursor, 1);

    let pipeline = Pipeline::new(Arc::new(rig.config.clone()), db.clone())
        .unwrap()
        .with_tracker(tracker);
    let job = run_to_end(pipeline, tv_job(url, "1").with_source(source.id.clone())).await;

    assert_eq!(job.stage, Stage::Completed, "{:?}", job.messages);
    let stored = db.get_source(&source.id).await.unwrap().unwrap();
    assert_eq!(stored.resume_cursor, 3);
    assert_eq!(
        std::fs::read_to_string(&stored.ledger_path).unwrap(),
        "youtube e1\nyoutube e2\n"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn retention_prunes_after_the_job_completes() {
    let rig = Rig::new(TWO_EPISODES);
    let db = rig.database().await;
    let tracker = Arc::new(SourceTracker::new(
        db.clone(),
        Arc::new(EmptyLister),
        rig.config.persistence.archive_dir(),
        rig.config.media.output_dir.clone(),
    ));
    let url = "https://www.youtube.com/playlist?list=PLpruned";
    let (source, _) = tracker
        .register_playlist(url, "Show", "01", None)
        .await
        .unwrap();
    db.set_source_retention(&source.id, crate::retention::RetentionPolicy::KeepLastItems(1))
        .await
        .unwrap();

    let pipeline = Pipeline::new(Arc::new(rig.config.clone()), db.clone())
        .unwrap()
        .with_tracker(tracker);
    let job = run_to_end(pipeline, tv_job(url, "1").with_source(source.id.clone())).await;

    assert_eq!(job.stage, Stage::Completed, "{:?}", job.messages);
    assert_eq!(job.last_message(), Some("Job completed successfully"));

    let folder = season_folder(&rig.config.media.output_dir, "Show", "01");
    let videos: Vec<String> = std::fs::read_dir(&folder)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".mp4"))
        .collect();
    assert_eq!(videos.len(), 1, "{videos:?}");
    assert!(videos[0].contains("S01E02"), "{videos:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn movie_is_named_after_the_video_without_tmdb() {
    let rig = Rig::new(
        r#"printf 'v' > "$dir/Some_Film S01E01.mp4"
echo '{"id":"vid42","title":"Some Film","upload_date":"20200101"}' > "$dir/Some_Film S01E01.info.json""#,
    );
    let job = Job::new(
        "https://www.youtube.com/watch?v=vid42",
        JobTarget::Movie {
            movie_name: "Film".into(),
        },
    );

    let job = run_to_end(pipeline(&rig).await, job).await;

    assert_eq!(job.stage, Stage::Completed, "{:?}", job.messages);
    let folder = rig.dir.path().join("media/Film");
    assert!(folder.join("Film (2020) [vid42].mp4").exists());
    assert!(folder.join("poster.jpg").exists());
    let nfo = std::fs::read_to_string(folder.join("movie.nfo")).unwrap();
    assert!(nfo.contains("<title>Film</title>"));
    assert!(nfo.contains("<year>2020</year>"));
    assert!(nfo.contains("<id>vid42</id>"));
    assert!(crate::metadata::find_sidecars(&folder).is_empty());
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

const TWO_TRACKS: &str = r#"printf 'a' > "$dir/001 - first.mp3"
printf 'a' > "$dir/002 - second.m4a""#;

#[cfg(unix)]
#[tokio::test]
async fn music_job_prepares_tagged_tracks() {
    let rig = Rig::new(TWO_TRACKS);
    let tracks = vec![
        TrackMetadata {
            title: "First".into(),
            track_number: 1,
            ..Default::default()
        },
        TrackMetadata {
            title: "Second".into(),
            track_number: 2,
            ..Default::default()
        },
    ];

    let job = run_to_end(pipeline(&rig).await, music_job(tracks)).await;

    assert_eq!(job.stage, Stage::Completed, "{:?}", job.messages);
    let album = rig.dir.path().join("media/Music/Artist/Album");
    assert_eq!(
        crate::utils::list_files_with_extensions(&album, AUDIO_EXTENSIONS),
        [album.join("01 - First.mp3"), album.join("02 - Second.mp3")]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn music_job_without_track_metadata_fails() {
    let rig = Rig::new(TWO_TRACKS);

    let job = run_to_end(pipeline(&rig).await, music_job(Vec::new())).await;

    assert_eq!(job.stage, Stage::Failed);
    assert_eq!(job.last_message(), Some("No music tracks were prepared"));
}
