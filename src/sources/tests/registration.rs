use super::*;
use crate::error::SourceError;
use crate::retention::RetentionPolicy;

#[tokio::test]
async fn register_is_idempotent() {
    let fx = fixture().await;

    let (first, created) = fx
        .tracker
        .register_playlist(PLAYLIST, "Show", "01", None)
        .await
        .unwrap();
    assert!(created);
    assert_eq!(first.id, "PLabc");
    assert_eq!(first.resume_cursor, 1);
    assert!(first.ledger_path.ends_with("archives/PLabc.txt"));

    let (second, created) = fx
        .tracker
        .register_playlist(PLAYLIST, "Other", "02", Some(4))
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(second.show_name, "Show");
    assert_eq!(second.resume_cursor, 1);
}

#[tokio::test]
async fn late_start_seeds_skipped_entries() {
    let fx = fixture().await;
    fx.lister.set(PLAYLIST, &["a", "b", "c", "d"]);

    let (source, _) = fx
        .tracker
        .register_playlist(PLAYLIST, "Show", "01", Some(3))
        .await
        .unwrap();
    assert_eq!(source.resume_cursor, 3);

    let ids = fx.tracker.ledger("PLabc").load().await.unwrap();
    assert_eq!(ids, HashSet::from(["a".to_string(), "b".to_string()]));
}

#[tokio::test]
async fn seeding_failure_still_registers() {
    let fx = fixture().await;
    let (_, created) = fx
        .tracker
        .register_playlist(PLAYLIST, "Show", "01", Some(5))
        .await
        .unwrap();
    assert!(created);
    assert!(fx.tracker.ledger("PLabc").is_empty().await.unwrap());
}

#[tokio::test]
async fn subscribe_seeds_every_current_item() {
    let fx = fixture().await;
    fx.lister.set(CHANNEL, &["new1", "old1", "old2"]);

    let source = fx
        .tracker
        .subscribe(CHANNEL, "Channel Show", Some("keep_episodes"), Some("5"))
        .await
        .unwrap();
    assert_eq!(source.id, "somechannel");
    assert_eq!(source.kind, SourceKind::Channel);
    assert_eq!(source.season_num, "00");
    assert_eq!(source.retention, RetentionPolicy::KeepLastItems(5));
    assert_eq!(fx.tracker.ledger("somechannel").len().await.unwrap(), 3);
}

#[tokio::test]
async fn subscribe_rejects_bad_input() {
    let fx = fixture().await;
    fx.lister.set(CHANNEL, &[]);

    let err = fx.tracker.subscribe("", "Show", None, None).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = fx
        .tracker
        .subscribe(CHANNEL, "Show", Some("keep_days"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Source(SourceError::InvalidRetention(_))
    ));

    fx.tracker.subscribe(CHANNEL, "Show", None, None).await.unwrap();
    let err = fx
        .tracker
        .subscribe(CHANNEL, "Show", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "source error: Subscription already exists for this channel");
}

#[tokio::test]
async fn update_subscription_fields() {
    let fx = fixture().await;
    fx.lister.set(CHANNEL, &[]);
    fx.tracker.subscribe(CHANNEL, "Show", None, None).await.unwrap();

    let updated = fx
        .tracker
        .update_subscription(
            "somechannel",
            SubscriptionUpdate {
                show_name: Some("Renamed".into()),
                retention_type: Some("days".into()),
                retention_value: Some("30".into()),
                enabled: Some(false),
            },
        )
        .await
        .unwrap();
    assert!(updated);

    let source = fx.tracker.get("somechannel").await.unwrap().unwrap();
    assert_eq!(source.show_name, "Renamed");
    assert_eq!(source.retention, RetentionPolicy::KeepLastDays(30));
    assert!(!source.enabled);

    assert!(
        !fx.tracker
            .update_subscription("missing", SubscriptionUpdate::default())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn remove_deletes_ledger() {
    let fx = fixture().await;
    fx.lister.set(CHANNEL, &["a"]);
    fx.tracker.subscribe(CHANNEL, "Show", None, None).await.unwrap();
    let ledger = fx.tracker.ledger("somechannel");
    assert!(ledger.path().exists());

    assert!(fx.tracker.remove("somechannel").await.unwrap());
    assert!(!ledger.path().exists());
    assert!(!fx.tracker.remove("somechannel").await.unwrap());
}

#[tokio::test]
async fn list_reports_progress_figures() {
    let fx = fixture().await;
    fx.tracker
        .register_playlist(PLAYLIST, "Show", "01", None)
        .await
        .unwrap();
    fx.tracker.ledger("PLabc").append(["x", "y"]).await.unwrap();
    let season = fx.season_dir("Show", "01");
    touch(&season, "Show S01E04.mp4");
    fx.db.set_last_episode("Show", "01", 2).await.unwrap();

    let views = fx.tracker.list(SourceKind::Playlist).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].downloaded_videos, 2);
    assert_eq!(views[0].last_episode, 4);
    assert!(fx.tracker.list(SourceKind::Channel).await.unwrap().is_empty());

    let json = serde_json::to_value(&views[0]).unwrap();
    assert_eq!(json["id"], "PLabc");
    assert_eq!(json["retention"]["mode"], "all");
}

#[tokio::test]
async fn toggling_unknown_source_reports_false() {
    let fx = fixture().await;
    assert!(!fx.tracker.set_enabled("nope", true).await.unwrap());
}
