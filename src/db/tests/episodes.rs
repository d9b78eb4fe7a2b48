use super::*;

#[tokio::test]
async fn test_unknown_show_is_zero() {
    let (db, _file) = setup_db().await;
    assert_eq!(db.get_last_episode("Nothing", "01").await.unwrap(), 0);
}

#[tokio::test]
async fn test_set_overwrites_per_season() {
    let (db, _file) = setup_db().await;

    db.set_last_episode("My Show", "01", 4).await.unwrap();
    db.set_last_episode("My Show", "01", 9).await.unwrap();
    db.set_last_episode("My Show", "02", 2).await.unwrap();

    assert_eq!(db.get_last_episode("My Show", "01").await.unwrap(), 9);
    assert_eq!(db.get_last_episode("My Show", "02").await.unwrap(), 2);
}

#[tokio::test]
async fn test_keys_use_sanitised_show_name() {
    let (db, _file) = setup_db().await;
    db.set_last_episode("My_Show", "00", 12).await.unwrap();
    assert_eq!(db.get_last_episode("My Show", "00").await.unwrap(), 12);
}
