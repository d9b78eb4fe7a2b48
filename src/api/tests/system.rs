use super::*;

#[tokio::test]
async fn health_reports_version_and_load() {
    let (app, _dir) = create_test_app().await;
    let response = send(&create_router(app), Method::GET, "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(health["running_jobs"], 0);
}

#[tokio::test]
async fn config_is_served_with_secrets_redacted() {
    let (app, _dir) = create_test_app().await;
    let mut config = app.config().clone();
    config.metadata.tvdb_api_key = Some("tvdb-secret".into());
    config.persistence.state_dir = config.persistence.state_dir.join("secret");
    let app = Tubarr::with_lister(config, Arc::new(StaticLister::new()))
        .await
        .unwrap();

    let response = send(&create_router(app), Method::GET, "/config", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_ne!(body["metadata"]["tvdb_api_key"], "tvdb-secret");
    assert!(body["metadata"]["tmdb_api_key"].is_null());
    assert!(!body.to_string().contains("tvdb-secret"));
}

#[tokio::test]
async fn media_listings_read_the_output_directory() {
    let (app, _dir) = create_test_app().await;
    let season = app.config().media.output_dir.join("Show").join("Season 01");
    std::fs::create_dir_all(&season).unwrap();
    std::fs::write(season.join("Ep S01E01.mp4"), b"x").unwrap();
    let router = create_router(app);

    let media = json_body(send(&router, Method::GET, "/media", None).await).await;
    assert_eq!(media[0]["name"], "Show");
    assert_eq!(media[0]["episode_count"], 1);
    assert_eq!(media[0]["seasons"][0]["episodes"][0]["episode_num"], 1);

    let movies = json_body(send(&router, Method::GET, "/movies", None).await).await;
    assert_eq!(movies, serde_json::json!([]));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (app, _dir) = create_test_app().await;
    let response = send(&create_router(app), Method::GET, "/openapi.json", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let spec = json_body(response).await;
    assert!(spec["paths"].get("/api/v1/jobs").is_some());
}

#[tokio::test]
async fn event_stream_is_server_sent_events() {
    let (app, _dir) = create_test_app().await;
    let response = send(&create_router(app), Method::GET, "/events", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}
