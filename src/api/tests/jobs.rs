use super::*;

fn tv_body(url: &str) -> Value {
    serde_json::json!({
        "playlist_url": url,
        "show_name": "Api Show",
        "season_num": "01",
        "episode_start": "1"
    })
}

#[tokio::test]
async fn submitted_tv_job_is_listed_and_inspectable() {
    let (app, _dir) = create_test_app().await;
    let router = create_router(app.clone());

    let response = send(&router, Method::POST, "/jobs", Some(tv_body(PLAYLIST))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let job_id = json_body(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string();
    settle(&app).await;

    let response = send(&router, Method::GET, &format!("/jobs/{job_id}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let job = json_body(response).await;
    assert_eq!(job["job_id"], job_id.as_str());
    assert_eq!(job["media_type"], "tv");
    assert_eq!(job["source_id"], "PLapi");
    assert_eq!(job["status"], "failed");
    assert_eq!(
        job["remaining_files"],
        serde_json::json!(["Pilot S01E01", "Second S01E02"])
    );
    let messages = job["messages"].as_array().unwrap();
    assert!(
        messages
            .iter()
            .any(|m| m["text"].as_str().unwrap().starts_with("Missing dependencies"))
    );

    let response = send(&router, Method::GET, "/jobs", None).await;
    let jobs = json_body(response).await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);
    assert!(jobs[0].get("messages").is_none());
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let (app, _dir) = create_test_app().await;
    let router = create_router(app);

    let mut body = tv_body(PLAYLIST);
    body["show_name"] = Value::from("");
    let response = send(&router, Method::POST, "/jobs", Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "validation_error");

    let response = send(
        &router,
        Method::POST,
        "/movies",
        Some(serde_json::json!({"video_url": "file:///etc/passwd", "movie_name": "X"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &router,
        Method::POST,
        "/jobs",
        Some(serde_json::json!({"playlist_url": PLAYLIST})),
    )
    .await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_jobs_are_not_found() {
    let (app, _dir) = create_test_app().await;
    let router = create_router(app);

    let response = send(&router, Method::GET, "/jobs/missing", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "job_not_found");

    let response = send(&router, Method::DELETE, "/jobs/missing", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn music_and_movie_jobs_are_accepted() {
    let (app, _dir) = create_test_app().await;
    let router = create_router(app.clone());

    let response = send(
        &router,
        Method::POST,
        "/music",
        Some(serde_json::json!({
            "playlist_url": "https://music.youtube.com/playlist?list=OLAK5uy",
            "album_name": "Album",
            "artist_name": "Artist",
            "tracks": [
                {"title": "One", "track_number": 1},
                {"title": "", "track_number": 2}
            ]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &router,
        Method::POST,
        "/movies",
        Some(serde_json::json!({
            "video_url": "https://www.youtube.com/watch?v=film",
            "movie_name": "Film"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    settle(&app).await;

    let jobs = json_body(send(&router, Method::GET, "/jobs", None).await).await;
    let kinds: Vec<&str> = jobs
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["media_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&"music") && kinds.contains(&"movie"));
    let music = jobs
        .as_array()
        .unwrap()
        .iter()
        .find(|j| j["media_type"] == "music")
        .unwrap();
    assert_eq!(music["remaining_files"], serde_json::json!(["One"]));
}
