use super::*;
use crate::Config;
use crate::error::Result;
use crate::sources::{RemoteEntry, RemoteLister};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

mod jobs;
mod system;

const PLAYLIST: &str = "https://www.youtube.com/playlist?list=PLapi";
const CHANNEL: &str = "https://www.youtube.com/@apicast";

/// Lister with fixed listings for the playlist and channel above
struct StaticLister(HashMap<&'static str, Vec<RemoteEntry>>);

impl StaticLister {
    fn new() -> Self {
        let entry = |index: u32, id: &str, title: &str| RemoteEntry {
            index,
            id: id.to_string(),
            title: title.to_string(),
            extractor: Some("youtube".into()),
        };
        Self(HashMap::from([
            (
                PLAYLIST,
                vec![entry(1, "p1", "Pilot"), entry(2, "p2", "Second")],
            ),
            (CHANNEL, vec![entry(1, "c1", "Old Upload")]),
        ]))
    }
}

#[async_trait]
impl RemoteLister for StaticLister {
    async fn list(&self, url: &str) -> Result<Vec<RemoteEntry>> {
        self.0
            .get(url)
            .cloned()
            .ok_or_else(|| crate::error::Error::Other(format!("no listing for {url}")))
    }
}

/// App whose external tools are missing, so jobs fail without side effects
async fn create_test_app() -> (Tubarr, TempDir) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.media.output_dir = dir.path().join("media");
    config.persistence.state_dir = dir.path().join("state");
    config.jobs.cancel_grace = Duration::from_secs(1);
    let missing = dir.path().join("missing");
    config.downloader.ytdlp_path = missing.join("yt-dlp");
    config.tools.ffmpeg_path = missing.join("ffmpeg");
    config.tools.ffprobe_path = missing.join("ffprobe");
    config.tools.convert_path = missing.join("convert");
    config.tools.montage_path = missing.join("montage");

    let app = Tubarr::with_lister(config, Arc::new(StaticLister::new()))
        .await
        .unwrap();
    (app, dir)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn settle(app: &Tubarr) {
    tokio::time::timeout(Duration::from_secs(10), app.scheduler().wait_idle())
        .await
        .unwrap();
}

#[tokio::test]
async fn api_server_serves_and_stops_on_shutdown_signal() {
    let (app, _dir) = create_test_app().await;
    let mut config = app.config().clone();
    config.web.host = "127.0.0.1".into();
    config.web.port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    config.persistence.state_dir = config.persistence.state_dir.join("served");
    let app = Tubarr::with_lister(config, Arc::new(StaticLister::new()))
        .await
        .unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(app, async {
        rx.await.ok();
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(()).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn cors_headers_follow_configuration() {
    let (app, _dir) = create_test_app().await;
    let request = || {
        Request::builder()
            .uri("/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap()
    };

    let response = create_router(app.clone()).oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));

    let mut config = app.config().clone();
    config.web.cors_enabled = false;
    config.persistence.state_dir = config.persistence.state_dir.join("nocors");
    let app = Tubarr::with_lister(config, Arc::new(StaticLister::new()))
        .await
        .unwrap();
    let response = create_router(app).oneshot(request()).await.unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn swagger_ui_can_be_disabled() {
    let (app, _dir) = create_test_app().await;
    let response = send(&create_router(app.clone()), Method::GET, "/swagger-ui/", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut config = app.config().clone();
    config.web.swagger_ui = false;
    config.persistence.state_dir = config.persistence.state_dir.join("noswagger");
    let app = Tubarr::with_lister(config, Arc::new(StaticLister::new()))
        .await
        .unwrap();
    let response = send(&create_router(app), Method::GET, "/swagger-ui/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
