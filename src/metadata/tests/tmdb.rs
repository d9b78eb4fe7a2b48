use super::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[test]
fn titles_are_cleaned() {
    assert_eq!(clean_title("Big Film [Official] (1080p HD)"), "Big Film");
    assert_eq!(clean_title("Big Film 720p  (2019)"), "Big Film (2019)");
    assert_eq!(clean_title(""), "");
}

#[test]
fn similarity_ratio() {
    assert_eq!(similarity("Heat", "heat"), 1.0);
    assert_eq!(similarity("", ""), 1.0);
    assert_eq!(similarity("abc", "xyz"), 0.0);
    let ratio = similarity("The Matrix", "Matrix");
    assert!((ratio - 0.75).abs() < 1e-9, "{ratio}");
}

#[tokio::test]
async fn search_picks_best_match_above_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .and(query_param("api_key", "tmdb-key"))
        .and(query_param("query", "The Matrix"))
        .and(query_param("year", "1999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": 1, "title": "Something Else"},
                {"id": 603, "title": "The Matrix"},
                {"id": 604, "title": "The Matrix Reloaded"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/movie"))
        .and(query_param("query", "Zzz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 2, "title": "Completely different"}]
        })))
        .mount(&server)
        .await;

    let tmdb = TmdbClient::from_config(&config_for(&server)).unwrap().unwrap();
    let hit = tmdb.search_movie("The Matrix", Some("1999")).await.unwrap();
    assert_eq!(hit.map(|m| m.id), Some(603));
    assert_eq!(tmdb.search_movie("Zzz", None).await.unwrap(), None);
}

#[tokio::test]
async fn details_and_poster() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/603"))
        .and(query_param("append_to_response", "credits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 603,
            "title": "The Matrix",
            "overview": "A hacker learns the truth.",
            "release_date": "1999-03-31",
            "poster_path": "/p.jpg",
            "genres": [{"name": "Action"}, {"name": "Science Fiction"}],
            "credits": {"cast": [
                {"name": "A"}, {"name": "B"}, {"name": "C"},
                {"name": "D"}, {"name": "E"}, {"name": "F"}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/p.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .mount(&server)
        .await;

    let tmdb = TmdbClient::from_config(&config_for(&server))
        .unwrap()
        .unwrap()
        .with_image_base(format!("{}/img", server.uri()));
    let details = tmdb.movie_details(603).await.unwrap();
    assert_eq!(details.year(), Some("1999"));
    assert_eq!(details.genres(), vec!["Action", "Science Fiction"]);
    assert_eq!(details.actors(5).len(), 5);

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("poster.jpg");
    tmdb.download_poster(details.poster_path.as_deref().unwrap(), &dest)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg");
}

#[tokio::test]
async fn http_errors_become_lookup_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tmdb = TmdbClient::from_config(&config_for(&server)).unwrap().unwrap();
    assert!(matches!(
        tmdb.movie_details(1).await,
        Err(crate::Error::Metadata(MetadataError::Lookup { .. }))
    ));
}
