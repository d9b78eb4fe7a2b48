use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_partial_json(json!({"apikey": "tvdb-key", "pin": "1234"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"token": "tok"}})))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Show"))
        .and(query_param("type", "series"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"tvdb_id": "4242"}]})),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn resolves_items_by_air_date() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_search(&server).await;
    Mock::given(method("GET"))
        .and(path("/series/4242/episodes/default"))
        .and(query_param("airDate", "2019-05-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"episodes": [{"seasonNumber": 15, "number": 7, "aired": "2019-05-01"}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/series/4242/episodes/default"))
        .and(query_param("airDate", "2019-05-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"season": "15", "episodeNumber": "8"}]
        })))
        .mount(&server)
        .await;

    let tvdb = TvdbClient::from_config(&config_for(&server)).unwrap().unwrap();
    let resolver = AirdateResolver::new(Arc::new(tvdb));
    let items = vec![
        item("Morning", Some("20190501")),
        item("Next day 2nd May 2019", None),
    ];

    let matches = resolver.resolve("Show", &items).await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!((matches[0].season, matches[0].episode), (15, 7));
    assert_eq!(matches[0].description, "Summary line");
    assert_eq!((matches[1].season, matches[1].episode), (15, 8));
    assert_eq!(matches[1].air_date.as_deref(), Some("2019-05-02"));
}

#[tokio::test]
async fn any_unresolved_item_fails_the_batch() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_search(&server).await;
    Mock::given(method("GET"))
        .and(path("/series/4242/episodes/default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"episodes": []}})))
        .mount(&server)
        .await;

    let tvdb = TvdbClient::from_config(&config_for(&server)).unwrap().unwrap();
    let resolver = AirdateResolver::new(Arc::new(tvdb));

    let err = resolver
        .resolve("Show", &[item("Morning", Some("20190501"))])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("TVDB lookup failed for 'Show' on 2019-05-01"));

    let err = resolver
        .resolve("Show", &[item("No date here", None)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        crate::Error::Metadata(MetadataError::Resolution { .. })
    ));
}

#[tokio::test]
async fn failed_login_is_a_lookup_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let tvdb = TvdbClient::from_config(&config_for(&server)).unwrap().unwrap();
    let err = tvdb.episode_by_air_date("Show", "2019-05-01").await.unwrap_err();
    assert!(matches!(
        err,
        crate::Error::Metadata(MetadataError::Lookup { ref service, .. }) if service == "tvdb"
    ));
}

#[tokio::test]
async fn unknown_series_is_none() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let tvdb = TvdbClient::from_config(&config_for(&server)).unwrap().unwrap();
    assert_eq!(tvdb.episode_by_air_date("Show", "2019-05-01").await.unwrap(), None);
}

#[test]
fn client_requires_api_key() {
    let config = MetadataConfig::default();
    assert!(TvdbClient::from_config(&config).unwrap().is_none());
}
