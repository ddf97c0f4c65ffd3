//! Full HTTP round trips: reqwest client -> ReelServer -> wiremock upstream.

use reel_proxy::config::{ConnectionPoolConfig, ListenConfig};
use reel_proxy::hooks::ModeSetting;
use reel_proxy::proxy::{create_http_client, HyperUpstream, ReelServer};
use reel_proxy::{Options, RecordMode, RequestHandler};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_reel(options: Options) -> (SocketAddr, Arc<RequestHandler>) {
    let client = create_http_client(&ConnectionPoolConfig::default()).unwrap();
    let upstream = Arc::new(HyperUpstream::new(client));
    let handler = Arc::new(RequestHandler::new(Arc::new(options), upstream).unwrap());
    let server = ReelServer::new(Arc::clone(&handler), &ListenConfig::default()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    (addr, handler)
}

fn options(upstream: &MockServer, tapes: &TempDir, mode: RecordMode) -> Options {
    Options {
        proxy_url: Some(upstream.uri()),
        tapes_path: Some(tapes.path().to_path_buf()),
        record_mode: ModeSetting::Fixed(mode),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_records_then_replays_over_http() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test/1"))
        .and(body_json(json!({"foo": "bar"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
        .expect(1)
        .mount(&upstream)
        .await;

    let tapes = TempDir::new().unwrap();
    let (addr, handler) = start_reel(options(&upstream, &tapes, RecordMode::New)).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/test/1");

    let first = client
        .post(&url)
        .json(&json!({"foo": "bar"}))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);
    assert_eq!(first.headers()["x-reel-recorded"], "true");
    assert_eq!(first.json::<Value>().await.unwrap(), json!({"created": true}));

    let second = client
        .post(&url)
        .json(&json!({"foo": "bar"}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 201);
    assert_eq!(second.headers()["x-reel-replayed"], "true");
    assert!(second.headers().get("x-reel-recorded").is_none());
    assert_eq!(second.json::<Value>().await.unwrap(), json!({"created": true}));

    assert_eq!(handler.stores().all_tapes().len(), 1);
    assert!(tapes.path().join("unnamed-1.json").is_file());
}

#[tokio::test]
async fn test_proxy_mode_forwards_query_and_marks_response() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("live"))
        .expect(2)
        .mount(&upstream)
        .await;

    let tapes = TempDir::new().unwrap();
    let (addr, handler) = start_reel(options(&upstream, &tapes, RecordMode::Proxy)).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .get(format!("http://{addr}/search?q=reel"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.headers()["x-reel-proxied"], "true");
        assert_eq!(response.text().await.unwrap(), "live");
    }

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received[0].url.query(), Some("q=reel"));
    assert!(handler.stores().all_tapes().is_empty());
}

#[tokio::test]
async fn test_disabled_miss_is_404_without_markers() {
    let upstream = MockServer::start().await;
    let tapes = TempDir::new().unwrap();
    let (addr, _) = start_reel(options(&upstream, &tapes, RecordMode::Disabled)).await;

    let response = reqwest::get(format!("http://{addr}/missing")).await.unwrap();
    assert_eq!(response.status(), 404);
    assert!(response.headers().get("x-reel-replayed").is_none());
    assert_eq!(response.text().await.unwrap(), "reel - tape not found");
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_redirect_is_passed_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .expect(0)
        .mount(&upstream)
        .await;

    let tapes = TempDir::new().unwrap();
    let (addr, _) = start_reel(options(&upstream, &tapes, RecordMode::Proxy)).await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client.get(format!("http://{addr}/old")).send().await.unwrap();
    assert_eq!(response.status(), 302);
    assert_eq!(response.headers()["location"], "/new");
    assert_eq!(response.headers()["x-reel-proxied"], "true");
}
