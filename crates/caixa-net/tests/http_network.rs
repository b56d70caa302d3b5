//! HttpNetwork against a local mock origin.

use std::sync::Arc;

use caixa_net::{HttpNetwork, LoaderConfig};
use caixa_sw::{
    CacheStorage, Clients, EventOutcome, FetchRequest, Network, NotificationCenter, PromiseWorker,
    ResponseType, SwError, WorkerConfig, WorkerEvent, WorkerHost,
};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn network() -> HttpNetwork {
    HttpNetwork::new(LoaderConfig::default()).unwrap()
}

fn at(server: &MockServer, p: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(p).unwrap()
}

#[tokio::test]
async fn same_origin_response_is_basic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>caixa</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let response = network()
        .fetch(&FetchRequest::get(at(&server, "/index.html")))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.response_type, ResponseType::Basic);
    assert_eq!(response.body, b"<html>caixa</html>");
    assert_eq!(response.headers.get("content-type").map(String::as_str), Some("text/html"));
    assert!(response.is_cacheable());
}

#[tokio::test]
async fn http_errors_are_responses() {
    let server = MockServer::start().await;
    Mock::given(path("/missing.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let response = network()
        .fetch(&FetchRequest::get(at(&server, "/missing.json")))
        .await
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.status_text, "Not Found");
    assert!(!response.is_cacheable());
}

#[tokio::test]
async fn request_headers_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(path("/promessas_saude.json"))
        .and(header("x-caixa", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let request = FetchRequest::get(at(&server, "/promessas_saude.json")).header("x-caixa", "1");
    let response = network().fetch(&request).await.unwrap();
    assert_eq!(response.status, 200);
}

fn accept_languages(request: &wiremock::Request) -> Vec<String> {
    request
        .headers
        .get_all("accept-language")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn caller_accept_language_replaces_default() {
    let server = MockServer::start().await;
    Mock::given(path("/promessas_amor.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let network = network();
    network
        .fetch(&FetchRequest::get(at(&server, "/promessas_amor.json")).header("Accept-Language", "en"))
        .await
        .unwrap();
    network
        .fetch(&FetchRequest::get(at(&server, "/promessas_amor.json")))
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(accept_languages(&received[0]), vec!["en"]);
    assert_eq!(
        accept_languages(&received[1]),
        vec![LoaderConfig::default().accept_language]
    );
}

#[tokio::test]
async fn repeated_response_headers_are_kept() {
    let server = MockServer::start().await;
    Mock::given(path("/promessas_fe.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .append_header("vary", "Accept")
                .append_header("vary", "Accept-Encoding"),
        )
        .mount(&server)
        .await;

    let response = network()
        .fetch(&FetchRequest::get(at(&server, "/promessas_fe.json")))
        .await
        .unwrap();
    assert_eq!(
        response.headers.get("vary").map(String::as_str),
        Some("Accept, Accept-Encoding")
    );
}

#[tokio::test]
async fn unreachable_origin_is_a_network_error() {
    // Nothing listens on port 9 (discard) on a test machine.
    let request = FetchRequest::get(Url::parse("http://127.0.0.1:9/").unwrap());
    let result = network().fetch(&request).await;
    assert!(matches!(result, Err(SwError::Network(_))));
}

#[tokio::test]
async fn worker_precaches_from_live_origin() {
    let server = MockServer::start().await;
    for p in ["/", "/index.html", "/pwa_manifest.json"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("served {p}")))
            .mount(&server)
            .await;
    }

    let config = WorkerConfig::new(Url::parse(&server.uri()).unwrap())
        .with_precache(["/", "/index.html", "/pwa_manifest.json"]);
    let host = WorkerHost::new(
        CacheStorage::new().shared(),
        Arc::new(network()),
        Arc::new(NotificationCenter::new()),
        Arc::new(Clients::new()),
    );
    let worker = PromiseWorker::new(config, host).unwrap();

    worker.dispatch(WorkerEvent::Install).await.unwrap();
    worker.dispatch(WorkerEvent::Activate).await.unwrap();

    let outcome = worker
        .dispatch(WorkerEvent::Fetch(FetchRequest::get(at(&server, "/pwa_manifest.json"))))
        .await
        .unwrap();
    match outcome {
        EventOutcome::RespondWith(response) => {
            assert!(response.from_cache);
            assert_eq!(response.body, b"served /pwa_manifest.json");
        }
        other => panic!("expected a cached response, got {other:?}"),
    }
}
