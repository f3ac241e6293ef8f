//! Media validation against a live mock HTTP server.
//!
//! The relay endpoint is mocked on the same server so call counts can be
//! asserted with `.expect(n)`.

use quarry_search::media::{MediaConfig, MediaReason, MediaValidator, ProbeMethod};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn validator(server: &MockServer) -> MediaValidator {
    MediaValidator::new(MediaConfig {
        direct_timeout_ms: 2_000,
        proxy_timeout_ms: 1_000,
        relay_base_url: Some(server.uri()),
    })
    .expect("validator")
}

async fn relay_never_called(server: &MockServer) {
    Mock::given(path("/relay"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn direct_image_validates_without_relay() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/cat.png"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .expect(1)
        .mount(&server)
        .await;
    relay_never_called(&server).await;

    let url = format!("{}/cat.png", server.uri());
    let verdict = validator(&server).validate(&url).await;

    assert!(verdict.valid);
    assert_eq!(verdict.method, ProbeMethod::Direct);
    assert!(verdict.resolved_url.is_none());
    assert!(verdict.reason_code.is_none());
}

#[tokio::test]
async fn not_found_never_reaches_relay() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    relay_never_called(&server).await;

    let url = format!("{}/gone.png", server.uri());
    let verdict = validator(&server).validate(&url).await;

    assert!(!verdict.valid);
    assert_eq!(verdict.reason_code, Some(MediaReason::NotFound));
}

#[tokio::test]
async fn server_error_is_http_error_without_relay() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/broken.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    relay_never_called(&server).await;

    let url = format!("{}/broken.png", server.uri());
    let verdict = validator(&server).validate(&url).await;
    assert_eq!(verdict.reason_code, Some(MediaReason::HttpError));
}

#[tokio::test]
async fn html_page_is_not_an_image() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .mount(&server)
        .await;
    relay_never_called(&server).await;

    let url = format!("{}/page", server.uri());
    let verdict = validator(&server).validate(&url).await;
    assert_eq!(verdict.reason_code, Some(MediaReason::NotAnImage));
}

#[tokio::test]
async fn redirect_sets_resolved_url() {
    let server = MockServer::start().await;
    let target = format!("{}/new.jpg", server.uri());
    Mock::given(method("HEAD"))
        .and(path("/old.jpg"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", target.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/new.jpg"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/jpeg"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/old.jpg", server.uri());
    let verdict = validator(&server).validate(&url).await;

    assert!(verdict.valid);
    assert_eq!(verdict.resolved_url.as_deref(), Some(target.as_str()));
}

#[tokio::test]
async fn forbidden_falls_back_to_relay_once() {
    let server = MockServer::start().await;
    let url = format!("{}/guarded.png", server.uri());
    Mock::given(method("HEAD"))
        .and(path("/guarded.png"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/relay"))
        .and(query_param("url", url.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .insert_header("x-final-url", "https://origin.example/guarded.png"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let verdict = validator(&server).validate(&url).await;

    assert!(verdict.valid);
    assert_eq!(verdict.method, ProbeMethod::Proxy);
    assert_eq!(verdict.resolved_url.as_deref(), Some("https://origin.example/guarded.png"));
}

#[tokio::test]
async fn cross_origin_policy_triggers_relay_exactly_once() {
    let server = MockServer::start().await;
    let url = format!("{}/corp.png", server.uri());
    Mock::given(method("HEAD"))
        .and(path("/corp.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .insert_header("cross-origin-resource-policy", "same-origin"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let verdict = validator(&server).validate(&url).await;

    assert!(verdict.valid);
    assert_eq!(verdict.method, ProbeMethod::Proxy);
    assert!(verdict.resolved_url.is_none());
}

#[tokio::test]
async fn relay_under_path_prefix_is_reached() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/guarded.png"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/gateway/relay"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .expect(1)
        .mount(&server)
        .await;
    relay_never_called(&server).await;

    let validator = MediaValidator::new(MediaConfig {
        direct_timeout_ms: 2_000,
        proxy_timeout_ms: 1_000,
        relay_base_url: Some(format!("{}/gateway", server.uri())),
    })
    .expect("validator");
    let verdict = validator.validate(&format!("{}/guarded.png", server.uri())).await;

    assert!(verdict.valid);
    assert_eq!(verdict.method, ProbeMethod::Proxy);
}

#[tokio::test]
async fn relay_failure_is_proxy_failed() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/guarded.png"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/guarded.png", server.uri());
    let verdict = validator(&server).validate(&url).await;

    assert!(!verdict.valid);
    assert_eq!(verdict.method, ProbeMethod::Proxy);
    assert_eq!(verdict.reason_code, Some(MediaReason::ProxyFailed));
}

#[tokio::test]
async fn slow_origin_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/slow.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    relay_never_called(&server).await;

    let validator = MediaValidator::new(MediaConfig {
        direct_timeout_ms: 200,
        proxy_timeout_ms: 200,
        relay_base_url: Some(server.uri()),
    })
    .expect("validator");
    let url = format!("{}/slow.png", server.uri());
    let verdict = validator.validate(&url).await;

    assert_eq!(verdict.reason_code, Some(MediaReason::NetworkError));
}
