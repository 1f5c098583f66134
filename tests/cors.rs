//! Cross-origin handling: preflights, allowed and denied origins.

mod common;

use common::*;
use reqwest::Method;

fn allow(config: &mut cloudfauxnt::ProxyConfig, origins: &[&str]) {
    config.cors.enabled = true;
    config.cors.allowed_origins = origins.iter().map(|o| o.to_string()).collect();
}

#[tokio::test]
async fn test_preflight_is_answered_without_contacting_the_origin() {
    let (origin_addr, recorded) = start_mock_backend("never", "").await;
    let edge = start_edge(|config, _| {
        allow(config, &["https://app.example"]);
        config.origins.push(origin("public", origin_addr, &["/public/*"], false));
    })
    .await;

    let res = client()
        .request(Method::OPTIONS, edge.url("/public/a.txt"))
        .header("origin", "https://app.example")
        .header("access-control-request-method", "GET")
        .header("access-control-request-headers", "range")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 204);
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], "https://app.example");
    assert_eq!(headers["access-control-allow-methods"], "GET, HEAD, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "range");
    assert_eq!(headers["access-control-max-age"], "3600");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["server"], "CloudFauxnt");
    assert!(headers.contains_key("x-amz-cf-id"));
    assert_eq!(recorded.count(), 0);
}

#[tokio::test]
async fn test_preflight_skips_the_signature_check() {
    let (origin_addr, recorded) = start_mock_backend("never", "").await;
    let edge = start_edge(|config, _| {
        allow(config, &["*"]);
        with_test_key(config);
        config.origins.push(origin("private", origin_addr, &["/private/*"], true));
    })
    .await;

    let res = client()
        .request(Method::OPTIONS, edge.url("/private/a.txt"))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 204);
    assert_eq!(recorded.count(), 0);
}

#[tokio::test]
async fn test_preflight_to_an_unmatched_path_is_answered() {
    let (origin_addr, recorded) = start_mock_backend("never", "").await;
    let edge = start_edge(|config, _| {
        allow(config, &["https://app.example"]);
        config.origins.push(origin("public", origin_addr, &["/public/*"], false));
    })
    .await;

    let res = client()
        .request(Method::OPTIONS, edge.url("/any/path"))
        .header("origin", "https://app.example")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 204);
    assert_eq!(res.headers()["access-control-allow-origin"], "https://app.example");
    assert_eq!(res.headers()["access-control-allow-methods"], "GET, HEAD, OPTIONS");
    assert_eq!(recorded.count(), 0);
}

#[tokio::test]
async fn test_health_carries_cors_headers() {
    let edge = start_edge(|config, _| {
        allow(config, &["https://app.example"]);
    })
    .await;

    let http = client();
    let allowed = http
        .get(edge.url("/health"))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), 200);
    assert_eq!(allowed.headers()["access-control-allow-origin"], "https://app.example");
    assert_eq!(allowed.headers()["access-control-allow-credentials"], "true");

    let denied = http
        .get(edge.url("/health"))
        .header("origin", "https://evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 200);
    assert!(!denied.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_disallowed_origin_is_forbidden_on_unmatched_paths() {
    let edge = start_edge(|config, _| {
        allow(config, &["https://app.example"]);
    })
    .await;

    let res = client()
        .get(edge.url("/nowhere"))
        .header("origin", "https://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn test_allowed_origin_headers_ride_on_forwarded_responses() {
    let (origin_addr, _) = start_mock_backend("ok", "").await;
    let edge = start_edge(|config, _| {
        allow(config, &["*.example.com"]);
        config.origins.push(origin("public", origin_addr, &["/public/*"], false));
    })
    .await;

    let res = client()
        .get(edge.url("/public/a.txt"))
        .header("origin", "https://cdn.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "https://cdn.example.com");
    assert_eq!(res.headers()["vary"], "Origin");
}

#[tokio::test]
async fn test_allowed_origin_headers_ride_on_error_responses() {
    let (origin_addr, _) = start_mock_backend("never", "").await;
    let edge = start_edge(|config, _| {
        allow(config, &["https://app.example"]);
        with_test_key(config);
        config.origins.push(origin("private", origin_addr, &["/private/*"], true));
    })
    .await;

    let http = client();
    let denied = http
        .get(edge.url("/private/a.txt"))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 403);
    assert_eq!(denied.headers()["access-control-allow-origin"], "https://app.example");

    let missing = http
        .get(edge.url("/nowhere"))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    assert_eq!(missing.headers()["access-control-allow-origin"], "https://app.example");
}

#[tokio::test]
async fn test_disallowed_origin_is_forbidden() {
    let (origin_addr, recorded) = start_mock_backend("never", "").await;
    let edge = start_edge(|config, _| {
        allow(config, &["https://app.example"]);
        config.origins.push(origin("public", origin_addr, &["/public/*"], false));
    })
    .await;

    let res = client()
        .get(edge.url("/public/a.txt"))
        .header("origin", "https://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 403);
    assert!(!res.headers().contains_key("access-control-allow-origin"));
    assert_eq!(recorded.count(), 0);
}

#[tokio::test]
async fn test_requests_without_origin_bypass_cors() {
    let (origin_addr, recorded) = start_mock_backend("ok", "").await;
    let edge = start_edge(|config, _| {
        allow(config, &["https://app.example"]);
        config.origins.push(origin("public", origin_addr, &["/public/*"], false));
    })
    .await;

    let res = client().get(edge.url("/public/a.txt")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert!(!res.headers().contains_key("access-control-allow-origin"));
    assert_eq!(recorded.count(), 1);
}

#[tokio::test]
async fn test_options_is_forwarded_when_cors_is_disabled() {
    let (origin_addr, recorded) = start_mock_backend("", "Allow: GET, OPTIONS\r\n").await;
    let edge = start_edge(|config, _| {
        config.origins.push(origin("public", origin_addr, &["/public/*"], false));
    })
    .await;

    let res = client()
        .request(Method::OPTIONS, edge.url("/public/a.txt"))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(!res.headers().contains_key("access-control-allow-origin"));
    assert_eq!(recorded.count(), 1);
    assert!(recorded.last_request_line().unwrap().starts_with("OPTIONS /public/a.txt"));
}
