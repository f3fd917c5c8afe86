mod common;

use axum::http::StatusCode;
use common::{valid_request, TestApp};

#[tokio::test]
async fn third_request_in_window_is_rejected() {
    let app = TestApp::builder().max_requests(2).build();

    for expected_remaining in ["1", "0"] {
        let response = app
            .generate(valid_request("jane@example.com", "Commuter Mug"), "203.0.113.7")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], expected_remaining);
    }

    let response = app
        .generate(valid_request("jane@example.com", "Commuter Mug"), "203.0.113.7")
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    // The limiter runs before the handler, so the provider is not called again.
    assert_eq!(app.text.calls(), 1);
}

#[tokio::test]
async fn limits_are_tracked_per_client() {
    let app = TestApp::builder().max_requests(1).build();

    let first = app
        .generate(valid_request("a@example.com", "Mug"), "203.0.113.10")
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let other_client = app
        .generate(valid_request("b@example.com", "Mug"), "203.0.113.11")
        .await;
    assert_eq!(other_client.status(), StatusCode::OK);

    let repeat = app
        .generate(valid_request("a@example.com", "Mug"), "203.0.113.10")
        .await;
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn forwarded_chain_uses_originating_client() {
    let app = TestApp::builder().max_requests(1).build();

    let first = app
        .generate(valid_request("a@example.com", "Mug"), "198.51.100.1, 10.0.0.1")
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    // Same proxy, different client.
    let second = app
        .generate(valid_request("b@example.com", "Mug"), "198.51.100.2, 10.0.0.1")
        .await;
    assert_eq!(second.status(), StatusCode::OK);
}

#[tokio::test]
async fn other_routes_are_not_limited() {
    let app = TestApp::builder().max_requests(1).build();

    app.generate(valid_request("a@example.com", "Mug"), "203.0.113.20")
        .await;

    for _ in 0..3 {
        let response = app.get("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key("x-ratelimit-limit"));
    }
}
