mod common;

use axum::http::StatusCode;
use common::{body_string, TestApp};

#[tokio::test]
async fn privacy_page_renders_site_details() {
    let app = TestApp::spawn();

    let response = app.get("/privacy").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(response.headers()["x-frame-options"], "DENY");

    let html = body_string(response).await;
    assert!(html.contains("Example Labs"));
    assert!(html.contains("privacy@example.test"));
    assert!(html.contains("March 1, 2025"));
}
