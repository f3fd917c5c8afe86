mod common;

use axum::http::StatusCode;
use common::{body_json, body_string, valid_request, TestApp, SIGNING_SECRET};
use leadgen_service::services::{unsubscribe::unsubscribe_token, LeadStore};

fn link(email: &str, token: &str) -> String {
    let query = serde_urlencoded::to_string([("email", email), ("token", token)]).unwrap();
    format!("/unsubscribe?{query}")
}

fn signed_link(email: &str) -> String {
    let token = unsubscribe_token(SIGNING_SECRET, email).unwrap();
    link(email, &token)
}

#[tokio::test]
async fn valid_link_unsubscribes_lead() {
    let app = TestApp::spawn();
    app.generate(valid_request("jane@example.com", "Commuter Mug"), "10.1.0.1")
        .await;

    let response = app.get(&signed_link("jane@example.com")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(response.headers()["content-security-policy"]
        .to_str()
        .unwrap()
        .contains("style-src 'unsafe-inline'"));

    let html = body_string(response).await;
    assert!(html.contains("You have been unsubscribed"));

    let lead = app
        .leads
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(lead.unsubscribed);
}

#[tokio::test]
async fn repeated_visit_reports_already_unsubscribed() {
    let app = TestApp::spawn();
    let url = signed_link("jane@example.com");

    app.get(&url).await;
    let response = app.get(&url).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("You were already unsubscribed"));
}

#[tokio::test]
async fn unknown_address_is_suppressed() {
    let app = TestApp::spawn();

    let response = app.get(&signed_link("stranger@example.com")).await;
    assert_eq!(response.status(), StatusCode::OK);

    // A later request from the same address must not trigger email.
    let body = body_json(
        app.generate(valid_request("stranger@example.com", "Mug"), "10.1.0.2")
            .await,
    )
    .await;
    assert_eq!(body["emails"]["sent"], 0);
    assert_eq!(app.email.send_count(), 0);
}

#[tokio::test]
async fn tampered_token_is_rejected() {
    let app = TestApp::spawn();
    let token = unsubscribe_token(SIGNING_SECRET, "jane@example.com").unwrap();

    let response = app.get(&link("mallory@example.com", &token)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_string(response).await;
    assert!(html.contains("This unsubscribe link is not valid"));
    assert!(app
        .leads
        .find_by_email("mallory@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn missing_parameters_are_rejected() {
    let app = TestApp::spawn();

    let response = app.get("/unsubscribe").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/unsubscribe?email=jane%40example.com").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn one_click_post_unsubscribes() {
    let app = TestApp::spawn();

    let response = app.post(&signed_link("Jane@Example.com")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unsubscribed");

    let lead = app
        .leads
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(lead.unsubscribed);
}

#[tokio::test]
async fn one_click_post_with_bad_token_returns_400() {
    let app = TestApp::spawn();

    let response = app.post(&link("jane@example.com", "deadbeef")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().is_some());
}
