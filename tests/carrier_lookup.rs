//! Integration tests for the HTTP carrier classifier.
//!
//! Each test spins up an Axum server on a random port that stands in for the
//! phone-intelligence API.

use std::collections::HashMap;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use localis::carrier::{CarrierClassifier, Indeterminate, LineClassifier, LineStatus};
use localis::error::CarrierError;

/// Canned answers keyed by the `phone` query parameter.
async fn lookup(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
    if params.get("api_key").map(String::as_str) != Some("test-key") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }

    let body: Value = match params.get("phone").map(String::as_str) {
        Some("+14155550001") => json!({
            "phone": "14155550001",
            "phone_carrier": { "name": "T-Mobile USA", "line_type": "mobile" }
        }),
        Some("+14155550002") => json!({
            "phone_carrier": { "name": "Google Voice", "line_type": "voip" }
        }),
        Some("+14155550003") => json!({
            "phone_carrier": { "name": "", "line_type": "Unknown" }
        }),
        Some("+14155550004") => json!({ "phone_valid": true }),
        Some("+14155550005") => {
            return (StatusCode::OK, "<html>gateway hiccup</html>").into_response();
        }
        Some("+14155550006") => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            json!({ "phone_carrier": { "line_type": "landline" } })
        }
        Some("+14155550007") => {
            return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
        }
        _ => json!({ "phone_carrier": { "line_type": "Landline" } }),
    };
    Json(body).into_response()
}

/// Start the fake lookup service and return its base URL.
async fn start_server() -> String {
    let app = Router::new().route("/v1/", get(lookup));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}/v1/")
}

fn classifier(url: &str, key: &str) -> CarrierClassifier {
    CarrierClassifier::new(
        Some(SecretString::from(key.to_string())),
        url,
        Duration::from_secs(1),
    )
}

#[tokio::test]
async fn mobile_line_is_allowed() {
    let url = start_server().await;
    let c = classifier(&url, "test-key");
    assert!(matches!(c.classify("+14155550001").await, LineStatus::Mobile));
    assert!(c.is_mobile("+14155550001").await);
}

#[tokio::test]
async fn voip_line_is_rejected() {
    let url = start_server().await;
    let c = classifier(&url, "test-key");
    match c.classify("+14155550002").await {
        LineStatus::NonMobile { line_type } => assert_eq!(line_type, "voip"),
        other => panic!("expected NonMobile, got {other:?}"),
    }
    assert!(!c.is_mobile("+14155550002").await);
}

#[tokio::test]
async fn landline_is_rejected() {
    let url = start_server().await;
    let c = classifier(&url, "test-key");
    assert!(!c.is_mobile("+14155559999").await);
}

#[tokio::test]
async fn unknown_line_type_fails_open() {
    let url = start_server().await;
    let c = classifier(&url, "test-key");
    assert!(matches!(
        c.classify("+14155550003").await,
        LineStatus::Indeterminate(Indeterminate::UnknownLineType)
    ));
}

#[tokio::test]
async fn missing_carrier_block_fails_open() {
    let url = start_server().await;
    let c = classifier(&url, "test-key");
    assert!(matches!(
        c.classify("+14155550004").await,
        LineStatus::Indeterminate(Indeterminate::UnknownLineType)
    ));
}

#[tokio::test]
async fn malformed_body_fails_open() {
    let url = start_server().await;
    let c = classifier(&url, "test-key");
    let status = c.classify("+14155550005").await;
    assert!(
        matches!(
            status,
            LineStatus::Indeterminate(Indeterminate::LookupFailed(CarrierError::Malformed(_)))
        ),
        "got {status:?}"
    );
    assert!(status.allows());
}

#[tokio::test]
async fn timeout_fails_open() {
    let url = start_server().await;
    let c = classifier(&url, "test-key");
    let status = c.classify("+14155550006").await;
    assert!(
        matches!(
            status,
            LineStatus::Indeterminate(Indeterminate::LookupFailed(CarrierError::Timeout))
        ),
        "got {status:?}"
    );
    assert!(status.allows());
}

#[tokio::test]
async fn error_status_fails_open() {
    let url = start_server().await;
    let c = classifier(&url, "test-key");
    let status = c.classify("+14155550007").await;
    assert!(matches!(
        status,
        LineStatus::Indeterminate(Indeterminate::LookupFailed(CarrierError::Status {
            status: 429
        }))
    ));
    assert!(status.allows());
}

#[tokio::test]
async fn rejected_credential_fails_open() {
    let url = start_server().await;
    let c = classifier(&url, "wrong-key");
    assert!(c.is_mobile("+14155550002").await);
}
