#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` over `HttpTransport` using wiremock.

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::{Map, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use telesync_api::{ApiClient, Credential, Device, Error, Event, HttpTransport, endpoints};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let base = format!("{}/mobile_apps", server.uri());
    let transport = HttpTransport::from_reqwest(&base, reqwest::Client::new()).unwrap();
    (server, ApiClient::new(Arc::new(transport)))
}

fn token(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

fn device() -> Device {
    Device::detect(Some("ADV-1"), "2.0.0")
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_register_device_returns_credential() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mobile_apps/app-1/devices"))
        .and(header("Content-Type", "application/json"))
        .and(header("Accept", "application/json"))
        .and(body_partial_json(json!({ "device": { "advertising_id": "ADV-1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth_token": "tok-1",
            "device": { "device_id": "dev-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resource = endpoints::register_device("app-1", &device());
    let cred = client.request(None, &resource).await.unwrap();

    assert_eq!(cred, Credential::new("dev-1", "tok-1"));
}

#[tokio::test]
async fn test_authorization_header_uses_mobile_app_token_scheme() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/mobile_apps/app-1/devices/dev-1"))
        .and(header("Authorization", "MobileAppToken tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let resource = endpoints::unregister_device("app-1", "dev-1");
    client.request(Some(&token("tok-1")), &resource).await.unwrap();
}

#[tokio::test]
async fn test_track_events_sends_type_header() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mobile_apps/app-1/devices/dev-1/events"))
        .and(header("X-Event-Type", "launch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    let events = vec![Event::new("launch", Map::new())];
    let resource = endpoints::track_events("app-1", "dev-1", &events);
    client.request(Some(&token("tok-1")), &resource).await.unwrap();
}

// ── Error classification tests ──────────────────────────────────────

#[tokio::test]
async fn test_401_is_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/mobile_apps/app-1/devices/dev-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;

    let resource = endpoints::update_device("app-1", "dev-1", &device());
    let result = client.request(Some(&token("old")), &resource).await;

    assert_eq!(result, Err(Error::Unauthorized));
}

#[tokio::test]
async fn test_503_is_retryable_invalid_response() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mobile_apps/app-1/devices/dev-1/assign"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let resource = endpoints::associate_person("app-1", "dev-1", "person-9");
    let err = client
        .request(Some(&token("tok")), &resource)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        Error::InvalidResponse {
            status: 503,
            body: "maintenance".into()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_422_is_not_retryable() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mobile_apps/app-1/devices/dev-1/push_registration"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad token"))
        .mount(&server)
        .await;

    let resource = endpoints::register_push("app-1", "dev-1", "ABCD");
    let err = client
        .request(Some(&token("tok")), &resource)
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.status(), Some(422));
}

#[tokio::test]
async fn test_garbage_credential_body_is_could_not_parse() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mobile_apps/app-1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let resource = endpoints::register_device("app-1", &device());
    let result = client.request(None, &resource).await;

    assert!(
        matches!(result, Err(Error::CouldNotParse { ref body }) if body.contains("oops")),
        "expected CouldNotParse, got: {result:?}"
    );
}

#[tokio::test]
async fn test_empty_credential_body_is_no_data() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/mobile_apps/app-1/devices"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let resource = endpoints::register_device("app-1", &device());
    let result = client.request(None, &resource).await;

    assert_eq!(result, Err(Error::NoData));
}

#[tokio::test]
async fn test_connection_refused_is_unreachable() {
    let server = MockServer::start().await;
    let base = format!("{}/mobile_apps", server.uri());
    drop(server);

    let transport = HttpTransport::from_reqwest(&base, reqwest::Client::new()).unwrap();
    let client = ApiClient::new(Arc::new(transport));

    let resource = endpoints::unregister_push("app-1", "dev-1");
    let result = client.request(None, &resource).await;

    assert!(
        matches!(result, Err(Error::Unreachable { .. })),
        "expected Unreachable, got: {result:?}"
    );
}
