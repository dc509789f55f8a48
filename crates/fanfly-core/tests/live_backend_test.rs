#![allow(clippy::unwrap_used)]
// `FanHub` over the live HTTP backend, with the vendor API mocked by wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fanfly_core::{CoreError, DeviceId, FanHub, HubConfig, StateOrigin};

// ── Helpers ─────────────────────────────────────────────────────────

async fn vendor() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/get-access-token"))
        .and(header("x-api-key", "live-key"))
        .and(header("authorization", "Bearer live-refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "live-access", "expires_in": 3600})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/get-devices"))
        .and(header("authorization", "Bearer live-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                {"device_id": "F1", "name": "Porch", "device_type": "ceiling_fan", "is_online": true},
                {"device_id": "F2", "name": "Attic", "device_type": "table_fan", "is_online": false}
            ]
        })))
        .mount(&server)
        .await;

    server
}

fn hub_for(server: &MockServer) -> FanHub {
    let config = HubConfig::live(Url::parse(&server.uri()).unwrap());
    FanHub::new(config).unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_live_login_and_command_use_exact_wire_format() {
    let server = vendor().await;

    Mock::given(method("POST"))
        .and(path("/api/send-command"))
        .and(header("x-api-key", "live-key"))
        .and(header("authorization", "Bearer live-access"))
        .and(body_json(json!({"device_id": "F1", "command": "is_powered", "value": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "queued"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/get-device-state"))
        .and(query_param("device_id", "F1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_id": "F1",
            "state": {"is_powered": true, "speed": 2}
        })))
        .mount(&server)
        .await;

    let hub = hub_for(&server);
    assert!(!hub.backend().is_simulated());
    hub.login("live-key", "live-refresh").await.unwrap();
    assert_eq!(hub.devices().len(), 2);

    let receipt = hub
        .send_command(&DeviceId::from("F1"), "power", Some(json!(true)))
        .await
        .unwrap();

    assert_eq!(receipt.message.as_deref(), Some("queued"));
    assert!(receipt.reconciled);
    let cached = hub.cached(&DeviceId::from("F1")).unwrap();
    assert_eq!(cached.origin, StateOrigin::Server);
    assert!(cached.state.is_powered);
    assert_eq!(cached.state.speed, Some(2));
    assert_eq!(cached.state.brightness, None);
}

#[tokio::test]
async fn test_offline_device_never_reaches_backend() {
    let server = vendor().await;

    Mock::given(method("POST"))
        .and(path("/api/send-command"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let hub = hub_for(&server);
    hub.login("live-key", "live-refresh").await.unwrap();

    let err = hub
        .send_command(&DeviceId::from("F2"), "speed", Some(json!(3)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Device F2 is offline");
}

#[tokio::test]
async fn test_rejected_command_keeps_optimistic_write() {
    let server = vendor().await;

    Mock::given(method("POST"))
        .and(path("/api/send-command"))
        .respond_with(
            ResponseTemplate::new(502).set_body_json(json!({"message": "Device unreachable"})),
        )
        .mount(&server)
        .await;

    let hub = hub_for(&server);
    hub.login("live-key", "live-refresh").await.unwrap();

    let err = hub
        .send_command(&DeviceId::from("F1"), "speed", Some(json!(4)))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::CommandFailed { .. }), "got: {err:?}");
    assert_eq!(err.to_string(), "Command failed: Device unreachable");
    let cached = hub.cached(&DeviceId::from("F1")).unwrap();
    assert_eq!(cached.origin, StateOrigin::Optimistic);
    assert_eq!(cached.state.speed, Some(4));
}

#[tokio::test]
async fn test_token_rejection_surfaces_backend_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/get-access-token"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"message": "Refresh token expired"})),
        )
        .mount(&server)
        .await;

    let hub = hub_for(&server);
    let err = hub.login("k", "r").await.unwrap_err();

    assert_eq!(err.to_string(), "Authentication failed: Refresh token expired");
    assert!(!hub.is_authenticated());
}

#[tokio::test]
async fn test_device_listing_failure_is_a_fetch_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/get-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/get-devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let hub = hub_for(&server);
    let err = hub.login("k", "r").await.unwrap_err();

    assert!(matches!(err, CoreError::Fetch { .. }), "got: {err:?}");
    assert!(!hub.is_authenticated());
}

#[tokio::test]
async fn test_failed_remove_keeps_device_selected() {
    let server = vendor().await;

    Mock::given(method("GET"))
        .and(path("/api/get-device-state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_id": "F1",
            "state": {"is_powered": false}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/remove-device"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "Directory locked"})),
        )
        .mount(&server)
        .await;

    let hub = hub_for(&server);
    hub.login("live-key", "live-refresh").await.unwrap();
    hub.select_device(&DeviceId::from("F1")).unwrap();

    let err = hub.remove_device(&DeviceId::from("F1")).await.unwrap_err();

    assert!(matches!(err, CoreError::DirectoryUpdate { .. }), "got: {err:?}");
    assert_eq!(err.to_string(), "Failed to update devices: Directory locked");
    assert_eq!(hub.selected_device(), Some(DeviceId::from("F1")));
    assert!(hub.device(&DeviceId::from("F1")).is_some());
}
