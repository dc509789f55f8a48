#![allow(clippy::unwrap_used)]
// End-to-end tests for `FanHub` against the simulated backend.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};

use fanfly_api::{CommandRequest, Credentials};
use fanfly_core::{
    Backend, CoreError, DeviceId, DeviceState, DeviceTable, DeviceType, FanHub, HubConfig,
    SimulatedBackend, StateOrigin,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn hub_over(sim: SimulatedBackend) -> (FanHub, Arc<SimulatedBackend>) {
    let sim = Arc::new(sim);
    let hub = FanHub::with_backend(HubConfig::default(), Backend::Simulated(Arc::clone(&sim)));
    (hub, sim)
}

async fn logged_in(sim: SimulatedBackend) -> (FanHub, Arc<SimulatedBackend>) {
    let (hub, sim) = hub_over(sim);
    hub.login("abc", "abc").await.unwrap();
    (hub, sim)
}

fn id(raw: &str) -> DeviceId {
    DeviceId::from(raw)
}

/// Change state on the simulated server without going through the hub.
async fn server_command(sim: &SimulatedBackend, device: &str, command: &str, value: Value) {
    let token = sim
        .get_access_token(&Credentials::new("abc", "abc"))
        .await
        .unwrap();
    sim.send_command(
        &SecretString::from("abc".to_string()),
        &token,
        &CommandRequest {
            device_id: device.into(),
            command: command.into(),
            value: Some(value),
        },
    )
    .await
    .unwrap();
}

/// Remove a device on the simulated server only.
async fn server_remove(sim: &SimulatedBackend, device: &str) {
    let token = sim
        .get_access_token(&Credentials::new("abc", "abc"))
        .await
        .unwrap();
    assert!(
        sim.remove_device(&SecretString::from("abc".to_string()), &token, device)
            .await
            .unwrap()
    );
}

/// Let spawned tasks run (time is paused, so this auto-advances).
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ── Session ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_demo_login_lists_four_devices() {
    let (hub, _sim) = logged_in(SimulatedBackend::default()).await;

    assert!(hub.is_authenticated());
    let names: Vec<String> = hub.devices().iter().map(|d| d.name.clone()).collect();
    assert_eq!(
        names,
        ["Bedroom Fan", "Living Room Fan", "Kitchen Fan", "Hall Fan"]
    );
    assert_eq!(hub.device(&id("DEV004")).unwrap().device_type, DeviceType::TableFan);
}

#[tokio::test]
async fn test_wrong_credentials_fail_and_establish_nothing() {
    let (hub, _sim) = hub_over(SimulatedBackend::default());

    let err = hub.login("x", "y").await.unwrap_err();
    assert!(
        matches!(err, CoreError::AuthenticationFailed { .. }),
        "got: {err:?}"
    );
    assert!(err.to_string().contains("Demo mode requires"));
    assert!(!hub.is_authenticated());
    assert!(hub.devices().is_empty());
}

#[tokio::test]
async fn test_blank_credentials_fail_validation() {
    let (hub, _sim) = hub_over(SimulatedBackend::default());

    let err = hub.login("  ", "abc").await.unwrap_err();
    assert_eq!(err.to_string(), "Please enter both API Key and Refresh Token");
    assert!(!hub.is_authenticated());
}

#[tokio::test]
async fn test_credentials_reach_backend_untrimmed() {
    let (hub, _sim) = hub_over(SimulatedBackend::default());

    let err = hub.login(" abc", "abc").await.unwrap_err();
    assert!(
        matches!(err, CoreError::AuthenticationFailed { .. }),
        "got: {err:?}"
    );
    let err = hub.login("abc", "abc\n").await.unwrap_err();
    assert!(
        matches!(err, CoreError::AuthenticationFailed { .. }),
        "got: {err:?}"
    );
    assert!(!hub.is_authenticated());
}

#[tokio::test]
async fn test_login_with_zero_devices_never_authenticates() {
    let (hub, _sim) = hub_over(SimulatedBackend::new(DeviceTable::empty()));

    let err = hub.login("abc", "abc").await.unwrap_err();
    assert!(matches!(err, CoreError::NoDevices));
    assert!(!hub.is_authenticated());
    assert!(matches!(
        hub.fetch_state(&id("DEV001")).await,
        Err(CoreError::NotAuthenticated)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_logout_returns_to_pre_login_state() {
    let (hub, _sim) = logged_in(SimulatedBackend::default()).await;
    hub.select_device(&id("DEV001")).unwrap();
    hub.send_command(&id("DEV002"), "is_powered", Some(json!(1)))
        .await
        .unwrap();
    settle().await;
    assert!(!hub.store().states_snapshot().is_empty());

    hub.logout();

    assert!(!hub.is_authenticated());
    assert!(hub.devices().is_empty());
    assert!(hub.store().states_snapshot().is_empty());
    assert_eq!(hub.powered_count(), 0);
    assert_eq!(hub.selected_device(), None);
    assert!(hub.store().last_device_refresh().is_none());
    assert!(matches!(
        hub.send_command(&id("DEV002"), "speed", Some(json!(2))).await,
        Err(CoreError::NotAuthenticated)
    ));
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_speed_out_of_range_leaves_cache_unchanged() {
    let (hub, _sim) = logged_in(SimulatedBackend::default()).await;
    let before = hub.fetch_state(&id("DEV001")).await.unwrap();

    let err = hub
        .send_command(&id("DEV001"), "speed", Some(json!(7)))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation { .. }), "got: {err:?}");
    assert_eq!(hub.state(&id("DEV001")), Some(before));
}

#[tokio::test]
async fn test_brightness_out_of_range_leaves_cache_unchanged() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;
    hub.fetch_state(&id("DEV003")).await.unwrap();
    let before = hub.cached(&id("DEV003")).unwrap();

    let err = hub
        .send_command(&id("DEV003"), "brightness", Some(json!(101)))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation { .. }));
    assert_eq!(hub.cached(&id("DEV003")).unwrap(), before);
    assert_eq!(sim.stored_state("DEV003").unwrap().brightness, 0);
}

#[tokio::test]
async fn test_unknown_command_is_rejected_locally() {
    let (hub, _sim) = logged_in(SimulatedBackend::default()).await;

    let err = hub
        .send_command(&id("DEV001"), "oscillate", None)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Unknown command: oscillate");
    assert!(hub.cached(&id("DEV001")).is_none());
}

#[tokio::test]
async fn test_power_on_twice_stays_on() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;

    for _ in 0..2 {
        let receipt = hub
            .send_command(&id("DEV001"), "is_powered", Some(json!(1)))
            .await
            .unwrap();
        assert!(receipt.reconciled);
        assert_eq!(receipt.message.as_deref(), Some("Fan turned on"));
    }

    assert!(hub.state(&id("DEV001")).unwrap().is_powered);
    assert!(sim.stored_state("DEV001").unwrap().is_powered);
    assert_eq!(hub.powered_count(), 1);
}

#[tokio::test]
async fn test_power_alias_and_timer_clear() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;

    hub.send_command(&id("DEV004"), "power", Some(json!("on")))
        .await
        .unwrap();
    hub.send_command(&id("DEV004"), "timer", Some(json!(45)))
        .await
        .unwrap();
    assert_eq!(hub.state(&id("DEV004")).unwrap().timer, Some(45));

    hub.send_command(&id("DEV004"), "timer", None).await.unwrap();

    let state = hub.state(&id("DEV004")).unwrap();
    assert!(state.is_powered);
    assert_eq!(state.timer, None);
    assert_eq!(sim.stored_state("DEV004").unwrap().timer, None);
}

#[tokio::test(start_paused = true)]
async fn test_optimistic_write_is_visible_before_backend_applies() {
    let sim = SimulatedBackend::default().with_latency(Duration::from_millis(500));
    let (hub, sim) = logged_in(sim).await;
    let mut states = hub.states_stream();

    let task = {
        let hub = hub.clone();
        tokio::spawn(async move {
            hub.send_command(&id("DEV002"), "is_powered", Some(json!(1)))
                .await
        })
    };

    states.changed().await.unwrap();
    let cached = hub.cached(&id("DEV002")).unwrap();
    assert!(cached.state.is_powered);
    assert_eq!(cached.origin, StateOrigin::Optimistic);
    assert!(hub.is_busy(&id("DEV002")));
    assert!(!sim.stored_state("DEV002").unwrap().is_powered);

    let receipt = task.await.unwrap().unwrap();
    assert!(receipt.reconciled);
    assert!(!hub.is_busy(&id("DEV002")));
    let cached = hub.cached(&id("DEV002")).unwrap();
    assert_eq!(cached.origin, StateOrigin::Server);
    assert!(sim.stored_state("DEV002").unwrap().is_powered);
}

#[tokio::test(start_paused = true)]
async fn test_commands_to_one_device_apply_in_order() {
    let sim = SimulatedBackend::default().with_latency(Duration::from_millis(200));
    let (hub, sim) = logged_in(sim).await;

    let first = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.send_command(&id("DEV001"), "speed", Some(json!(2))).await })
    };
    tokio::task::yield_now().await;
    let second = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.send_command(&id("DEV001"), "speed", Some(json!(4))).await })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(sim.stored_state("DEV001").unwrap().speed, 4);
    assert_eq!(hub.state(&id("DEV001")).unwrap().speed, Some(4));
    assert!(!hub.is_busy(&id("DEV001")));
}

#[tokio::test]
async fn test_offline_device_rejects_commands() {
    let sim = SimulatedBackend::default();
    assert!(sim.set_online("DEV003", false));
    let (hub, sim) = logged_in(sim).await;

    let err = hub
        .send_command(&id("DEV003"), "is_powered", Some(json!(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::DeviceOffline { .. }), "got: {err:?}");
    assert!(hub.cached(&id("DEV003")).is_none());
    assert!(!sim.stored_state("DEV003").unwrap().is_powered);
}

#[tokio::test]
async fn test_unknown_device_counts_as_offline() {
    let (hub, _sim) = logged_in(SimulatedBackend::default()).await;

    let err = hub
        .send_command(&id("DEV999"), "speed", Some(json!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DeviceOffline { .. }));
}

// ── Directory ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_then_remove_restores_directory_and_cache() {
    let (hub, _sim) = logged_in(SimulatedBackend::default()).await;
    let devices_before = hub.devices();
    let states_before = hub.store().states_snapshot();

    let added = hub.add_device("X", &DeviceType::TableFan).await.unwrap();
    assert_eq!(added.id, id("DEV005"));
    assert!(added.is_online);
    assert_eq!(hub.state(&added.id), Some(DeviceState::zeroed()));
    assert_eq!(hub.devices().len(), 5);

    assert!(hub.remove_device(&added.id).await.unwrap());

    assert_eq!(hub.devices(), devices_before);
    assert_eq!(hub.store().states_snapshot(), states_before);
}

#[tokio::test]
async fn test_rejected_add_reports_directory_failure() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;

    let err = hub
        .add_device("Desk", &DeviceType::Other("desk_fan".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::DirectoryUpdate { .. }), "got: {err:?}");
    assert_eq!(err.to_string(), "Failed to update devices: Unknown device type: desk_fan");
    assert_eq!(hub.devices().len(), 4);
    assert_eq!(sim.devices().len(), 4);
}

#[tokio::test]
async fn test_add_device_requires_a_name() {
    let (hub, _sim) = logged_in(SimulatedBackend::default()).await;

    let err = hub.add_device("   ", &DeviceType::CeilingFan).await.unwrap_err();
    assert_eq!(err.to_string(), "Please enter a fan name");
    assert_eq!(hub.devices().len(), 4);
}

#[tokio::test]
async fn test_refresh_devices_prunes_vanished_devices() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;
    hub.fetch_state(&id("DEV004")).await.unwrap();
    server_remove(&sim, "DEV004").await;

    let devices = hub.refresh_devices().await.unwrap();

    assert_eq!(devices.len(), 3);
    assert!(hub.device(&id("DEV004")).is_none());
    assert!(hub.cached(&id("DEV004")).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_removing_selected_device_deselects_it() {
    let (hub, _sim) = logged_in(SimulatedBackend::default()).await;
    hub.select_device(&id("DEV002")).unwrap();
    settle().await;

    hub.remove_device(&id("DEV002")).await.unwrap();

    assert_eq!(hub.selected_device(), None);
    assert!(hub.cached(&id("DEV002")).is_none());
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_first_poll_is_immediate_then_periodic() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;

    hub.select_device(&id("DEV001")).unwrap();
    settle().await;
    let cached = hub.cached(&id("DEV001")).unwrap();
    assert_eq!(cached.origin, StateOrigin::Server);
    assert!(!cached.state.is_powered);

    server_command(&sim, "DEV001", "is_powered", json!(1)).await;
    tokio::time::sleep(Duration::from_millis(2_900)).await;
    assert!(!hub.state(&id("DEV001")).unwrap().is_powered);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(hub.state(&id("DEV001")).unwrap().is_powered);

    let status = hub.poll_status().unwrap().borrow().clone();
    assert_eq!(status.polls, 2);
    assert!(status.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_no_write_lands_after_deselect() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;
    hub.select_device(&id("DEV001")).unwrap();
    settle().await;

    hub.deselect();
    server_command(&sim, "DEV001", "speed", json!(5)).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(hub.state(&id("DEV001")).unwrap().speed, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_fetch_in_flight() {
    let sim = SimulatedBackend::default().with_latency(Duration::from_millis(500));
    let (hub, _sim) = logged_in(sim).await;

    hub.select_device(&id("DEV001")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    hub.deselect();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(hub.cached(&id("DEV001")).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_switching_devices_stops_previous_poll() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;
    hub.select_device(&id("DEV001")).unwrap();
    settle().await;

    hub.select_device(&id("DEV002")).unwrap();
    settle().await;
    assert_eq!(hub.selected_device(), Some(id("DEV002")));
    assert!(hub.cached(&id("DEV002")).is_some());

    server_command(&sim, "DEV001", "is_powered", json!(1)).await;
    server_command(&sim, "DEV002", "is_powered", json!(1)).await;
    tokio::time::sleep(Duration::from_secs(4)).await;

    assert!(!hub.state(&id("DEV001")).unwrap().is_powered);
    assert!(hub.state(&id("DEV002")).unwrap().is_powered);
}

#[tokio::test(start_paused = true)]
async fn test_logout_discards_in_flight_results() {
    let sim = SimulatedBackend::default().with_latency(Duration::from_millis(500));
    let (hub, _sim) = logged_in(sim).await;

    let fetch = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.fetch_state(&id("DEV001")).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    hub.logout();

    let result = fetch.await.unwrap();
    assert!(matches!(result, Err(CoreError::SessionEnded)), "got: {result:?}");
    assert!(hub.store().states_snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_logout_discards_command_in_flight() {
    let sim = SimulatedBackend::default().with_latency(Duration::from_millis(500));
    let (hub, sim) = logged_in(sim).await;

    let send = {
        let hub = hub.clone();
        tokio::spawn(async move {
            hub.send_command(&id("DEV002"), "is_powered", Some(json!(1)))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    hub.logout();

    let result = send.await.unwrap();
    assert!(matches!(result, Err(CoreError::SessionEnded)), "got: {result:?}");
    assert!(hub.store().states_snapshot().is_empty());
    // The backend still applied it; only the local outcome is dropped.
    assert!(sim.stored_state("DEV002").unwrap().is_powered);
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_keeps_last_known_state() {
    let (hub, sim) = logged_in(SimulatedBackend::default()).await;
    hub.send_command(&id("DEV001"), "speed", Some(json!(3)))
        .await
        .unwrap();
    hub.select_device(&id("DEV001")).unwrap();
    settle().await;

    server_remove(&sim, "DEV001").await;
    tokio::time::sleep(Duration::from_secs(4)).await;

    assert_eq!(hub.state(&id("DEV001")).unwrap().speed, Some(3));
    let status = hub.poll_status().unwrap().borrow().clone();
    assert_eq!(status.last_error.as_deref(), Some("Failed to fetch data: Device DEV001 not found"));

    let err = hub.refresh(&id("DEV001")).await.unwrap_err();
    assert!(matches!(err, CoreError::Fetch { .. }));
    assert_eq!(hub.state(&id("DEV001")).unwrap().speed, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_select_requires_known_device_and_session() {
    let (hub, _sim) = hub_over(SimulatedBackend::default());
    assert!(matches!(
        hub.select_device(&id("DEV001")),
        Err(CoreError::NotAuthenticated)
    ));

    hub.login("abc", "abc").await.unwrap();
    let err = hub.select_device(&id("DEV042")).unwrap_err();
    assert_eq!(err.to_string(), "Device DEV042 not found");
}
