use droidscan_devkit::{DeviceScript, TestHarness};
use droidscan_kernel::events::PollingState;
use droidscan_kernel::gateway::GatewayError;
use droidscan_kernel::models::DeviceStatus;
use droidscan_kernel::presence::PollingOptions;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3);

fn ids(harness: &TestHarness) -> Vec<String> {
    harness.tracker.connected_devices().into_iter().map(|d| d.device_id).collect()
}

#[tokio::test]
async fn test_xiaomi_arrival_then_departure() {
    let h = TestHarness::new();
    h.plug("A", &DeviceScript::xiaomi());

    let report = h.tracker.tick().await.unwrap();
    assert_eq!(report.arrived, vec!["A"]);

    let device = h.tracker.device("A").unwrap();
    assert_eq!(device.status, DeviceStatus::Connected);
    assert_eq!(device.brand.as_deref(), Some("xiaomi"));
    assert_eq!(device.model.as_deref(), Some("Redmi Note 12"));
    assert_eq!(device.android_version.as_deref(), Some("13"));
    assert!(device.connected_at.is_some());

    h.gateway.unplug("A");
    let report = h.tracker.tick().await.unwrap();
    assert_eq!(report.departed, vec!["A"]);
    assert!(h.tracker.connected_devices().is_empty());

    // un seul événement de départ, rien au tick suivant
    assert!(h.tracker.tick().await.unwrap().is_quiet());
    let updates = h.sink.device_updates();
    let statuses: Vec<DeviceStatus> = updates.iter().map(|d| d.status).collect();
    assert_eq!(statuses, vec![DeviceStatus::Connected, DeviceStatus::Disconnected]);
    assert!(updates[1].disconnected_at.is_some());
    assert_eq!(updates[1].brand.as_deref(), Some("xiaomi"));
}

#[tokio::test]
async fn test_unauthorized_device_is_reevaluated_each_tick() {
    let h = TestHarness::new();
    h.plug("A", &DeviceScript::xiaomi());
    h.gateway.set_authorized("A", false);

    for _ in 0..2 {
        let report = h.tracker.tick().await.unwrap();
        assert_eq!(report.pending, vec!["A"]);
        assert!(!h.tracker.is_tracked("A"));
    }
    // aucune commande shell tant que l'autorisation manque
    assert!(h.gateway.commands_for("A").is_empty());

    let pending: Vec<_> = h.sink.device_updates();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|d| d.status == DeviceStatus::PendingAuthorization));

    h.gateway.set_authorized("A", true);
    assert_eq!(h.tracker.tick().await.unwrap().arrived, vec!["A"]);
    assert!(h.tracker.is_tracked("A"));
}

#[tokio::test]
async fn test_detection_error_is_isolated_per_device() {
    let h = TestHarness::new();
    h.plug("A", &DeviceScript::xiaomi());
    h.plug("B", &DeviceScript::infinix());
    h.gateway.fail("B", "getprop ro.build.version.release", "error: closed");

    let report = h.tracker.tick().await.unwrap();
    assert_eq!(report.arrived, vec!["A"]);
    assert_eq!(report.failed, vec!["B"]);
    assert_eq!(ids(&h), vec!["A"]);

    let failure = h.sink.device_updates().into_iter().find(|d| d.device_id == "B").unwrap();
    assert_eq!(failure.status, DeviceStatus::Error);
    assert!(failure.message.unwrap().starts_with("Error detecting device"));

    // B est retenté au tick suivant, A n'est pas redétecté
    h.gateway.reply("B", "getprop ro.build.version.release", "14\n");
    let report = h.tracker.tick().await.unwrap();
    assert_eq!(report.arrived, vec!["B"]);
    assert_eq!(ids(&h), vec!["A", "B"]);
}

#[tokio::test]
async fn test_tracked_set_follows_live_set() {
    let h = TestHarness::new();
    h.plug("A", &DeviceScript::xiaomi());
    h.plug("B", &DeviceScript::infinix());
    h.tracker.tick().await.unwrap();

    h.gateway.unplug("A");
    h.plug("C", &DeviceScript::unknown_brand("samsung"));
    let report = h.tracker.tick().await.unwrap();
    assert_eq!(report.arrived, vec!["C"]);
    assert_eq!(report.departed, vec!["A"]);
    assert_eq!(ids(&h), vec!["B", "C"]);
    assert_eq!(h.tracker.device("C").unwrap().brand.as_deref(), Some("generic"));
}

#[tokio::test]
async fn test_brand_from_later_property() {
    let h = TestHarness::new();
    let script = DeviceScript::xiaomi()
        .prop("ro.product.brand", "")
        .prop("ro.product.manufacturer", "xiaomi_global");
    h.plug("A", &script);

    h.tracker.tick().await.unwrap();
    assert_eq!(h.tracker.device("A").unwrap().brand.as_deref(), Some("xiaomi"));
}

#[tokio::test]
async fn test_tick_fails_when_tool_missing() {
    let h = TestHarness::new();
    h.plug("A", &DeviceScript::xiaomi());
    h.tracker.tick().await.unwrap();

    h.gateway.break_tool();
    let err = h.tracker.tick().await.unwrap_err();
    assert!(matches!(err, GatewayError::ToolUnavailable(_)));
    // état suivi intact
    assert_eq!(ids(&h), vec!["A"]);
}

#[tokio::test]
async fn test_supervisor_restarts_once_then_stops() {
    let h = TestHarness::new();
    h.gateway.break_tool();

    h.tracker.start_polling().await;
    h.wait_until("polling stopped", WAIT, |h| h.sink.polling_states().contains(&PollingState::Stopped))
        .await
        .unwrap();
    h.wait_until("task finished", WAIT, |h| !h.tracker.is_polling()).await.unwrap();

    assert_eq!(
        h.sink.polling_states(),
        vec![PollingState::Started, PollingState::Restarting, PollingState::Stopped]
    );
    assert_eq!(h.gateway.list_calls(), 2);
}

#[tokio::test]
async fn test_supervisor_recovers_after_restart() {
    let h = TestHarness::with_options(PollingOptions {
        interval: Duration::from_millis(20),
        restart_delay: Duration::from_millis(300),
        max_restarts: 1,
    });
    h.gateway.break_tool();

    h.tracker.start_polling().await;
    h.wait_until("restart", WAIT, |h| h.sink.polling_states().contains(&PollingState::Restarting))
        .await
        .unwrap();
    h.gateway.repair_tool();
    h.plug("A", &DeviceScript::infinix());

    h.wait_until("device tracked", WAIT, |h| h.tracker.is_tracked("A")).await.unwrap();
    assert!(h.tracker.is_polling());
    assert_eq!(h.sink.polling_states(), vec![PollingState::Started, PollingState::Restarting]);

    assert!(h.tracker.stop_polling());
    assert!(!h.tracker.stop_polling());
    assert_eq!(h.sink.polling_states().last(), Some(&PollingState::Stopped));
}

#[tokio::test]
async fn test_start_polling_cancels_previous_loop() {
    let h = TestHarness::new();
    h.plug("A", &DeviceScript::xiaomi());

    h.tracker.start_polling().await;
    h.wait_until("device tracked", WAIT, |h| h.tracker.is_tracked("A")).await.unwrap();
    h.tracker.start_polling().await;
    h.wait_until("second loop", WAIT, |h| h.sink.polling_states().len() == 2).await.unwrap();
    assert_eq!(h.gateway.server_starts(), 2);

    h.gateway.break_tool();
    h.wait_until("polling stopped", WAIT, |h| h.sink.polling_states().contains(&PollingState::Stopped))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let states = h.sink.polling_states();
    let count = |s: PollingState| states.iter().filter(|x| **x == s).count();
    assert_eq!(count(PollingState::Started), 2);
    assert_eq!(count(PollingState::Restarting), 1);
    assert_eq!(count(PollingState::Stopped), 1);
    // un seul événement d'arrivée malgré les deux démarrages
    assert_eq!(h.sink.device_updates().len(), 1);
}

#[tokio::test]
async fn test_await_any_device() {
    let h = TestHarness::new();
    assert_eq!(h.tracker.await_any_device(Duration::from_millis(50)).await.unwrap(), None);

    h.gateway.plug("A");
    assert_eq!(h.tracker.await_any_device(Duration::from_secs(2)).await.unwrap().as_deref(), Some("A"));
}

#[tokio::test]
async fn test_await_any_device_with_huge_timeout() {
    let h = TestHarness::new();
    h.gateway.plug("A");
    let found = h.tracker.await_any_device(Duration::from_secs(u64::MAX)).await.unwrap();
    assert_eq!(found.as_deref(), Some("A"));
}
