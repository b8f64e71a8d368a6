//! End-to-end session scenarios against a channel-backed transport.

use sensorlink_core::{
    Endpoint, SensorPayload,
    protocol::{CMD_GET_ALL, CMD_GET_WATER_TEMP, STATUS_SENT},
};
use sensorlink_session::{SessionError, SessionManager, SessionPhase, SessionView};
use sensorlink_transport::mock::{MockConnector, MockRemote};
use tokio::sync::watch;

const ORIGIN: &str = "ws://10.0.0.5:81";

fn endpoint() -> Endpoint {
    Endpoint::new("10.0.0.5", 81).unwrap()
}

async fn wait_for(
    rx: &mut watch::Receiver<SessionView>,
    predicate: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    rx.wait_for(predicate).await.unwrap().clone()
}

/// Connect and drive the link to `Connected`.
async fn connected_session() -> (
    SessionManager<MockConnector>,
    MockRemote,
    watch::Receiver<SessionView>,
) {
    let (connector, mut remotes) = MockConnector::new();
    let manager = SessionManager::new(connector);
    let mut views = manager.subscribe();

    manager.connect(endpoint()).await.unwrap();
    assert_eq!(manager.view().phase, SessionPhase::Connecting);

    let remote = remotes.recv().await.unwrap();
    remote.open();
    wait_for(&mut views, |v| v.phase == SessionPhase::Connected).await;

    (manager, remote, views)
}

#[tokio::test]
async fn test_connect_send_and_fold_scenario() {
    let (manager, mut remote, mut views) = connected_session().await;

    manager.send(CMD_GET_ALL).await.unwrap();
    assert_eq!(remote.outbound.recv().await.unwrap(), "GET_ALL");

    remote.message(
        ORIGIN,
        r#"{"status":"DONE","data":[{"name":"WATER_TEMP","value":"21.5"}]}"#,
    );
    let view = wait_for(&mut views, |v| v.status.as_deref() == Some("DONE")).await;

    assert_eq!(view.snapshot["WATER_TEMP"], "21.5");
    assert_eq!(view.log.len(), 2);
    assert_eq!(view.log[0].from, "localhost");
    assert_eq!(view.log[0].msg.status, STATUS_SENT);
    assert_eq!(view.log[1].from, ORIGIN);
    assert_eq!(view.log[1].msg.data[0].name, "WATER_TEMP");
    assert!(view.commands_enabled());
}

#[tokio::test]
async fn test_malformed_frame_logs_error_and_stops_loop() {
    let (manager, remote, mut views) = connected_session().await;

    manager.send(CMD_GET_ALL).await.unwrap();
    manager.set_loop(true).await;

    remote.message(ORIGIN, "definitely not percent-escaped JSON {");
    let view = wait_for(&mut views, |v| v.status.as_deref() == Some("ERROR")).await;

    assert_eq!(view.log.last().unwrap().msg, SensorPayload::decode_error());
    assert!(!view.loop_enabled);
    // The synthetic ERROR status re-enables manual commands.
    assert!(view.commands_enabled());
}

#[tokio::test]
async fn test_auto_poll_sends_once_per_done() {
    let (manager, mut remote, mut views) = connected_session().await;

    manager.send(CMD_GET_ALL).await.unwrap();
    assert_eq!(remote.outbound.recv().await.unwrap(), "GET_ALL");
    manager.set_loop(true).await;

    // Not ready yet: no re-issue.
    remote.message(ORIGIN, r#"{"status":"CONNECTING"}"#);
    wait_for(&mut views, |v| v.status.as_deref() == Some("CONNECTING")).await;

    // Each DONE triggers exactly one re-send, whose SENT marker gates
    // the loop until the next DONE.
    remote.message(ORIGIN, r#"{"status":"DONE"}"#);
    assert_eq!(remote.outbound.recv().await.unwrap(), "GET_ALL");
    wait_for(&mut views, |v| v.status.as_deref() == Some(STATUS_SENT)).await;

    remote.message(ORIGIN, r#"{"status":"DONE"}"#);
    assert_eq!(remote.outbound.recv().await.unwrap(), "GET_ALL");
    wait_for(&mut views, |v| v.log.len() == 6).await;

    assert!(remote.outbound.try_recv().is_err());
}

#[tokio::test]
async fn test_disconnect_clears_log_but_not_snapshot() {
    let (manager, remote, mut views) = connected_session().await;

    manager.send(CMD_GET_WATER_TEMP).await.unwrap();
    remote.message(
        ORIGIN,
        r#"{"status":"DONE","data":[{"name":"WATER_TEMP","value":"21.5"}]}"#,
    );
    wait_for(&mut views, |v| v.status.as_deref() == Some("DONE")).await;

    manager.disconnect().await.unwrap();
    let view = wait_for(&mut views, |v| v.phase == SessionPhase::Closed).await;

    assert!(view.log.is_empty());
    assert_eq!(view.status, None);
    assert!(!view.commands_enabled());
    // Readings stay visible for reference after the session ends.
    assert_eq!(view.snapshot["WATER_TEMP"], "21.5");
}

#[tokio::test]
async fn test_remote_close_also_clears_log() {
    let (_manager, remote, mut views) = connected_session().await;

    remote.close();
    let view = wait_for(&mut views, |v| v.phase == SessionPhase::Closed).await;
    assert!(view.log.is_empty());
}

#[tokio::test]
async fn test_invalid_operations_are_observable() {
    let (connector, mut remotes) = MockConnector::new();
    let manager = SessionManager::new(connector);

    assert!(matches!(
        manager.send(CMD_GET_ALL).await,
        Err(SessionError::InvalidPhase { op: "send", .. })
    ));
    assert!(matches!(
        manager.disconnect().await,
        Err(SessionError::InvalidPhase { .. })
    ));

    manager.connect(endpoint()).await.unwrap();
    let remote = remotes.recv().await.unwrap();
    remote.open();
    let mut views = manager.subscribe();
    wait_for(&mut views, |v| v.phase == SessionPhase::Connected).await;

    assert!(matches!(
        manager.connect(endpoint()).await,
        Err(SessionError::InvalidPhase { op: "connect", .. })
    ));
    assert!(matches!(
        manager.send("").await,
        Err(SessionError::EmptyCommand)
    ));
}

#[tokio::test]
async fn test_failed_dial_settles_on_failed_and_allows_retry() {
    let manager = SessionManager::new(MockConnector::refusing());
    let mut views = manager.subscribe();

    manager.connect(endpoint()).await.unwrap();
    wait_for(&mut views, |v| v.phase == SessionPhase::Failed).await;

    // Failed is eligible to connect again.
    manager.connect(endpoint()).await.unwrap();
    assert_eq!(manager.view().phase, SessionPhase::Connecting);
}

#[tokio::test]
async fn test_reconnect_after_close_starts_clean() {
    let (manager, remote, mut views) = connected_session().await;

    manager.send(CMD_GET_ALL).await.unwrap();
    remote.close();
    wait_for(&mut views, |v| v.phase == SessionPhase::Closed).await;

    manager.connect(endpoint()).await.unwrap();
    let view = manager.view();
    assert_eq!(view.phase, SessionPhase::Connecting);
    assert!(view.log.is_empty());
}
