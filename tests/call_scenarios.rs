//! End-to-end Szenarien über die öffentliche API
//!
//! Die Uhr ist pausiert; Tokio spult automatisch zum nächsten Timer vor,
//! sobald alle Tasks warten.

use call_coordinator::call::CoordinatorHandle;
use call_coordinator::devices::{MediaDeviceInfo, StaticDeviceEnumerator};
use call_coordinator::engine::MediaEngine;
use call_coordinator::session::{CallSession, CallState, CallType, MediaKind, ParticipantStatus, TrackHandle};
use call_coordinator::signaling::{SignalingChannel, SignalingEvent};
use call_coordinator::{CallCoordinator, CallNotification, CoordinatorConfig, Intent};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// TEST DOUBLES
// ============================================================================

#[derive(Debug, Default)]
struct TestEngine {
    calls: Mutex<Vec<String>>,
}

impl TestEngine {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl MediaEngine for TestEngine {
    fn attach_track(&self, participant_id: &str, track: &TrackHandle) {
        self.calls.lock().push(format!("attach:{}:{}", participant_id, track.id));
    }

    fn detach_track(&self, participant_id: &str, track: &TrackHandle) {
        self.calls.lock().push(format!("detach:{}:{}", participant_id, track.id));
    }

    fn set_muted(&self, kind: MediaKind, muted: bool) {
        self.calls.lock().push(format!("mute:{}:{}", kind, muted));
    }

    fn use_device(&self, kind: MediaKind, device_id: Option<&str>) {
        self.calls
            .lock()
            .push(format!("device:{}:{}", kind, device_id.unwrap_or("default")));
    }

    fn set_screen_share(&self, active: bool) {
        self.calls.lock().push(format!("screen:{}", active));
    }
}

struct Fixture {
    handle: CoordinatorHandle,
    outbound: mpsc::Receiver<String>,
    engine: Arc<TestEngine>,
    config: CoordinatorConfig,
}

fn start() -> Fixture {
    let config = CoordinatorConfig {
        local_user_id: "me".into(),
        ..Default::default()
    };
    let engine = Arc::new(TestEngine::default());
    let enumerator = Arc::new(StaticDeviceEnumerator::new(vec![
        MediaDeviceInfo::new("mic-1", "Built-in Mic", MediaKind::Audio),
        MediaDeviceInfo::new("cam-1", "Front Camera", MediaKind::Video),
        MediaDeviceInfo::new("cam-2", "USB Camera", MediaKind::Video),
        MediaDeviceInfo::new("screen", "Screen", MediaKind::Video),
    ]));
    let (handle, outbound) = CallCoordinator::spawn(config.clone(), engine.clone(), enumerator);
    Fixture {
        handle,
        outbound,
        engine,
        config,
    }
}

fn frame(method: &str, data: Value) -> String {
    json!({ "method": method, "data": data }).to_string()
}

async fn wait_state(handle: &CoordinatorHandle, state: CallState) -> CallSession {
    let mut rx = handle.watch();
    let session = tokio::time::timeout(
        Duration::from_secs(3600),
        rx.wait_for(|s| s.state == state),
    )
    .await
    .unwrap_or_else(|_| panic!("never reached {}", state))
    .expect("coordinator stopped");
    (*session).clone()
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(serde_json::from_str(&frame).unwrap());
    }
    out
}

/// Ausgehender Anruf bis ACTIVE mit Teilnehmer u2
async fn reach_active(f: &mut Fixture) -> CallSession {
    f.handle.dispatch(Intent::CallTo {
        target: "room-1".into(),
        call_type: CallType::Video,
    });
    wait_state(&f.handle, CallState::Loading).await;
    f.handle
        .deliver_frame(frame("RoomCreated", json!({"roomId": "room-1", "participants": []})));
    wait_state(&f.handle, CallState::Awaiting).await;
    f.handle.deliver_frame(frame(
        "CallStarted",
        json!({
            "roomId": "room-1",
            "participants": [{"id": "u2", "status": "ACTIVE"}],
            "startTime": 1000
        }),
    ));
    wait_state(&f.handle, CallState::Active).await
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_outgoing_call_reaches_awaiting() {
    let mut f = start();
    f.handle.dispatch(Intent::CallTo {
        target: "room-1".into(),
        call_type: CallType::Video,
    });
    let loading = wait_state(&f.handle, CallState::Loading).await;
    assert_eq!(loading.room_id.as_deref(), Some("room-1"));
    assert_eq!(loading.call_type, CallType::Video);

    f.handle
        .deliver_frame(frame("RoomCreated", json!({"roomId": "room-1", "participants": []})));
    let awaiting = wait_state(&f.handle, CallState::Awaiting).await;
    assert!(awaiting.participants.is_empty());

    let sent = drain(&mut f.outbound);
    assert_eq!(sent, vec![json!({"method": "Call", "data": {"roomId": "room-1", "type": "video"}})]);
}

#[tokio::test(start_paused = true)]
async fn test_call_started_populates_roster() {
    let mut f = start();
    let active = reach_active(&mut f).await;

    assert_eq!(active.start_time, Some(1000));
    assert_eq!(active.participants["u2"].status, ParticipantStatus::Active);
    assert_eq!(active.users_amount.active, 1);
    assert_eq!(active.users_amount.total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_response_then_back_to_none() {
    let mut f = start();
    f.handle.dispatch(Intent::CallTo {
        target: "room-1".into(),
        call_type: CallType::Audio,
    });
    f.handle
        .deliver_frame(frame("RoomCreated", json!({"roomId": "room-1", "participants": []})));
    wait_state(&f.handle, CallState::Awaiting).await;

    let mut notifications = f.handle.subscribe();
    f.handle
        .deliver_frame(frame("IncomingCallTimeout", json!({"roomId": "room-1"})));
    wait_state(&f.handle, CallState::NoResponse).await;
    assert_eq!(notifications.recv().await.unwrap(), CallNotification::RemoteNoResponse);

    let before = tokio::time::Instant::now();
    let idle = wait_state(&f.handle, CallState::None).await;
    assert!(before.elapsed() >= f.config.terminal_display_window);
    assert_eq!(idle.room_id, None);
    assert!(idle.participants.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ring_timeout_without_answer() {
    let mut f = start();
    f.handle.dispatch(Intent::CallTo {
        target: "room-1".into(),
        call_type: CallType::Video,
    });
    f.handle
        .deliver_frame(frame("RoomCreated", json!({"roomId": "room-1", "participants": []})));
    wait_state(&f.handle, CallState::Awaiting).await;

    let before = tokio::time::Instant::now();
    wait_state(&f.handle, CallState::NoResponse).await;
    assert!(before.elapsed() >= f.config.ring_timeout);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_restored_in_time() {
    let mut f = start();
    reach_active(&mut f).await;

    f.handle.connectivity_changed(false);
    wait_state(&f.handle, CallState::Reconnecting).await;

    tokio::time::advance(Duration::from_secs(10)).await;
    f.handle.connectivity_changed(true);
    let back = wait_state(&f.handle, CallState::Active).await;
    assert_eq!(back.start_time, Some(1000));
    assert!(back.participants.contains_key("u2"));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_times_out() {
    let mut f = start();
    reach_active(&mut f).await;
    let mut notifications = f.handle.subscribe();

    let before = tokio::time::Instant::now();
    f.handle.connectivity_changed(false);
    wait_state(&f.handle, CallState::Reconnecting).await;
    let failed = wait_state(&f.handle, CallState::FailedToConnect).await;

    assert!(before.elapsed() >= f.config.reconnect_timeout);
    assert!(failed.participants.is_empty());
    assert!(matches!(
        notifications.recv().await.unwrap(),
        CallNotification::Connection(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_switch_device_keeps_call_untouched() {
    let mut f = start();
    let active = reach_active(&mut f).await;

    f.handle.dispatch(Intent::SwitchDevice {
        kind: MediaKind::Video,
        device_id: "cam-2".into(),
    });
    let mut rx = f.handle.watch();
    let switched = rx
        .wait_for(|s| s.local_media.selected_video_device_id.is_some())
        .await
        .unwrap()
        .clone();

    assert_eq!(switched.local_media.selected_video_device_id.as_deref(), Some("cam-2"));
    assert_eq!(switched.state, CallState::Active);
    assert_eq!(switched.participants, active.participants);
    assert!(f.engine.calls().contains(&"device:video:cam-2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_busy_auto_decline_keeps_call() {
    let mut f = start();
    reach_active(&mut f).await;
    drain(&mut f.outbound);

    f.handle.deliver_frame(frame(
        "IncomingCall",
        json!({"from": "carol", "type": "audio", "roomId": "room-7"}),
    ));
    settle().await;

    assert_eq!(f.handle.session().state, CallState::Active);
    assert_eq!(
        drain(&mut f.outbound),
        vec![json!({"method": "DeclineCall", "data": {"roomId": "room-7", "from": "carol", "busy": true}})]
    );
}

#[tokio::test(start_paused = true)]
async fn test_remote_leave_detaches_tracks() {
    let mut f = start();
    reach_active(&mut f).await;

    f.handle.track_added(
        "u2",
        TrackHandle {
            id: "a1".into(),
            kind: MediaKind::Audio,
        },
    );
    f.handle
        .deliver_frame(frame("LeaveCall", json!({"roomId": "room-1", "id": "u2"})));
    let mut rx = f.handle.watch();
    rx.wait_for(|s| s.participants.is_empty()).await.unwrap();

    let calls = f.engine.calls();
    let attach = calls.iter().position(|c| c == "attach:u2:a1").unwrap();
    let detach = calls.iter().position(|c| c == "detach:u2:a1").unwrap();
    assert!(attach < detach);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_leaves_running_call() {
    let mut f = start();
    reach_active(&mut f).await;
    drain(&mut f.outbound);

    f.handle.shutdown();
    let frame = f.outbound.recv().await.unwrap();
    let value: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value, json!({"method": "LeaveCall", "data": {"roomId": "room-1"}}));
    assert!(f.outbound.recv().await.is_none());
}

// ============================================================================
// PROPERTIES
// ============================================================================

/// Inbound-Gegenstück zu einem ausgehenden Frame
fn echo(outbound: &Value) -> String {
    let data = &outbound["data"];
    let room = data["roomId"].clone();
    match outbound["method"].as_str().unwrap() {
        "Call" | "JoinCall" => frame("RoomCreated", json!({"roomId": room, "participants": []})),
        "InviteUser" => frame("UserAdded", json!({"roomId": room, "userId": data["userId"]})),
        "AcceptCall" => frame("CallStarted", json!({"roomId": room, "startTime": 1})),
        "DeclineCall" => frame("CallEnded", json!({"roomId": room, "reason": "Declined"})),
        "LeaveCall" => frame("LeaveCall", json!({"roomId": room, "id": "me"})),
        other => panic!("unexpected method {}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_outbound_room_id_survives_echo() {
    let mut f = start();
    reach_active(&mut f).await;
    f.handle.dispatch(Intent::InviteUser {
        user_id: "u9".into(),
    });
    f.handle.dispatch(Intent::LeaveCall);
    wait_state(&f.handle, CallState::Ended).await;
    wait_state(&f.handle, CallState::None).await;

    f.handle.dispatch(Intent::JoinCall {
        room_id: "room-2".into(),
        video_muted: true,
        audio_muted: false,
    });
    wait_state(&f.handle, CallState::Loading).await;

    let sent = drain(&mut f.outbound);
    assert_eq!(sent.len(), 4);

    let (channel, _rx) = SignalingChannel::new();
    for outbound in &sent {
        let event: SignalingEvent = channel.on_message(&echo(outbound)).unwrap();
        assert_eq!(
            event.room_id(),
            outbound["data"]["roomId"].as_str(),
            "roomId changed for {}",
            outbound["method"]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_live_rooms_directory_is_kept_when_idle() {
    let f = start();
    f.handle.deliver_frame(frame(
        "LiveRoomsInfo",
        json!({"roomId": "room-9", "ids": ["u5", "u6"]}),
    ));
    let mut rx = f.handle.watch();
    let session = rx
        .wait_for(|s| s.live_rooms.contains_key("room-9"))
        .await
        .unwrap()
        .clone();
    assert_eq!(session.state, CallState::None);
    assert_eq!(session.live_rooms["room-9"], vec!["u5".to_string(), "u6".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_lists_switchable_devices() {
    let f = start();
    let session = f.handle.session();
    let video: Vec<&str> = session.devices.video.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(video, ["cam-1", "cam-2"]);
    assert_eq!(session.devices.audio[0].label, "Built-in Mic");

    f.handle.dispatch(Intent::SwitchDevice {
        kind: MediaKind::Video,
        device_id: session.devices.video[1].id.clone(),
    });
    let mut rx = f.handle.watch();
    rx.wait_for(|s| s.local_media.selected_video_device_id.as_deref() == Some("cam-2"))
        .await
        .unwrap();
    assert_eq!(f.engine.calls().last().map(String::as_str), Some("device:video:cam-2"));
}
