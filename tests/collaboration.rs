use segment_canvas::room::wire::{self, ReplayRequest, ReplayResponse};
use segment_canvas::room::{
    ClientReplica, ReplicaAction, ReplicaPhase, RoomConfig, RoomHub, RoomService, ServerMessage,
};
use segment_canvas::segment::{DrawEvent, Pos, SegmentEngine};
use segment_canvas::settings::{EngineSettings, ImageSize};
use std::sync::mpsc::{self, Receiver};

const MAX_BRUSH: u32 = 64;

fn config(width: u32, height: u32) -> RoomConfig {
    RoomConfig {
        size: ImageSize { width, height },
        track_short_log: true,
        channel_capacity: 64,
        max_brush_size: MAX_BRUSH,
    }
}

/// Feeds every queued message through the JSON codec into the replica.
fn pump(replica: &mut ClientReplica, rx: &Receiver<ServerMessage>) -> Vec<ReplicaAction> {
    rx.try_iter()
        .map(|message| {
            let json = wire::encode_server_message(&message).unwrap();
            let decoded = wire::decode_server_message(&json, MAX_BRUSH).unwrap();
            assert_eq!(decoded, message);
            replica.on_message(&decoded)
        })
        .collect()
}

fn server_state(service: &RoomService, width: u32, height: u32) -> SegmentEngine {
    let entries = service.replay_after(-1).unwrap();
    SegmentEngine::from_raw(width, height, entries.iter().map(|entry| &entry.event))
}

#[test]
fn concurrent_strokes_converge_on_every_replica() {
    let service = RoomService::spawn("0", config(12, 12)).unwrap();
    let (tx_a, rx_a) = mpsc::channel();
    let (tx_b, rx_b) = mpsc::channel();
    service.join(1, tx_a).unwrap();
    service.join(2, tx_b).unwrap();

    let mut alice = ClientReplica::new("0", 12, 12);
    let mut bob = ClientReplica::new("0", 12, 12);
    alice.apply_replay(&service.replay_after(-1).unwrap()).unwrap();
    bob.apply_replay(&service.replay_after(-1).unwrap()).unwrap();

    // A filled block, then both cut through it before seeing each other.
    let block = DrawEvent::brush((5, 5), (5, 5), 20);
    alice.draw_local(block).unwrap();
    service.submit(1, block).unwrap();
    let _ = service.summary().unwrap();
    pump(&mut alice, &rx_a);
    pump(&mut bob, &rx_b);

    let alice_cut = DrawEvent::eraser((0, 4), (11, 4), 1);
    let bob_cut = DrawEvent::eraser((6, 0), (6, 11), 1);
    alice.draw_local(alice_cut).unwrap();
    bob.draw_local(bob_cut).unwrap();
    service.submit(1, alice_cut).unwrap();
    service.submit(2, bob_cut).unwrap();
    let summary = service.summary().unwrap();
    assert_eq!(summary.history_len, 3);

    let actions: Vec<_> = pump(&mut alice, &rx_a)
        .into_iter()
        .chain(pump(&mut bob, &rx_b))
        .collect();
    assert!(actions.iter().all(|action| *action == ReplicaAction::None));
    assert_eq!(alice.pending(), 0);
    assert_eq!(bob.pending(), 0);

    let server = server_state(&service, 12, 12);
    assert_eq!(alice.engine().buffer(), server.buffer());
    assert_eq!(bob.engine().buffer(), server.buffer());
    assert_eq!(summary.next_segment_index, server.next_segment_index());
    // Two perpendicular cuts leave four quadrants.
    assert_eq!(server.stats().len(), 4);
}

#[test]
fn late_joiner_rebuilds_from_short_log_and_suffix() {
    let service = RoomService::spawn("0", config(16, 16)).unwrap();
    let (tx, _rx) = mpsc::channel();
    service.join(1, tx).unwrap();
    for event in [
        DrawEvent::brush((0, 0), (15, 15), 3),
        DrawEvent::brush((15, 0), (0, 15), 2),
        DrawEvent::eraser((0, 8), (15, 8), 1),
        DrawEvent::brush((4, 4), (4, 4), 6),
    ] {
        service.draw(1, event).unwrap();
    }
    let snapshot = service.short_log().unwrap().unwrap();
    assert_eq!(snapshot.raw_len, 4);

    service.draw(1, DrawEvent::eraser((2, 0), (2, 15), 2)).unwrap();

    let mut late = ClientReplica::new("0", 16, 16);
    late.apply_short_log(snapshot).unwrap();
    assert_eq!(late.last_history_index(), 3);
    let suffix = service.replay_after(late.last_history_index()).unwrap();
    assert_eq!(suffix.len(), 1);
    late.apply_replay(&suffix).unwrap();

    assert_eq!(late.phase(), ReplicaPhase::Reconciled);
    assert_eq!(late.engine().buffer(), server_state(&service, 16, 16).buffer());
}

#[test]
fn replica_that_misses_a_broadcast_asks_for_a_replay() {
    let service = RoomService::spawn("0", config(8, 8)).unwrap();
    let (tx_a, _rx_a) = mpsc::channel();
    let (tx_b, rx_b) = mpsc::channel();
    service.join(1, tx_a).unwrap();
    service.join(2, tx_b).unwrap();

    let mut bob = ClientReplica::new("0", 8, 8);
    bob.apply_replay(&[]).unwrap();
    service.draw(1, DrawEvent::brush((1, 1), (1, 1), 1)).unwrap();
    service.draw(1, DrawEvent::brush((6, 6), (6, 6), 1)).unwrap();

    // Lose the first broadcast.
    let mut messages = rx_b.try_iter();
    let _ = messages.next();
    let action = bob.on_message(&messages.next().unwrap());
    assert_eq!(action, ReplicaAction::RequestReplay { after: -1 });
    assert!(bob.draw_local(DrawEvent::brush((0, 0), (0, 0), 1)).is_err());

    let request = bob.replay_request();
    let json = serde_json::to_string(&request).unwrap();
    assert_eq!(json, r#"{"imageIndex":"0","historyIndex":-1}"#);
    let entries = service.replay_after(request.history_index).unwrap();
    let response = ReplayResponse::from_entries(&entries);
    let response: ReplayResponse =
        serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
    bob.apply_replay(&response.into_entries(MAX_BRUSH).unwrap())
        .unwrap();

    assert_eq!(bob.engine().segment(Pos::new(1, 1)), 0);
    assert_eq!(bob.engine().segment(Pos::new(6, 6)), 1);
    assert_eq!(bob.last_history_index(), 1);
}

#[test]
fn hub_serves_replay_requests_per_image() {
    let settings = EngineSettings {
        images: vec![
            ImageSize {
                width: 6,
                height: 6,
            },
            ImageSize {
                width: 3,
                height: 3,
            },
        ],
        max_brush_size: MAX_BRUSH,
        ..EngineSettings::default()
    };
    let mut hub = RoomHub::from_settings(&settings).unwrap();
    let (tx, _rx) = mpsc::channel();
    let room = hub.room("1").unwrap();
    room.join(7, tx).unwrap();
    room.draw(7, DrawEvent::brush((0, 0), (2, 2), 1)).unwrap();
    room.draw(7, DrawEvent::eraser((1, 1), (1, 1), 1)).unwrap();

    let response = hub
        .replay(&ReplayRequest {
            image_index: "1".into(),
            history_index: 0,
        })
        .unwrap();
    assert_eq!(response.initial_state.len(), 1);
    assert_eq!(response.initial_state[0].history_index, 1);

    let empty = hub
        .replay(&ReplayRequest {
            image_index: "0".into(),
            history_index: -1,
        })
        .unwrap();
    assert!(empty.initial_state.is_empty());
    assert!(hub
        .replay(&ReplayRequest {
            image_index: "9".into(),
            history_index: -1,
        })
        .is_err());

    hub.shutdown();
    assert!(hub.room("0").unwrap().summary().is_err());
}

#[test]
fn hub_keeps_image_indices_when_an_image_is_empty() {
    let settings = EngineSettings {
        images: vec![
            ImageSize {
                width: 0,
                height: 0,
            },
            ImageSize {
                width: 3,
                height: 2,
            },
        ],
        ..EngineSettings::default()
    }
    .sanitize();
    let mut hub = RoomHub::from_settings(&settings).unwrap();
    assert!(hub.room("0").is_err());
    let summary = hub.room("1").unwrap().summary().unwrap();
    assert_eq!((summary.width, summary.height), (3, 2));
    hub.shutdown();
}

#[test]
fn reset_restarts_history_for_all_members() {
    let service = RoomService::spawn("0", config(4, 4)).unwrap();
    let (tx, rx) = mpsc::channel();
    service.join(1, tx).unwrap();
    let mut replica = ClientReplica::new("0", 4, 4);
    replica.apply_replay(&[]).unwrap();

    let event = DrawEvent::brush((0, 0), (3, 0), 1);
    replica.draw_local(event).unwrap();
    service.submit(1, event).unwrap();
    service.reset(ImageSize {
        width: 10,
        height: 5,
    })
    .unwrap();
    let summary = service.summary().unwrap();
    assert_eq!((summary.width, summary.height, summary.history_len), (10, 5, 0));

    pump(&mut replica, &rx);
    assert_eq!(replica.engine().width(), 10);
    assert_eq!(replica.last_history_index(), -1);
    assert_eq!(replica.engine().buffer().assigned_count(), 0);
}

#[test]
fn draws_from_strangers_leave_the_room_untouched() {
    let service = RoomService::spawn("0", config(4, 4)).unwrap();
    assert!(service.draw(42, DrawEvent::brush((0, 0), (0, 0), 1)).is_err());
    let summary = service.summary().unwrap();
    assert_eq!(summary.history_len, 0);
    assert_eq!(summary.next_segment_index, 0);
}
