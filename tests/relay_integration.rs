//! End-to-end relay scenarios over real WebSocket connections.

mod common;

use std::time::Duration;

use futures::SinkExt;
use tokio::time::Instant;
use room_relay::config::BusBackend;
use room_relay::domain::chat::{ChatEvent, EventKind, InboundMode};
use room_relay::domain::foundation::Username;
use tokio_tungstenite::tungstenite::Message;

use common::{assert_silent, next_event, say, TestServer};

#[tokio::test]
async fn join_broadcast_and_leave() {
    let server = TestServer::start(|_| {}, &["r1"]).await;

    let mut alice = server.connect("alice", "r1").await;
    let join = next_event(&mut alice).await;
    assert_eq!((join.kind(), join.user().as_str()), (EventKind::Join, "alice"));

    let mut bob = server.connect("bob", "r1").await;
    let join = next_event(&mut bob).await;
    assert_eq!((join.kind(), join.user().as_str()), (EventKind::Join, "bob"));
    let join = next_event(&mut alice).await;
    assert_eq!((join.kind(), join.user().as_str()), (EventKind::Join, "bob"));
    assert_eq!(server.active_count("r1").await, 2);

    say(&mut alice, "hello").await;
    for client in [&mut bob, &mut alice] {
        let chat = next_event(client).await;
        assert_eq!(chat.kind(), EventKind::Chat);
        assert_eq!(chat.user().as_str(), "alice");
        assert_eq!(chat.content(), "hello");
    }

    bob.close(None).await.unwrap();
    let leave = next_event(&mut alice).await;
    assert_eq!((leave.kind(), leave.user().as_str()), (EventKind::Leave, "bob"));
    server.wait_for_count("r1", 1).await;
}

#[tokio::test]
async fn rooms_are_isolated() {
    let server = TestServer::start(|_| {}, &["r1", "r2"]).await;

    let mut alice = server.connect("alice", "r1").await;
    next_event(&mut alice).await;
    let mut carol = server.connect("carol", "r2").await;
    next_event(&mut carol).await;

    say(&mut alice, "only r1").await;
    assert_eq!(next_event(&mut alice).await.content(), "only r1");
    assert_silent(&mut carol, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn client_cannot_spoof_author_or_kind() {
    let server = TestServer::start(|_| {}, &["r1"]).await;
    let mut alice = server.connect("alice", "r1").await;
    next_event(&mut alice).await;

    let spoofed = r#"{"user":"mallory","type":"CHAT","content":"trust me"}"#;
    alice.send(Message::Text(spoofed.to_string())).await.unwrap();
    let fake_leave = r#"{"type":"LEAVE","content":"alice left the room"}"#;
    alice.send(Message::Text(fake_leave.to_string())).await.unwrap();
    say(&mut alice, "after").await;

    let chat = next_event(&mut alice).await;
    assert_eq!(chat.user().as_str(), "alice");
    assert_eq!(chat.content(), "trust me");
    assert_eq!(next_event(&mut alice).await.content(), "after");
}

#[tokio::test]
async fn raw_mode_relays_text_verbatim() {
    let server = TestServer::start(|c| c.relay.inbound_mode = InboundMode::Raw, &["r1"]).await;
    let mut alice = server.connect("alice", "r1").await;
    next_event(&mut alice).await;

    alice.send(Message::Text("{not json}".to_string())).await.unwrap();
    let chat = next_event(&mut alice).await;
    assert_eq!(chat.content(), "{not json}");
}

#[tokio::test]
async fn history_replay_on_log_backend() {
    let server = TestServer::start(
        |c| {
            c.bus.backend = BusBackend::Log;
            c.relay.history_limit = 10;
        },
        &["r2"],
    )
    .await;

    let author = Username::new("alice").unwrap();
    for i in 1..=15 {
        server
            .publish("r2", &ChatEvent::chat(&author, format!("m{}", i)))
            .await;
    }

    let mut dave = server.connect("dave", "r2").await;
    let mut replayed = Vec::new();
    for _ in 0..10 {
        replayed.push(next_event(&mut dave).await.content().to_string());
    }
    let expected: Vec<String> = (6..=15).map(|i| format!("m{}", i)).collect();
    assert_eq!(replayed, expected);

    let join = next_event(&mut dave).await;
    assert_eq!((join.kind(), join.user().as_str()), (EventKind::Join, "dave"));
}

#[tokio::test]
async fn pubsub_backend_replays_nothing() {
    let server = TestServer::start(|_| {}, &["r1"]).await;
    server
        .publish("r1", &ChatEvent::chat(&Username::new("alice").unwrap(), "lost"))
        .await;

    let mut bob = server.connect("bob", "r1").await;
    let first = next_event(&mut bob).await;
    assert_eq!(first.kind(), EventKind::Join);
}

#[tokio::test]
async fn upgrade_rejections() {
    let server = TestServer::start(|_| {}, &["r1"]).await;
    let alice = server.token("alice");

    assert_eq!(server.rejection_status(&format!("token={}", alice)).await, 400);
    assert_eq!(
        server.rejection_status(&format!("room_id=Not%20Valid&token={}", alice)).await,
        400
    );
    assert_eq!(server.rejection_status("room_id=r1").await, 401);
    assert_eq!(server.rejection_status("room_id=r1&token=garbage").await, 401);
    assert_eq!(
        server.rejection_status(&format!("room_id=nowhere&token={}", alice)).await,
        404
    );

    let mut first = server.connect("alice", "r1").await;
    next_event(&mut first).await;
    assert_eq!(
        server.rejection_status(&format!("room_id=r1&token={}", alice)).await,
        409
    );
    assert_eq!(server.active_count("r1").await, 1);
}

#[tokio::test]
async fn oversized_frame_terminates_connection() {
    let server = TestServer::start(|c| c.relay.inbound_mode = InboundMode::Raw, &["r1"]).await;
    let mut alice = server.connect("alice", "r1").await;
    next_event(&mut alice).await;

    alice.send(Message::Text("x".repeat(512))).await.unwrap();
    assert_eq!(next_event(&mut alice).await.content().len(), 512);

    alice.send(Message::Text("x".repeat(513))).await.unwrap();
    server.wait_for_count("r1", 0).await;
}

#[tokio::test]
async fn frame_well_over_the_limit_terminates_connection() {
    let server = TestServer::start(|c| c.relay.inbound_mode = InboundMode::Raw, &["r1"]).await;
    let mut alice = server.connect("alice", "r1").await;
    next_event(&mut alice).await;

    alice.send(Message::Text("x".repeat(2048))).await.unwrap();
    server.wait_for_count("r1", 0).await;
}

#[tokio::test]
async fn silent_peer_is_dropped_after_read_wait() {
    let server = TestServer::start(|c| c.relay.read_wait_ms = Some(300), &["r1"]).await;
    let mut observer = server.connect("observer", "r1").await;
    next_event(&mut observer).await;

    // Never polled again, so it never answers pings.
    let _silent = server.connect("silent", "r1").await;
    assert_eq!(next_event(&mut observer).await.kind(), EventKind::Join);

    // Reading keeps the observer answering pings while the silent peer expires.
    let leave = next_event(&mut observer).await;
    assert_eq!((leave.kind(), leave.user().as_str()), (EventKind::Leave, "silent"));
    assert_eq!(server.active_count("r1").await, 1);
}

#[tokio::test]
async fn shutdown_closes_every_session() {
    let server = TestServer::start(|_| {}, &["r1", "r2"]).await;
    let mut alice = server.connect("alice", "r1").await;
    next_event(&mut alice).await;
    let mut bob = server.connect("bob", "r2").await;
    next_event(&mut bob).await;

    server.shutdown.cancel();

    server.wait_for_count("r1", 0).await;
    server.wait_for_count("r2", 0).await;
}

/// Reads `client` until an event with `content` arrives.
async fn read_until(client: &mut common::Client, content: &str) -> ChatEvent {
    loop {
        let event = next_event(client).await;
        if event.content() == content {
            return event;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stalled_member_is_dropped_while_the_room_keeps_flowing() {
    let server = TestServer::start(|c| c.relay.write_wait_ms = Some(500), &["r1"]).await;
    let mut bob = server.connect("bob", "r1").await;
    next_event(&mut bob).await;

    // Never read again, so its socket buffers fill up.
    let _stalled = server.connect("stalled", "r1").await;
    assert_eq!(next_event(&mut bob).await.kind(), EventKind::Join);

    let reader = tokio::spawn(async move {
        let event = read_until(&mut bob, "after").await;
        (bob, event)
    });

    let author = Username::new("alice").unwrap();
    let filler = "x".repeat(4096);
    let deadline = Instant::now() + Duration::from_secs(20);
    while server.active_count("r1").await == 2 {
        assert!(Instant::now() < deadline, "stalled member was never dropped");
        for _ in 0..20 {
            server.publish("r1", &ChatEvent::chat(&author, filler.clone())).await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(server.active_count("r1").await, 1);
    server.publish("r1", &ChatEvent::chat(&author, "after")).await;
    let (_bob, event) = reader.await.unwrap();
    assert_eq!(event.user().as_str(), "alice");
    assert_eq!(server.active_count("r1").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quiet_listener_survives_a_busy_room() {
    let server = TestServer::start(|c| c.relay.read_wait_ms = Some(400), &["r1"]).await;
    let mut bob = server.connect("bob", "r1").await;
    next_event(&mut bob).await;

    let reader = tokio::spawn(async move {
        let event = read_until(&mut bob, "done").await;
        (bob, event)
    });

    // Several read deadlines worth of traffic; bob only ever answers pings.
    let author = Username::new("alice").unwrap();
    let until = Instant::now() + Duration::from_millis(1_500);
    let mut sent = 0;
    while Instant::now() < until {
        for _ in 0..10 {
            sent += 1;
            server
                .publish("r1", &ChatEvent::chat(&author, format!("m{}", sent)))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(server.active_count("r1").await, 1);

    server.publish("r1", &ChatEvent::chat(&author, "done")).await;
    let (_bob, event) = reader.await.unwrap();
    assert_eq!(event.content(), "done");
    assert_eq!(server.active_count("r1").await, 1);
}
