//! Shared harness: a real relay server on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use room_relay::adapters::auth::JwtTokenIssuer;
use room_relay::application::RelayServices;
use room_relay::bootstrap::{build_state, serve};
use room_relay::config::AppConfig;
use room_relay::domain::chat::{ChatEvent, Room};
use room_relay::domain::foundation::{RoomId, Username};
use room_relay::ports::{MessageBus, RoomRegistry, RoomRepository};
use secrecy::SecretString;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub const SECRET: &str = "integration-test-secret";

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub services: RelayServices,
    issuer: JwtTokenIssuer,
    server: JoinHandle<()>,
}

impl TestServer {
    /// Starts a server with in-memory adapters and the given rooms.
    pub async fn start(configure: impl FnOnce(&mut AppConfig), rooms: &[&str]) -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = SecretString::new(SECRET.to_string());
        configure(&mut config);

        let shutdown = CancellationToken::new();
        let state = build_state(&config, shutdown.clone()).await.unwrap();
        let services = state.relay.services.clone();

        let admin = Username::new("admin").unwrap();
        for name in rooms {
            services
                .rooms
                .create(Room::new(*name, admin.clone(), None).unwrap())
                .await
                .unwrap();
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = shutdown.clone();
        let server = tokio::spawn(async move {
            serve(listener, state, async move { token.cancelled().await })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown,
            services,
            issuer: JwtTokenIssuer::new(
                &SecretString::new(SECRET.to_string()),
                Duration::from_secs(3600),
                None,
            ),
            server,
        }
    }

    /// Signals shutdown and waits for the server, sessions included, to stop.
    pub async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.server)
            .await
            .expect("server did not stop")
            .unwrap();
    }

    pub fn token(&self, user: &str) -> String {
        self.issuer.issue(&Username::new(user).unwrap()).unwrap()
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws?{}", self.addr, query)
    }

    /// Connects `user` to `room`, panicking on rejection.
    pub async fn connect(&self, user: &str, room: &str) -> Client {
        let url = self.ws_url(&format!("room_id={}&token={}", room, self.token(user)));
        let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        client
    }

    /// Attempts an upgrade and returns the HTTP status it was rejected with.
    pub async fn rejection_status(&self, query: &str) -> u16 {
        match tokio_tungstenite::connect_async(self.ws_url(query)).await {
            Ok(_) => panic!("upgrade unexpectedly succeeded for {}", query),
            Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    pub async fn active_count(&self, room: &str) -> usize {
        self.services
            .registry
            .active_count(&RoomId::new(room).unwrap())
            .await
            .unwrap()
    }

    /// Polls the registry until `room` has `expected` members.
    pub async fn wait_for_count(&self, room: &str, expected: usize) {
        for _ in 0..500 {
            if self.active_count(room).await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "room {} never reached {} members (has {})",
            room,
            expected,
            self.active_count(room).await
        );
    }

    pub async fn publish(&self, room: &str, event: &ChatEvent) {
        self.services
            .bus
            .publish(&RoomId::new(room).unwrap(), event)
            .await
            .unwrap();
    }
}

/// Reads the next event, skipping control frames.
pub async fn next_event(client: &mut Client) -> ChatEvent {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for an event")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return ChatEvent::from_json(&text).unwrap();
        }
    }
}

/// Asserts no event arrives within `wait`.
pub async fn assert_silent(client: &mut Client, wait: Duration) {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, client.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected event: {}", text),
            Ok(Some(Ok(_))) => continue,
            Ok(other) => panic!("connection ended: {:?}", other.map(|r| r.is_ok())),
        }
    }
}

pub async fn say(client: &mut Client, content: &str) {
    let frame = serde_json::json!({ "type": "CHAT", "content": content }).to_string();
    client.send(Message::Text(frame)).await.unwrap();
}
