//! Room session coordinator.
//!
//! Owns one connection's participation in a room:
//!
//! ```text
//! RoomSession (Joining) ──admit──► ActiveSession (Active)
//!        │                               │ open: subscribe, publish JOIN
//!        │ rejected                      │ ... pumps run ...
//!        ▼                               ▼ teardown
//!      Closed                   Leaving ──► Closed
//!                                 deregister, publish LEAVE
//! ```
//!
//! Deregistration is guaranteed: if an `ActiveSession` is dropped without
//! an explicit [`ActiveSession::teardown`] (an early return, a panic in the
//! connection task), its `Drop` spawns the same release steps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::chat::ChatEvent;
use crate::domain::foundation::{ConnectionId, RoomId, StateMachine, Username};
use crate::domain::session::SessionStatus;
use crate::ports::{BusSubscription, MessageBus, RoomRegistry, RoomRepository};

use super::RelayError;

/// Collaborators shared by every room session.
#[derive(Clone)]
pub struct RelayServices {
    pub bus: Arc<dyn MessageBus>,
    pub registry: Arc<dyn RoomRegistry>,
    pub rooms: Arc<dyn RoomRepository>,
}

impl RelayServices {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        registry: Arc<dyn RoomRegistry>,
        rooms: Arc<dyn RoomRepository>,
    ) -> Self {
        Self {
            bus,
            registry,
            rooms,
        }
    }
}

/// Frame counters of one connection.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    inbound: AtomicU64,
    outbound: AtomicU64,
}

impl ConnectionStats {
    pub fn record_inbound(&self) {
        self.inbound.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outbound(&self) {
        self.outbound.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inbound(&self) -> u64 {
        self.inbound.load(Ordering::Relaxed)
    }

    pub fn outbound(&self) -> u64 {
        self.outbound.load(Ordering::Relaxed)
    }
}

/// An admitted connection bound to a room.
///
/// The cancellation token is the connection's only teardown trigger; both
/// pumps watch it and cancel it when they exit.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub user: Username,
    pub room: RoomId,
    pub cancel: CancellationToken,
    pub stats: Arc<ConnectionStats>,
}

/// A connection that has authenticated but not yet joined a room.
pub struct RoomSession {
    services: RelayServices,
    id: ConnectionId,
    user: Username,
    status: SessionStatus,
}

impl RoomSession {
    pub fn new(services: RelayServices, user: Username) -> Self {
        Self {
            services,
            id: ConnectionId::new(),
            user,
            status: SessionStatus::Joining,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Validates the room and registers the user in it.
    ///
    /// On success the returned session is `Active` and counted in the
    /// registry. On failure nothing was registered and the session is
    /// closed.
    ///
    /// `shutdown` is the server-wide token; the connection's token is a
    /// child of it.
    pub async fn admit(
        mut self,
        raw_room_id: &str,
        shutdown: &CancellationToken,
    ) -> Result<ActiveSession, RelayError> {
        match self.register(raw_room_id).await {
            Ok(room) => {
                let status = self.status.transition_to(SessionStatus::Active)?;
                tracing::info!(
                    connection_id = %self.id,
                    room_id = %room,
                    user = %self.user,
                    "Session admitted"
                );
                Ok(ActiveSession {
                    connection: Connection {
                        id: self.id,
                        user: self.user,
                        room,
                        cancel: shutdown.child_token(),
                        stats: Arc::new(ConnectionStats::default()),
                    },
                    services: self.services,
                    status,
                    announced: false,
                    torn_down: false,
                })
            }
            Err(e) => {
                self.status = self.status.transition_to(SessionStatus::Closed)?;
                tracing::debug!(connection_id = %self.id, user = %self.user, error = %e, "Session rejected");
                Err(e)
            }
        }
    }

    async fn register(&self, raw_room_id: &str) -> Result<RoomId, RelayError> {
        let room = RoomId::new(raw_room_id)?;

        if self.services.rooms.get(&room).await?.is_none() {
            return Err(RelayError::RoomNotFound(room));
        }

        self.services.registry.join(&room, &self.user).await?;
        Ok(room)
    }
}

/// A registered connection.
///
/// Call [`ActiveSession::teardown`] when the pumps have exited. Calling it
/// again is a no-op, and dropping the session without calling it still
/// deregisters the user.
pub struct ActiveSession {
    connection: Connection,
    services: RelayServices,
    status: SessionStatus,
    announced: bool,
    torn_down: bool,
}

impl ActiveSession {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn bus(&self) -> Arc<dyn MessageBus> {
        Arc::clone(&self.services.bus)
    }

    /// Subscribes to the room and announces the user.
    ///
    /// The subscription is opened before the JOIN is published, so the
    /// joining client sees its own JOIN. On log backends up to
    /// `history_limit` recent events are returned, and the subscription
    /// resumes right after them.
    pub async fn open(
        &mut self,
        history_limit: usize,
    ) -> Result<(Vec<ChatEvent>, Box<dyn BusSubscription>), RelayError> {
        let bus = &self.services.bus;
        let room = &self.connection.room;

        let (history, mut subscription) = if bus.capabilities().history && history_limit > 0 {
            bus.subscribe_with_history(room, history_limit).await?
        } else {
            (Vec::new(), bus.subscribe(room).await?)
        };

        if let Err(e) = bus.publish(room, &ChatEvent::joined(&self.connection.user)).await {
            subscription.close().await;
            return Err(e.into());
        }
        self.announced = true;

        tracing::debug!(
            connection_id = %self.connection.id,
            room_id = %room,
            backend = bus.name(),
            history = history.len(),
            "Session opened"
        );
        Ok((history, subscription))
    }

    /// Deregisters the user and announces the departure.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.connection.cancel.cancel();
        self.status = SessionStatus::Leaving;

        release(
            self.services.clone(),
            self.connection.clone(),
            self.announced,
        )
        .await;

        self.status = SessionStatus::Closed;
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.connection.cancel.cancel();

        let services = self.services.clone();
        let connection = self.connection.clone();
        let announced = self.announced;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(release(services, connection, announced));
            }
            Err(_) => tracing::error!(
                connection_id = %connection.id,
                room_id = %connection.room,
                "No runtime available to deregister dropped session"
            ),
        }
    }
}

async fn release(services: RelayServices, connection: Connection, announced: bool) {
    let Connection {
        id, user, room, stats, ..
    } = connection;

    if let Err(e) = services.registry.leave(&room, &user).await {
        tracing::error!(connection_id = %id, room_id = %room, user = %user, error = %e, "Failed to deregister session");
    }

    if announced {
        if let Err(e) = services.bus.publish(&room, &ChatEvent::left(&user)).await {
            tracing::warn!(connection_id = %id, room_id = %room, error = %e, "Failed to publish LEAVE");
        }
    }

    tracing::info!(
        connection_id = %id,
        room_id = %room,
        user = %user,
        frames_in = stats.inbound(),
        frames_out = stats.outbound(),
        "Session closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bus::InMemoryPubSubBus;
    use crate::adapters::registry::InMemoryRoomRegistry;
    use crate::adapters::rooms::InMemoryRoomRepository;
    use crate::domain::chat::{EventKind, Room};
    use std::time::Duration;

    struct Fixture {
        services: RelayServices,
        registry: Arc<InMemoryRoomRegistry>,
        shutdown: CancellationToken,
    }

    fn fixture() -> Fixture {
        let admin = Username::new("admin").unwrap();
        let rooms = InMemoryRoomRepository::with_rooms([Room::new("r1", admin, None).unwrap()]);
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let services = RelayServices::new(
            Arc::new(InMemoryPubSubBus::new(16)),
            registry.clone(),
            Arc::new(rooms),
        );
        Fixture {
            services,
            registry,
            shutdown: CancellationToken::new(),
        }
    }

    fn user(name: &str) -> Username {
        Username::new(name).unwrap()
    }

    fn r1() -> RoomId {
        RoomId::new("r1").unwrap()
    }

    #[tokio::test]
    async fn admit_registers_and_activates() {
        let fx = fixture();
        let session = RoomSession::new(fx.services.clone(), user("alice"));
        assert_eq!(session.status(), SessionStatus::Joining);

        let active = session.admit("r1", &fx.shutdown).await.unwrap();

        assert_eq!(active.status(), SessionStatus::Active);
        assert_eq!(active.connection().room, r1());
        assert_eq!(fx.registry.active_count(&r1()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn admit_rejects_malformed_and_unknown_rooms() {
        let fx = fixture();

        let err = RoomSession::new(fx.services.clone(), user("alice"))
            .admit("Not A Room!", &fx.shutdown)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Validation(_)));

        let err = RoomSession::new(fx.services.clone(), user("alice"))
            .admit("nowhere", &fx.shutdown)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::RoomNotFound(_)));
        assert!(fx.registry.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_connection_for_same_user_is_rejected() {
        let fx = fixture();
        let _first = RoomSession::new(fx.services.clone(), user("alice"))
            .admit("r1", &fx.shutdown)
            .await
            .unwrap();

        let err = RoomSession::new(fx.services.clone(), user("alice"))
            .admit("r1", &fx.shutdown)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::AlreadyJoined { .. }));
        assert_eq!(fx.registry.active_count(&r1()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn open_subscribes_before_announcing_join() {
        let fx = fixture();
        let mut active = RoomSession::new(fx.services.clone(), user("alice"))
            .admit("r1", &fx.shutdown)
            .await
            .unwrap();

        let (history, mut sub) = active.open(10).await.unwrap();
        assert!(history.is_empty());

        let join = sub.next_event().await.unwrap().unwrap();
        assert_eq!(join.kind(), EventKind::Join);
        assert_eq!(join.content(), "alice joined the room");
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let fx = fixture();
        let mut observer = fx.services.bus.subscribe(&r1()).await.unwrap();
        let _bob = RoomSession::new(fx.services.clone(), user("bob"))
            .admit("r1", &fx.shutdown)
            .await
            .unwrap();
        let mut alice = RoomSession::new(fx.services.clone(), user("alice"))
            .admit("r1", &fx.shutdown)
            .await
            .unwrap();
        let (_, _sub) = alice.open(0).await.unwrap();

        alice.teardown().await;
        alice.teardown().await;

        assert_eq!(alice.status(), SessionStatus::Closed);
        assert!(alice.connection().cancel.is_cancelled());
        assert_eq!(fx.registry.active_count(&r1()).await.unwrap(), 1);

        let join = observer.next_event().await.unwrap().unwrap();
        assert_eq!(join.kind(), EventKind::Join);
        let leave = observer.next_event().await.unwrap().unwrap();
        assert_eq!(leave.kind(), EventKind::Leave);

        let extra = tokio::time::timeout(Duration::from_millis(50), observer.next_event()).await;
        assert!(extra.is_err(), "a second LEAVE was published");
    }

    #[tokio::test]
    async fn dropped_session_still_deregisters() {
        let fx = fixture();
        let active = RoomSession::new(fx.services.clone(), user("alice"))
            .admit("r1", &fx.shutdown)
            .await
            .unwrap();
        let cancel = active.connection().cancel.clone();

        drop(active);

        assert!(cancel.is_cancelled());
        for _ in 0..50 {
            if fx.registry.active_count(&r1()).await.unwrap() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("dropped session was never deregistered");
    }

    #[tokio::test]
    async fn shutdown_cancels_connection_token() {
        let fx = fixture();
        let active = RoomSession::new(fx.services.clone(), user("alice"))
            .admit("r1", &fx.shutdown)
            .await
            .unwrap();

        fx.shutdown.cancel();
        assert!(active.connection().cancel.is_cancelled());
    }
}
