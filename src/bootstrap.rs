//! Composition root: builds adapters from configuration and wires the router.
//!
//! Backends are chosen once here. With no Redis URL every port gets its
//! in-memory adapter; otherwise one multiplexed connection is shared by the
//! registry, the room store and the bus publisher.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use redis::aio::MultiplexedConnection;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::adapters::auth::JwtSessionValidator;
use crate::adapters::bus::{InMemoryLogBus, InMemoryPubSubBus, RedisPubSubBus, RedisStreamBus};
use crate::adapters::http::middleware::{auth_middleware, AuthState};
use crate::adapters::http::{health_routes, room_routes, RoomHandlers};
use crate::adapters::registry::{InMemoryRoomRegistry, RedisRoomRegistry};
use crate::adapters::rooms::{InMemoryRoomRepository, RedisRoomRepository};
use crate::adapters::websocket::{ws_handler, RelayState};
use crate::application::RelayServices;
use crate::config::{AppConfig, BusBackend, BusConfig, RedisConfig};
use crate::ports::{MessageBus, SessionValidator};

/// Slack on top of `write_wait` for sessions to publish LEAVE and deregister.
const DRAIN_MARGIN: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Redis connection failed: {0}")]
    Redis(String),
}

/// Everything the router needs.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayState,
    pub rooms: RoomHandlers,
    pub validator: AuthState,
    pub cors_origins: Vec<String>,
}

/// Builds adapters for `config` with JWT validation.
pub async fn build_state(
    config: &AppConfig,
    shutdown: CancellationToken,
) -> Result<AppState, BootstrapError> {
    let validator: Arc<dyn SessionValidator> = Arc::new(JwtSessionValidator::new(
        &config.auth.jwt_secret,
        config.auth.issuer.as_deref(),
    ));
    build_state_with_validator(config, validator, shutdown).await
}

/// Builds adapters for `config` around an existing session validator.
pub async fn build_state_with_validator(
    config: &AppConfig,
    validator: Arc<dyn SessionValidator>,
    shutdown: CancellationToken,
) -> Result<AppState, BootstrapError> {
    let services = if config.redis.is_enabled() {
        redis_services(&config.redis, &config.bus).await?
    } else {
        tracing::warn!("No Redis URL configured, using in-memory adapters (single instance only)");
        in_memory_services(&config.bus)
    };
    tracing::info!(
        bus = services.bus.name(),
        history = services.bus.capabilities().history,
        "Message bus ready"
    );

    let rooms = RoomHandlers::new(
        Arc::clone(&services.rooms),
        Arc::clone(&services.registry),
        config.rooms.retention_secs(),
    );
    let relay = RelayState {
        services,
        validator: Arc::clone(&validator),
        relay: config.relay.clone(),
        allowed_origin: config.server.allowed_origin.clone(),
        shutdown,
        sessions: TaskTracker::new(),
    };

    Ok(AppState {
        relay,
        rooms,
        validator,
        cors_origins: config.server.cors_origins_list(),
    })
}

fn in_memory_services(bus: &BusConfig) -> RelayServices {
    let message_bus: Arc<dyn MessageBus> = match bus.backend {
        BusBackend::PubSub => Arc::new(InMemoryPubSubBus::new(bus.channel_capacity)),
        BusBackend::Log => Arc::new(InMemoryLogBus::new(bus.max_log_len)),
    };
    RelayServices::new(
        message_bus,
        Arc::new(InMemoryRoomRegistry::new()),
        Arc::new(InMemoryRoomRepository::new()),
    )
}

async fn redis_services(redis: &RedisConfig, bus: &BusConfig) -> Result<RelayServices, BootstrapError> {
    let client = redis::Client::open(redis.url.as_str())
        .map_err(|e| BootstrapError::Redis(e.to_string()))?;
    let conn: MultiplexedConnection =
        tokio::time::timeout(redis.timeout(), client.get_multiplexed_tokio_connection())
            .await
            .map_err(|_| BootstrapError::Redis(format!("timed out after {:?}", redis.timeout())))?
            .map_err(|e| BootstrapError::Redis(e.to_string()))?;

    let prefix = redis.key_prefix.as_str();
    let message_bus: Arc<dyn MessageBus> = match bus.backend {
        BusBackend::PubSub => Arc::new(RedisPubSubBus::new(client, conn.clone(), prefix)),
        BusBackend::Log => Arc::new(RedisStreamBus::new(
            client,
            conn.clone(),
            prefix,
            bus.max_log_len,
        )),
    };

    tracing::info!(key_prefix = prefix, "Connected to Redis");
    Ok(RelayServices::new(
        message_bus,
        Arc::new(RedisRoomRegistry::new(conn.clone(), prefix)),
        Arc::new(RedisRoomRepository::new(conn, prefix)),
    ))
}

/// Assembles every route with tracing and CORS layers.
pub fn build_router(state: AppState) -> Router {
    let rooms = room_routes(state.rooms)
        .layer(middleware::from_fn_with_state(state.validator, auth_middleware));
    let ws = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state.relay);

    Router::new()
        .merge(health_routes())
        .merge(ws)
        .nest("/rooms", rooms)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.cors_origins))
}

/// Serves `state` until `signal` resolves, then drains open sessions.
///
/// Upgraded connections outlive axum's graceful shutdown, so every session
/// is cancelled and awaited here before returning. Sessions still running
/// after `write_wait` plus a margin are abandoned with a warning.
pub async fn serve<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = state.relay.shutdown.clone();
    let sessions = state.relay.sessions.clone();
    let grace = state.relay.relay.write_wait() + DRAIN_MARGIN;

    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(signal)
        .await;

    shutdown.cancel();
    drain_sessions(&sessions, grace).await;
    served
}

async fn drain_sessions(sessions: &TaskTracker, grace: Duration) {
    sessions.close();
    tracing::info!(open = sessions.len(), "Draining sessions");
    if tokio::time::timeout(grace, sessions.wait()).await.is_err() {
        tracing::warn!(
            remaining = sessions.len(),
            grace_ms = grace.as_millis() as u64,
            "Sessions still open after shutdown grace period"
        );
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
