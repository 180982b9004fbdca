//! WebSocket upgrade handler for room connections.
//!
//! Route: `GET /ws?room_id=<id>&token=<jwt>`
//!
//! Every check runs before the upgrade so rejections are plain HTTP
//! responses with the JSON error envelope:
//!
//! | Check                          | Status |
//! |--------------------------------|--------|
//! | Origin not allowed             | 403    |
//! | `room_id` missing or malformed | 400    |
//! | token missing or invalid       | 401    |
//! | room unknown                   | 404    |
//! | user already in the room       | 409    |
//! | bus/registry unreachable       | 503    |

use std::sync::Arc;

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::adapters::http::error::{ApiError, ErrorResponse};
use crate::adapters::http::middleware::bearer_token;
use crate::application::{RelayError, RelayServices, RoomSession};
use crate::config::RelayConfig;
use crate::domain::foundation::{AuthError, ValidationError};
use crate::ports::SessionValidator;

use super::connection::run_connection;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct RelayState {
    pub services: RelayServices,
    pub validator: Arc<dyn SessionValidator>,
    pub relay: RelayConfig,
    /// Origin accepted on upgrade; `None` accepts any.
    pub allowed_origin: Option<String>,
    /// Server-wide shutdown; every connection token is a child of it.
    pub shutdown: CancellationToken,
    /// Upgraded connections, awaited on shutdown until they have torn down.
    pub sessions: TaskTracker,
}

/// Query parameters for the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub room_id: Option<String>,
    /// Alternative to an `Authorization: Bearer` header.
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    State(state): State<RelayState>,
    headers: HeaderMap,
    Query(params): Query<ConnectParams>,
) -> Response {
    if !origin_allowed(&headers, state.allowed_origin.as_deref()) {
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::forbidden("Origin not allowed")),
        )
            .into_response();
    }

    let Some(room_id) = params.room_id.filter(|r| !r.trim().is_empty()) else {
        return ApiError::from(RelayError::Validation(ValidationError::empty_field("room_id")))
            .into_response();
    };

    let token = params
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers).map(str::to_owned));
    let Some(token) = token else {
        return ApiError::from(AuthError::MissingToken).into_response();
    };

    let user = match state.validator.validate(&token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!(room_id = %room_id, error = %e, "Upgrade rejected: invalid credentials");
            return ApiError::from(e).into_response();
        }
    };

    let session = RoomSession::new(state.services.clone(), user.username);
    let mut active = match session.admit(&room_id, &state.shutdown).await {
        Ok(active) => active,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let Some(ws) = ws else {
        active.teardown().await;
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("Expected a WebSocket upgrade request")),
        )
            .into_response();
    };

    let relay = state.relay.clone();
    let tracked = state.sessions.token();
    ws.max_message_size(relay.transport_limit())
        .max_frame_size(relay.transport_limit())
        .on_upgrade(move |socket| async move {
            run_connection(socket, active, relay).await;
            drop(tracked);
        })
}

fn origin_allowed(headers: &HeaderMap, allowed: Option<&str>) -> bool {
    let Some(allowed) = allowed else {
        return true;
    };
    match headers.get(header::ORIGIN).and_then(|o| o.to_str().ok()) {
        Some(origin) => origin.trim_end_matches('/') == allowed.trim_end_matches('/'),
        // Non-browser clients send no Origin.
        None => true,
    }
}
