//! Drives one upgraded WebSocket connection from open to teardown.

use axum::extract::ws::WebSocket;
use futures::StreamExt;

use crate::application::ActiveSession;
use crate::config::RelayConfig;

use super::pump::{inbound_pump, outbound_pump, PumpExit};

/// Runs the pump pair for an admitted session and tears it down afterwards.
///
/// The session is torn down on every path out of this function; if the
/// task itself is aborted, the session's drop guard takes over.
pub async fn run_connection(socket: WebSocket, mut session: ActiveSession, config: RelayConfig) {
    let conn = session.connection().clone();

    let (history, subscription) = match session.open(config.history_limit).await {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!(connection_id = %conn.id, room_id = %conn.room, error = %e, "Failed to open session");
            session.teardown().await;
            return;
        }
    };

    let (sink, stream) = socket.split();
    let inbound = tokio::spawn(inbound_pump(
        stream,
        conn.clone(),
        session.bus(),
        config.clone(),
    ));
    let outbound = tokio::spawn(outbound_pump(
        sink,
        subscription,
        history,
        conn.clone(),
        config,
    ));

    let (inbound, outbound) = tokio::join!(inbound, outbound);
    for (pump, result) in [("inbound", inbound), ("outbound", outbound)] {
        match result {
            Ok(exit) => log_exit(&conn, pump, &exit),
            Err(e) => {
                conn.cancel.cancel();
                tracing::error!(connection_id = %conn.id, pump, error = %e, "Pump task failed");
            }
        }
    }

    session.teardown().await;
}

fn log_exit(conn: &crate::application::Connection, pump: &'static str, exit: &PumpExit) {
    match exit.as_error() {
        Some(e) => tracing::info!(connection_id = %conn.id, user = %conn.user, pump, reason = %e, "Pump stopped"),
        None => tracing::debug!(connection_id = %conn.id, pump, exit = ?exit, "Pump stopped"),
    }
}
