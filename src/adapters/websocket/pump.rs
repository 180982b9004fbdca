//! Connection pump pair.
//!
//! Every open connection runs two tasks sharing the connection's
//! cancellation token:
//!
//! ```text
//!   client ──frames──► inbound_pump ──publish──► MessageBus
//!   client ◄─frames─── outbound_pump ◄─events─── BusSubscription
//!                          ▲
//!                          └── keepalive ping every read_wait / 2
//! ```
//!
//! Whichever pump exits first cancels the token, which stops the other one.
//! Both pumps are generic over the socket halves so they can be driven by
//! in-process channels in tests.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::application::{Connection, RelayError};
use crate::config::RelayConfig;
use crate::domain::chat::ChatEvent;
use crate::ports::{BusError, BusSubscription, MessageBus};

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpExit {
    /// The client sent a close frame or the stream ended.
    ClientClosed,
    /// Nothing arrived from the client within the read deadline.
    ReadTimeout,
    ReadError(String),
    /// An inbound frame exceeded `max_message_size`.
    FrameTooLarge { limit: usize, actual: usize },
    /// Too many consecutive publishes failed.
    PublishFailures(u32),
    /// A write did not complete within the write deadline.
    WriteTimeout,
    WriteError(String),
    /// The subscription ended.
    BusClosed,
    BusFailed(String),
    /// The other pump or a server shutdown cancelled the connection.
    Cancelled,
}

impl PumpExit {
    /// Error describing an abnormal exit, `None` for orderly ones.
    pub fn as_error(&self) -> Option<RelayError> {
        match self {
            PumpExit::ClientClosed | PumpExit::Cancelled | PumpExit::BusClosed => None,
            PumpExit::ReadTimeout => Some(RelayError::PeerTimeout("read")),
            PumpExit::WriteTimeout => Some(RelayError::PeerTimeout("write")),
            PumpExit::FrameTooLarge { limit, actual } => Some(RelayError::Validation(
                crate::domain::foundation::ValidationError::FrameTooLarge {
                    limit: *limit,
                    actual: *actual,
                },
            )),
            PumpExit::PublishFailures(n) => Some(RelayError::BusUnavailable(format!(
                "{} consecutive publish failures",
                n
            ))),
            PumpExit::BusFailed(e) => Some(RelayError::BusUnavailable(e.clone())),
            PumpExit::ReadError(e) | PumpExit::WriteError(e) => {
                Some(RelayError::PeerDisconnected(e.clone()))
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Inbound
// ════════════════════════════════════════════════════════════════════════════════

/// Reads client frames and publishes them as CHAT events.
///
/// Every frame, including pings and pongs, resets the read deadline.
/// Frames that do not parse are dropped with a warning.
pub async fn inbound_pump<R, E>(
    mut stream: R,
    conn: Connection,
    bus: Arc<dyn MessageBus>,
    config: RelayConfig,
) -> PumpExit
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let _guard = conn.cancel.clone().drop_guard();
    let read_wait = config.read_wait();
    let mut failures = 0u32;

    loop {
        let next = tokio::select! {
            _ = conn.cancel.cancelled() => return PumpExit::Cancelled,
            next = timeout(read_wait, stream.next()) => next,
        };

        let message = match next {
            Err(_) => return PumpExit::ReadTimeout,
            Ok(None) => return PumpExit::ClientClosed,
            Ok(Some(Err(e))) => return PumpExit::ReadError(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };
        conn.stats.record_inbound();

        let text = match message {
            Message::Text(text) => text,
            Message::Binary(bytes) => {
                if bytes.len() > config.max_message_size {
                    return PumpExit::FrameTooLarge {
                        limit: config.max_message_size,
                        actual: bytes.len(),
                    };
                }
                tracing::warn!(connection_id = %conn.id, "Ignoring binary frame");
                continue;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return PumpExit::ClientClosed,
        };

        if text.len() > config.max_message_size {
            return PumpExit::FrameTooLarge {
                limit: config.max_message_size,
                actual: text.len(),
            };
        }

        let event = match ChatEvent::from_client_frame(&conn.user, &text, config.inbound_mode) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(connection_id = %conn.id, error = %e, "Dropping unparseable frame");
                continue;
            }
        };

        match bus.publish(&conn.room, &event).await {
            Ok(()) => failures = 0,
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    connection_id = %conn.id,
                    room_id = %conn.room,
                    error = %e,
                    failures,
                    "Publish failed"
                );
                if failures >= config.max_publish_failures {
                    return PumpExit::PublishFailures(failures);
                }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Outbound
// ════════════════════════════════════════════════════════════════════════════════

/// Writes `history`, then live bus events and keepalive pings, to the client.
///
/// Owns the subscription and closes it on exit. A close frame is attempted
/// on the way out.
pub async fn outbound_pump<W>(
    mut sink: W,
    mut subscription: Box<dyn BusSubscription>,
    history: Vec<ChatEvent>,
    conn: Connection,
    config: RelayConfig,
) -> PumpExit
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let exit = deliver(&mut sink, subscription.as_mut(), history, &conn, &config).await;

    subscription.close().await;
    conn.cancel.cancel();
    if !matches!(exit, PumpExit::WriteTimeout | PumpExit::WriteError(_)) {
        let _ = timeout(config.write_wait(), sink.send(Message::Close(None))).await;
    }
    exit
}

async fn deliver<W>(
    sink: &mut W,
    subscription: &mut dyn BusSubscription,
    history: Vec<ChatEvent>,
    conn: &Connection,
    config: &RelayConfig,
) -> PumpExit
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let write_wait = config.write_wait();

    for event in &history {
        if let Err(exit) = write_event(sink, event, conn, write_wait).await {
            return exit;
        }
    }

    let period = config.ping_period();
    let mut keepalive = interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = conn.cancel.cancelled() => return PumpExit::Cancelled,

            // Ahead of the subscription so a backlog cannot starve pings.
            _ = keepalive.tick() => {
                if let Err(exit) = write_frame(sink, Message::Ping(Vec::new()), write_wait).await {
                    return exit;
                }
            }

            next = subscription.next_event() => match next {
                Ok(Some(event)) => {
                    if let Err(exit) = write_event(sink, &event, conn, write_wait).await {
                        return exit;
                    }
                }
                Ok(None) => return PumpExit::BusClosed,
                Err(BusError::Malformed(e)) => {
                    tracing::warn!(connection_id = %conn.id, error = %e, "Skipping malformed bus payload");
                }
                Err(e) => return PumpExit::BusFailed(e.to_string()),
            },
        }
    }
}

async fn write_event<W>(
    sink: &mut W,
    event: &ChatEvent,
    conn: &Connection,
    write_wait: Duration,
) -> Result<(), PumpExit>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let json = match event.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(connection_id = %conn.id, error = %e, "Skipping unserializable event");
            return Ok(());
        }
    };
    write_frame(sink, Message::Text(json), write_wait).await?;
    conn.stats.record_outbound();
    Ok(())
}

async fn write_frame<W>(sink: &mut W, frame: Message, write_wait: Duration) -> Result<(), PumpExit>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match timeout(write_wait, sink.send(frame)).await {
        Err(_) => Err(PumpExit::WriteTimeout),
        Ok(Err(e)) => Err(PumpExit::WriteError(e.to_string())),
        Ok(Ok(())) => Ok(()),
    }
}
