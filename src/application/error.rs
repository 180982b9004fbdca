//! Relay error taxonomy.
//!
//! Errors raised while admitting a connection are mapped to HTTP responses
//! before the upgrade; errors after the upgrade end the connection.

use thiserror::Error;

use crate::domain::foundation::{
    AuthError, DomainError, ErrorCode, RoomId, Username, ValidationError,
};
use crate::ports::{BusError, RegistryError, RoomError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Room {0} not found")]
    RoomNotFound(RoomId),

    #[error("{user} is already connected to room {room}")]
    AlreadyJoined { room: RoomId, user: Username },

    #[error("Message bus unavailable: {0}")]
    BusUnavailable(String),

    /// The peer stopped reading or writing within its deadline.
    #[error("Peer missed its {0} deadline")]
    PeerTimeout(&'static str),

    /// The socket failed underneath the connection.
    #[error("Peer disconnected: {0}")]
    PeerDisconnected(String),

    /// Registry or room store failure.
    #[error("Backing store unavailable: {0}")]
    Store(String),
}

impl From<BusError> for RelayError {
    fn from(err: BusError) -> Self {
        RelayError::BusUnavailable(err.to_string())
    }
}

impl From<RegistryError> for RelayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyJoined { room, user } => RelayError::AlreadyJoined { room, user },
            RegistryError::Store(msg) => RelayError::Store(msg),
        }
    }
}

impl From<RoomError> for RelayError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::NotFound(id) => RelayError::RoomNotFound(id),
            other => RelayError::Store(other.to_string()),
        }
    }
}

impl From<RelayError> for DomainError {
    fn from(err: RelayError) -> Self {
        let message = err.to_string();
        match err {
            RelayError::Validation(e) => e.into(),
            RelayError::Auth(_) => DomainError::new(ErrorCode::Unauthorized, message),
            RelayError::RoomNotFound(id) => {
                DomainError::new(ErrorCode::RoomNotFound, message).with_detail("room_id", id.to_string())
            }
            RelayError::AlreadyJoined { room, .. } => {
                DomainError::new(ErrorCode::AlreadyJoined, message).with_detail("room_id", room.to_string())
            }
            RelayError::BusUnavailable(_) => DomainError::new(ErrorCode::BusUnavailable, message),
            RelayError::PeerTimeout(_) | RelayError::PeerDisconnected(_) => {
                DomainError::new(ErrorCode::InternalError, message)
            }
            RelayError::Store(_) => DomainError::new(ErrorCode::CacheError, message),
        }
    }
}
