//! Chat module - events relayed between members and the rooms they share.

mod event;
mod room;

pub use event::{ChatEvent, EventKind, InboundMode};
pub use room::{Room, RoomActivity, MAX_ROOM_NAME_LEN};
