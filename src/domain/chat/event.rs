//! Chat events - the unit of traffic relayed between room members.
//!
//! A [`ChatEvent`] is serialized identically on the wire and on the bus:
//!
//! ```text
//! {"user":"alice","type":"CHAT","content":"hi","timestamp":1705276800123}
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, Username, ValidationError};

/// Kind of chat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// A user joined the room (synthesized by the server).
    Join,
    /// A user left the room (synthesized by the server).
    Leave,
    /// A chat message sent by a user.
    Chat,
}

/// How inbound text frames from clients are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundMode {
    /// Frames are JSON event payloads; only `content` is taken from them.
    #[default]
    Json,
    /// Frames are the message content verbatim.
    Raw,
}

/// An immutable chat event.
///
/// Construct through [`ChatEvent::new`] (or the `joined`/`left`/`chat`
/// shorthands) so every event is stamped the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    user: Username,
    #[serde(rename = "type")]
    kind: EventKind,
    content: String,
    #[serde(default, with = "unix_millis")]
    timestamp: Timestamp,
}

impl ChatEvent {
    /// Creates an event stamped with the current time.
    pub fn new(user: Username, kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            user,
            kind,
            content: content.into(),
            timestamp: Timestamp::now(),
        }
    }

    /// JOIN event announcing `user` entered the room.
    pub fn joined(user: &Username) -> Self {
        let content = format!("{} joined the room", user);
        Self::new(user.clone(), EventKind::Join, content)
    }

    /// LEAVE event announcing `user` left the room.
    pub fn left(user: &Username) -> Self {
        let content = format!("{} left the room", user);
        Self::new(user.clone(), EventKind::Leave, content)
    }

    /// CHAT event authored by `user`.
    pub fn chat(user: &Username, content: impl Into<String>) -> Self {
        Self::new(user.clone(), EventKind::Chat, content)
    }

    /// Builds a CHAT event from a client text frame.
    ///
    /// The author is always the authenticated `user`; any `user` field in
    /// the frame is ignored. In JSON mode unknown fields are tolerated, but
    /// a frame that claims to be a JOIN or LEAVE is rejected.
    pub fn from_client_frame(
        user: &Username,
        text: &str,
        mode: InboundMode,
    ) -> Result<Self, ValidationError> {
        let content = match mode {
            InboundMode::Raw => text.to_string(),
            InboundMode::Json => {
                let frame: InboundFrame = serde_json::from_str(text)
                    .map_err(|e| ValidationError::invalid_format("frame", e.to_string()))?;
                if matches!(frame.kind, Some(kind) if kind != EventKind::Chat) {
                    return Err(ValidationError::invalid_format(
                        "type",
                        "clients may only send CHAT events",
                    ));
                }
                frame.content
            }
        };

        if content.trim().is_empty() {
            return Err(ValidationError::empty_field("content"));
        }

        Ok(Self::chat(user, content))
    }

    /// Parses an event from its JSON representation (wire or bus payload).
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Serializes the event to its JSON representation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn user(&self) -> &Username {
        &self.user
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Lenient view of a client frame.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type", default)]
    kind: Option<EventKind>,
    content: String,
}

mod unix_millis {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::domain::foundation::Timestamp;

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(ts.as_unix_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Ok(Timestamp::from_unix_millis(millis))
    }
}
