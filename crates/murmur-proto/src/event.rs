//! Typed wire events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant carried in the `type` field of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Participant joined the room.
    Enter,
    /// Participant left the room.
    Leave,
    /// Chat message.
    Talk,
    /// Authoritative membership snapshot.
    ParticipantList,
}

impl EventKind {
    /// All kinds, in wire order.
    pub const ALL: [Self; 4] = [Self::Enter, Self::Leave, Self::Talk, Self::ParticipantList];

    /// Wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enter => "ENTER",
            Self::Leave => "LEAVE",
            Self::Talk => "TALK",
            Self::ParticipantList => "PARTICIPANT_LIST",
        }
    }

    /// Parse a wire name. `None` for anything outside the four known kinds.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single protocol event.
///
/// The serde representation is internally tagged by `type`, so the Rust
/// variant and the wire discriminant can never disagree.
///
/// # Invariants
///
/// - Only the server assigns `moderation_count`. Frames produced by
///   [`crate::encode_outbound`] never carry it.
/// - `ParticipantList` is the only variant without a sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireEvent {
    /// Participant joined. Sent by the client as the connection handshake.
    Enter {
        /// Display name of the participant.
        sender: String,
        /// Display-formatted time.
        time: String,
    },

    /// Participant left.
    Leave {
        /// Display name of the participant.
        sender: String,
        /// Display-formatted time.
        time: String,
    },

    /// Chat message.
    Talk {
        /// Display name of the author.
        sender: String,
        /// Message text.
        content: String,
        /// Display-formatted time.
        time: String,
        /// Server-assigned running moderation count, if any.
        #[serde(rename = "moderationCount", default, skip_serializing_if = "Option::is_none")]
        moderation_count: Option<u64>,
    },

    /// Full membership snapshot, in server order.
    ParticipantList {
        /// Display names of everyone present.
        members: Vec<String>,
    },
}

impl WireEvent {
    /// `ENTER` event for `sender`.
    pub fn enter(sender: impl Into<String>, time: impl Into<String>) -> Self {
        Self::Enter { sender: sender.into(), time: time.into() }
    }

    /// `LEAVE` event for `sender`.
    pub fn leave(sender: impl Into<String>, time: impl Into<String>) -> Self {
        Self::Leave { sender: sender.into(), time: time.into() }
    }

    /// Client-side `TALK` event. Never carries a moderation count.
    pub fn talk(
        sender: impl Into<String>,
        content: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self::Talk {
            sender: sender.into(),
            content: content.into(),
            time: time.into(),
            moderation_count: None,
        }
    }

    /// `PARTICIPANT_LIST` event.
    pub fn participant_list<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ParticipantList { members: members.into_iter().map(Into::into).collect() }
    }

    /// Discriminant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Enter { .. } => EventKind::Enter,
            Self::Leave { .. } => EventKind::Leave,
            Self::Talk { .. } => EventKind::Talk,
            Self::ParticipantList { .. } => EventKind::ParticipantList,
        }
    }

    /// Sender of the event. `None` for `PARTICIPANT_LIST`.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Enter { sender, .. } | Self::Leave { sender, .. } | Self::Talk { sender, .. } => {
                Some(sender)
            },
            Self::ParticipantList { .. } => None,
        }
    }
}
