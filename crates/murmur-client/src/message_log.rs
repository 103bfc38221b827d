//! Append-only message history.
//!
//! Every `ENTER`, `LEAVE` and `TALK` event produces exactly one message, in
//! arrival order. Membership snapshots produce none. Messages are never edited,
//! reordered or removed once logged; moderation only ever affects outgoing
//! text and the counter.

use murmur_proto::WireEvent;

/// Origin of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Chat message written by a participant.
    User,
    /// Notice synthesized by the client (join, leave).
    System,
}

/// A logged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Local sequence number, assigned on append. Never transmitted.
    pub id: u64,
    /// User message or system notice.
    pub kind: MessageKind,
    /// Participant the message is about or from.
    pub sender: String,
    /// Text to display.
    pub content: String,
    /// Display-formatted time from the event.
    pub timestamp: String,
    /// Moderation count carried by the event, if any.
    pub moderation_count: Option<u64>,
}

impl Message {
    /// Unlogged user message.
    pub fn user(
        sender: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
        moderation_count: Option<u64>,
    ) -> Self {
        Self {
            id: 0,
            kind: MessageKind::User,
            sender: sender.into(),
            content: content.into(),
            timestamp: timestamp.into(),
            moderation_count,
        }
    }

    /// Unlogged system notice.
    pub fn system(
        sender: impl Into<String>,
        content: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            kind: MessageKind::System,
            sender: sender.into(),
            content: content.into(),
            timestamp: timestamp.into(),
            moderation_count: None,
        }
    }
}

/// Join notice for `sender`.
pub fn join_notice(sender: &str) -> String {
    format!("{sender}님이 입장하셨습니다.")
}

/// Leave notice for `sender`.
pub fn leave_notice(sender: &str) -> String {
    format!("{sender}님이 퇴장하셨습니다.")
}

/// Ordered, append-only message history.
#[derive(Debug, Clone)]
pub struct MessageLog {
    messages: Vec<Message>,
    next_id: u64,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    /// Create an empty log. The first message gets id 1.
    #[must_use]
    pub fn new() -> Self {
        Self { messages: Vec::new(), next_id: 1 }
    }

    /// Append `message`, stamping it with the next sequence number.
    pub fn append(&mut self, mut message: Message) -> &Message {
        message.id = self.next_id;
        self.next_id += 1;
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Log the message an event calls for. `None` for membership snapshots.
    pub fn record(&mut self, event: &WireEvent) -> Option<&Message> {

        let message = match event {
            WireEvent::Enter { sender, time } => Message::system(sender, join_notice(sender), time),
            WireEvent::Leave { sender, time } => {
                Message::system(sender, leave_notice(sender), time)
            },
            WireEvent::Talk { sender, content, time, moderation_count } => {
                Message::user(sender, content, time, *moderation_count)
            },
            WireEvent::ParticipantList { .. } => return None,
        };
        Some(self.append(message))
    }

    /// Logged messages in arrival order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy of the log for the presentation layer.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Number of logged messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut log = MessageLog::new();
        let first = log.append(Message::user("alice", "a", "10:00", None)).id;
        let second = log.append(Message::user("alice", "b", "10:00", None)).id;

        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn enter_and_leave_become_notices() {
        let mut log = MessageLog::new();
        log.record(&WireEvent::enter("alice", "10:00"));
        log.record(&WireEvent::leave("alice", "10:02"));

        let messages = log.messages();
        assert_eq!(messages[0].kind, MessageKind::System);
        assert_eq!(messages[0].content, "alice님이 입장하셨습니다.");
        assert_eq!(messages[1].content, "alice님이 퇴장하셨습니다.");
        assert_eq!(messages[1].timestamp, "10:02");
    }

    #[test]
    fn talk_keeps_moderation_count() {
        let mut log = MessageLog::new();
        let event = WireEvent::Talk {
            sender: "bob".into(),
            content: "hi".into(),
            time: "10:01".into(),
            moderation_count: Some(4),
        };

        let message = log.record(&event).cloned().unwrap();
        assert_eq!(message.kind, MessageKind::User);
        assert_eq!(message.moderation_count, Some(4));
    }

    #[test]
    fn participant_list_is_not_logged() {
        let mut log = MessageLog::new();
        assert!(log.record(&WireEvent::participant_list(["alice"])).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn snapshot_is_detached() {
        let mut log = MessageLog::new();
        log.record(&WireEvent::enter("alice", "10:00"));
        let snapshot = log.snapshot();

        log.record(&WireEvent::enter("bob", "10:01"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }
}
