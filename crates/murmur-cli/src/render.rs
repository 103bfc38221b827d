//! Plain-text rendering of session changes.

use murmur_client::{ConnectionState, Message, MessageKind, SessionChange};

/// One output line for `change`.
pub fn change_line(change: &SessionChange) -> String {
    match change {
        SessionChange::Connection(state) => format!("* connection {}", state_name(*state)),
        SessionChange::Roster(members) => roster_line(members),
        SessionChange::MessageAppended(message) => message_line(message),
        SessionChange::ModerationCount(count) => format!("* flagged messages: {count}"),
    }
}

/// A logged message as a line.
pub fn message_line(message: &Message) -> String {
    match message.kind {
        MessageKind::User => {
            format!("[{}] {}: {}", message.timestamp, message.sender, message.content)
        },
        MessageKind::System => format!("[{}] -- {}", message.timestamp, message.content),
    }
}

/// The roster as a line.
pub fn roster_line(members: &[String]) -> String {
    if members.is_empty() {
        return "* nobody here".to_string();
    }
    format!("* here ({}): {}", members.len(), members.join(", "))
}

fn state_name(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Open => "open",
        ConnectionState::Closing => "closing",
        ConnectionState::Closed => "closed",
    }
}
