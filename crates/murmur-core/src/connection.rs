//! Transport lifecycle state machine.
//!
//! Owns the connection state for one session and decides what the driver must
//! do with the underlying transport. Uses the action pattern: methods take
//! their inputs as parameters and return actions for the driver to execute.
//! The transport handle itself lives in the driver; this type only decides
//! when it is opened, written to and released.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ connect ┌────────────┐ opened ┌──────┐
//! │ Disconnected │────────>│ Connecting │───────>│ Open │
//! └──────────────┘         └────────────┘        └──────┘
//!                            │       │               │
//!                  transport │       │ close         │ close / remote close
//!                      error │       ↓               ↓
//!                            │    ┌─────────┐<───────┘
//!                            │    │ Closing │
//!                            │    └─────────┘
//!                            ↓         │
//!                       ┌────────┐     │
//!                       │ Closed │<────┘
//!                       └────────┘
//! ```
//!
//! Closing is transient: `close()` and a remote close pass through it and
//! reach Closed within the same call, reporting both transitions. There is no
//! automatic reconnection; leaving Closed requires an explicit `connect`.

use murmur_proto::{WireEvent, encode_outbound};

use crate::error::ConnectionError;

/// Actions returned by the connection state machine.
///
/// The driver executes these actions:
/// - `Open`: Dial the endpoint and report success or failure back
/// - `SendFrame`: Write the text frame to the transport
/// - `StateChanged`: Notify observers of the new state
/// - `Release`: Tear down the transport handle (must be idempotent)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a transport to this endpoint
    Open {
        /// Address of the chat endpoint
        endpoint: String,
    },

    /// Send this text frame to the peer
    SendFrame(String),

    /// The connection moved to this state
    StateChanged(ConnectionState),

    /// Release the underlying transport
    Release,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport requested yet
    #[default]
    Disconnected,
    /// Transport requested, waiting for the open signal
    Connecting,
    /// Transport open, handshake sent
    Open,
    /// Release in progress
    Closing,
    /// Transport released (graceful or error)
    Closed,
}

impl ConnectionState {
    /// True while a transport is requested or held.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Connection state machine
///
/// Manages the lifecycle of the single transport owned by a session.
///
/// This is a pure state machine - no I/O, no clock. The display time for the
/// handshake is passed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    /// Current state
    state: ConnectionState,
    /// Endpoint of the current (or last) transport
    endpoint: Option<String>,
    /// Identity announced in the handshake
    identity: Option<String>,
}

impl Connection {
    /// Create a new connection in [`ConnectionState::Disconnected`] state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Endpoint of the current transport. `None` before the first connect.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Identity announced on open. `None` before the first connect.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Request a transport to `endpoint` on behalf of `identity`.
    ///
    /// Transitions to Connecting and returns `Open`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` unless Disconnected or Closed
    pub fn connect(
        &mut self,
        endpoint: &str,
        identity: &str,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if !matches!(self.state, ConnectionState::Disconnected | ConnectionState::Closed) {
            return Err(ConnectionError::InvalidState { state: self.state, operation: "connect" });
        }

        self.endpoint = Some(endpoint.to_string());
        self.identity = Some(identity.to_string());

        let mut actions = Vec::with_capacity(2);
        self.transition(ConnectionState::Connecting, &mut actions);
        actions.push(ConnectionAction::Open { endpoint: endpoint.to_string() });
        Ok(actions)
    }

    /// Process the transport-open signal.
    ///
    /// Transitions to Open and returns the `ENTER` handshake announcing the
    /// identity. The server is expected to register the sender and reply with
    /// roster state.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if not Connecting
    /// - `ConnectionError::Encode` if the handshake cannot be encoded
    pub fn handle_open(&mut self, time: &str) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let (ConnectionState::Connecting, Some(identity)) = (self.state, self.identity.as_deref())
        else {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "handle_open",
            });
        };

        let hello = encode_outbound(&WireEvent::enter(identity, time))?;

        let mut actions = Vec::with_capacity(2);
        self.transition(ConnectionState::Open, &mut actions);
        actions.push(ConnectionAction::SendFrame(hello));
        Ok(actions)
    }

    /// Encode `event` for transmission.
    ///
    /// Any `moderationCount` on the event is stripped.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotOpen` if not Open
    /// - `ConnectionError::Encode` if the event cannot be encoded
    pub fn send(&self, event: &WireEvent) -> Result<ConnectionAction, ConnectionError> {
        if self.state != ConnectionState::Open {
            return Err(ConnectionError::NotOpen { state: self.state, operation: "send" });
        }

        Ok(ConnectionAction::SendFrame(encode_outbound(event)?))
    }

    /// Close the connection.
    ///
    /// From Connecting or Open, passes through Closing to Closed. Always
    /// returns `Release`, so calling it again is harmless.
    pub fn close(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::with_capacity(3);
        if self.state.is_active() {
            self.transition(ConnectionState::Closing, &mut actions);
            self.transition(ConnectionState::Closed, &mut actions);
        }
        actions.push(ConnectionAction::Release);
        actions
    }

    /// Process a remote close signal.
    ///
    /// Same path as [`Self::close`], but a no-op once nothing is held.
    pub fn handle_remote_close(&mut self) -> Vec<ConnectionAction> {
        if !self.state.is_active() {
            return Vec::new();
        }
        self.close()
    }

    /// Process a transport failure (open refused, I/O error).
    ///
    /// Moves straight to Closed. A no-op once nothing is held.
    pub fn handle_transport_error(&mut self) -> Vec<ConnectionAction> {
        if !self.state.is_active() {
            return Vec::new();
        }

        let mut actions = Vec::with_capacity(2);
        self.transition(ConnectionState::Closed, &mut actions);
        actions.push(ConnectionAction::Release);
        actions
    }

    fn transition(&mut self, next: ConnectionState, actions: &mut Vec<ConnectionAction>) {
        self.state = next;
        actions.push(ConnectionAction::StateChanged(next));
    }
}

#[cfg(test)]
mod tests {
    use murmur_proto::decode;

    use super::*;

    fn open_connection() -> Connection {
        let mut conn = Connection::new();
        conn.connect("ws://localhost:8080/ws/chat", "alice").unwrap();
        conn.handle_open("10:00").unwrap();
        conn
    }

    #[test]
    fn connection_lifecycle() {
        let mut conn = Connection::new();
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let actions = conn.connect("ws://localhost:8080/ws/chat", "alice").unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(actions, vec![
            ConnectionAction::StateChanged(ConnectionState::Connecting),
            ConnectionAction::Open { endpoint: "ws://localhost:8080/ws/chat".to_string() },
        ]);

        let actions = conn.handle_open("10:00").unwrap();
        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], ConnectionAction::StateChanged(ConnectionState::Open));

        let actions = conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(actions, vec![
            ConnectionAction::StateChanged(ConnectionState::Closing),
            ConnectionAction::StateChanged(ConnectionState::Closed),
            ConnectionAction::Release,
        ]);
    }

    #[test]
    fn open_sends_enter_handshake() {
        let mut conn = Connection::new();
        conn.connect("ws://chat", "alice").unwrap();

        let actions = conn.handle_open("10:00").unwrap();
        let ConnectionAction::SendFrame(frame) = &actions[1] else {
            panic!("Expected SendFrame action with ENTER");
        };
        assert_eq!(decode(frame).unwrap(), WireEvent::enter("alice", "10:00"));
    }

    #[test]
    fn send_requires_open() {
        let mut conn = Connection::new();
        let event = WireEvent::talk("alice", "hello", "10:01");

        let result = conn.send(&event);
        assert!(matches!(
            result,
            Err(ConnectionError::NotOpen { state: ConnectionState::Disconnected, .. })
        ));

        conn.connect("ws://chat", "alice").unwrap();
        assert!(matches!(
            conn.send(&event),
            Err(ConnectionError::NotOpen { state: ConnectionState::Connecting, .. })
        ));

        conn.handle_open("10:00").unwrap();
        assert!(matches!(conn.send(&event), Ok(ConnectionAction::SendFrame(_))));

        conn.close();
        assert!(matches!(
            conn.send(&event),
            Err(ConnectionError::NotOpen { state: ConnectionState::Closed, .. })
        ));
    }

    #[test]
    fn send_strips_moderation_count() {
        let conn = open_connection();
        let event = WireEvent::Talk {
            sender: "alice".into(),
            content: "hi".into(),
            time: "10:01".into(),
            moderation_count: Some(3),
        };

        let ConnectionAction::SendFrame(frame) = conn.send(&event).unwrap() else {
            panic!("Expected SendFrame action");
        };
        assert_eq!(decode(&frame).unwrap(), WireEvent::talk("alice", "hi", "10:01"));
    }

    #[test]
    fn close_is_idempotent() {
        let mut conn = open_connection();
        conn.close();

        let actions = conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(actions, vec![ConnectionAction::Release]);
    }

    #[test]
    fn close_while_connecting() {
        let mut conn = Connection::new();
        conn.connect("ws://chat", "alice").unwrap();

        let actions = conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(actions.last(), Some(&ConnectionAction::Release));
    }

    #[test]
    fn close_before_connect_still_releases() {
        let mut conn = Connection::new();
        assert_eq!(conn.close(), vec![ConnectionAction::Release]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn remote_close_passes_through_closing() {
        let mut conn = open_connection();

        let actions = conn.handle_remote_close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(actions, vec![
            ConnectionAction::StateChanged(ConnectionState::Closing),
            ConnectionAction::StateChanged(ConnectionState::Closed),
            ConnectionAction::Release,
        ]);

        assert!(conn.handle_remote_close().is_empty());
    }

    #[test]
    fn transport_error_closes_immediately() {
        let mut conn = Connection::new();
        conn.connect("ws://chat", "alice").unwrap();

        let actions = conn.handle_transport_error();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(actions, vec![
            ConnectionAction::StateChanged(ConnectionState::Closed),
            ConnectionAction::Release,
        ]);

        assert!(conn.handle_transport_error().is_empty());
    }

    #[test]
    fn open_signal_after_close_is_rejected() {
        let mut conn = Connection::new();
        conn.connect("ws://chat", "alice").unwrap();
        conn.close();

        let result = conn.handle_open("10:00");
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidState { state: ConnectionState::Closed, .. })
        ));
    }

    #[test]
    fn connect_rejected_while_active() {
        let mut conn = open_connection();
        let result = conn.connect("ws://chat", "bob");
        assert!(matches!(
            result,
            Err(ConnectionError::InvalidState { state: ConnectionState::Open, .. })
        ));
        assert_eq!(conn.identity(), Some("alice"));
    }

    #[test]
    fn reconnect_requires_explicit_connect() {
        let mut conn = open_connection();
        conn.handle_remote_close();
        assert_eq!(conn.state(), ConnectionState::Closed);

        conn.connect("ws://chat", "alice").unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }
}
