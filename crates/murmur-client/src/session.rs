//! Session controller.
//!
//! Top-level state machine for one chat session. Owns the connection, the
//! roster, the message log and the moderation gateway, and is the only thing
//! the presentation layer talks to.
//!
//! # Event Flow
//!
//! ```text
//! SessionEvent ──> SessionController::handle ──> Vec<SessionAction>
//!                     │
//!                     ├─ Connection      (lifecycle, handshake, encoding)
//!                     ├─ RosterTracker   (membership)
//!                     ├─ MessageLog      (history)
//!                     └─ ModerationGateway (counter, outgoing rewrite)
//!                     │
//!                     └──> broadcast::Sender<SessionChange>
//! ```
//!
//! Every event is applied in a single synchronous step. A failure part way
//! through (decode error, transport refusal) leaves roster, log and counter as
//! they were and surfaces as [`SessionAction::Report`].
//!
//! # Outgoing Messages
//!
//! In client-checked mode, `send_text` queues the text and asks for a verdict.
//! Frames leave in `send_text` order: a verdict for a later text waits until
//! every earlier text has its own verdict.

use std::collections::VecDeque;

use murmur_core::{Connection, ConnectionAction, ConnectionError, ConnectionState, Environment};
use murmur_proto::{WireEvent, decode};
use tokio::sync::broadcast;

use crate::{
    config::SessionConfig,
    error::SessionError,
    event::{Incident, SessionAction, SessionChange, SessionEvent},
    message_log::{Message, MessageLog},
    moderation::{ModerationError, ModerationGateway, ModerationMode, Verdict},
    roster::RosterTracker,
};

/// Identity and transport of a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Participant display name.
    pub identity: String,
    /// Chat endpoint.
    pub room_endpoint: String,
    /// Current transport state.
    pub connection_state: ConnectionState,
}

/// Outgoing text waiting for its verdict, or for earlier texts to go first.
#[derive(Debug)]
struct PendingTalk {
    request_id: u64,
    original: String,
    time: String,
    resolved: Option<String>,
}

/// Chat session state machine.
///
/// Pure: no I/O, no clock except through `E`. Feed it [`SessionEvent`]s and
/// execute the [`SessionAction`]s it returns.
pub struct SessionController<E: Environment> {
    env: E,
    endpoint: String,
    identity: Option<String>,
    connection: Connection,
    roster: RosterTracker,
    log: MessageLog,
    gateway: ModerationGateway,
    pending: VecDeque<PendingTalk>,
    next_request_id: u64,
    changes: broadcast::Sender<SessionChange>,
    torn_down: bool,
}

impl<E: Environment> SessionController<E> {
    /// Create an idle controller. Nothing happens until [`Self::start`].
    pub fn new(config: &SessionConfig, env: E) -> Self {
        let (changes, _) = broadcast::channel(config.change_capacity.max(1));
        Self {
            env,
            endpoint: config.endpoint.clone(),
            identity: None,
            connection: Connection::new(),
            roster: RosterTracker::new(),
            log: MessageLog::new(),
            gateway: ModerationGateway::new(config.moderation.mode),
            pending: VecDeque::new(),
            next_request_id: 1,
            changes,
            torn_down: false,
        }
    }

    /// Start a session as `identity`.
    ///
    /// Resets roster, log and counter, and asks for a transport. In
    /// server-authoritative mode also asks for the counter seed.
    ///
    /// # Errors
    ///
    /// - `SessionError::MissingIdentity` if `identity` is empty or whitespace
    /// - `SessionError::Transport` if a transport is already requested or open
    pub fn start(&mut self, identity: &str) -> Result<Vec<SessionAction>, SessionError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(SessionError::MissingIdentity);
        }

        let connect = self.connection.connect(&self.endpoint, identity)?;

        self.identity = Some(identity.to_string());
        self.torn_down = false;
        self.pending.clear();
        self.roster.clear();
        self.log = MessageLog::new();
        self.gateway.reset();

        let mut actions = self.translate(connect);
        if self.gateway.needs_seed() {
            actions.push(SessionAction::FetchCount);
        }
        Ok(actions)
    }

    /// Process one event.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        match event {
            SessionEvent::TransportOpened => {
                let time = self.env.display_time();
                match self.connection.handle_open(&time) {
                    Ok(actions) => self.translate(actions),
                    Err(err) => vec![SessionAction::Report(Incident::Transport(err))],
                }
            },
            SessionEvent::TransportFailed { reason } => {
                self.pending.clear();
                let mut actions = vec![SessionAction::Report(Incident::TransportFailed(reason))];
                let released = self.connection.handle_transport_error();
                actions.extend(self.translate(released));
                actions
            },
            SessionEvent::TransportClosed => {
                self.pending.clear();
                let released = self.connection.handle_remote_close();
                self.translate(released)
            },
            SessionEvent::FrameReceived(raw) => self.handle_frame(&raw),
            SessionEvent::ModerationVerdict { request_id, result } => {
                self.handle_verdict(request_id, result)
            },
            SessionEvent::CountFetched(result) => self.handle_count(result),
        }
    }

    /// Send a chat message.
    ///
    /// Blank text is ignored. In client-checked mode the text is queued for
    /// analysis and transmitted once its verdict arrives.
    ///
    /// # Errors
    ///
    /// - `SessionError::Transport` if the transport is not open. The session
    ///   keeps running.
    pub fn send_text(&mut self, content: &str) -> Result<Vec<SessionAction>, SessionError> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let state = self.connection.state();
        let identity = match (state, self.identity.as_deref()) {
            (ConnectionState::Open, Some(identity)) => identity.to_string(),
            _ => {
                return Err(ConnectionError::NotOpen { state, operation: "send_text" }.into());
            },
        };

        let time = self.env.display_time();
        if self.gateway.checks_outgoing() {
            let request_id = self.next_request_id;
            self.next_request_id += 1;
            self.pending.push_back(PendingTalk {
                request_id,
                original: content.to_string(),
                time,
                resolved: None,
            });
            return Ok(vec![SessionAction::AnalyzeText { request_id, text: content.to_string() }]);
        }

        let frame = self.connection.send(&WireEvent::talk(identity, content, time))?;
        Ok(self.translate(vec![frame]))
    }

    /// End the session.
    ///
    /// Always yields `CloseTransport`. Pending sends are dropped, and
    /// moderation results arriving afterwards are ignored.
    pub fn teardown(&mut self) -> Vec<SessionAction> {
        self.torn_down = true;
        self.pending.clear();
        let released = self.connection.close();
        self.translate(released)
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    /// Present participants in display order.
    #[must_use]
    pub fn participants(&self) -> &[String] {
        self.roster.members()
    }

    /// Logged messages in arrival order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// Current moderation counter.
    #[must_use]
    pub fn moderation_count(&self) -> u64 {
        self.gateway.current_count()
    }

    /// Moderation policy in use.
    #[must_use]
    pub fn moderation_mode(&self) -> ModerationMode {
        self.gateway.mode()
    }

    /// Current transport state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// True while a transport is requested or open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.connection.state().is_active()
    }

    /// Number of outgoing texts waiting to be transmitted.
    #[must_use]
    pub fn pending_sends(&self) -> usize {
        self.pending.len()
    }

    /// The live session, if started and not torn down.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        if self.torn_down {
            return None;
        }
        self.identity.as_ref().map(|identity| Session {
            identity: identity.clone(),
            room_endpoint: self.connection.endpoint().unwrap_or(&self.endpoint).to_owned(),
            connection_state: self.connection.state(),
        })
    }

    fn handle_frame(&mut self, raw: &str) -> Vec<SessionAction> {
        let state = self.connection.state();
        if state != ConnectionState::Open {
            let err = ConnectionError::NotOpen { state, operation: "receive" };
            return vec![SessionAction::Report(Incident::Transport(err))];
        }

        let event = match decode(raw) {
            Ok(event) => event,
            Err(err) => return vec![SessionAction::Report(Incident::Decode(err))],
        };

        let delta = self.roster.apply_event(&event);
        if delta.changed_membership() {
            self.publish(SessionChange::Roster(self.roster.members().to_vec()));
        }

        if let WireEvent::Talk { moderation_count, .. } = &event
            && self.gateway.observe_talk(*moderation_count)
        {
            self.publish(SessionChange::ModerationCount(self.gateway.current_count()));
        }

        if let Some(message) = self.log.record(&event) {
            let message = message.clone();
            self.publish(SessionChange::MessageAppended(message));
        }

        Vec::new()
    }

    fn handle_verdict(
        &mut self,
        request_id: u64,
        result: Result<Verdict, ModerationError>,
    ) -> Vec<SessionAction> {
        if self.torn_down {
            return Vec::new();
        }
        let Some(entry) = self.pending.iter_mut().find(|p| p.request_id == request_id) else {
            return Vec::new();
        };

        let before = self.gateway.current_count();
        entry.resolved = Some(self.gateway.resolve_outgoing(&entry.original, result.as_ref()));
        let after = self.gateway.current_count();

        let mut actions = Vec::new();
        if let Err(err) = result {
            actions.push(SessionAction::Report(Incident::Moderation(err)));
        }
        if after != before {
            self.publish(SessionChange::ModerationCount(after));
        }

        actions.extend(self.flush_pending());
        actions
    }

    /// Transmit every resolved text at the head of the queue.
    fn flush_pending(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        let Some(identity) = self.identity.clone() else {
            return actions;
        };

        while self.pending.front().is_some_and(|p| p.resolved.is_some()) {
            let Some(PendingTalk { time, resolved: Some(text), .. }) = self.pending.pop_front()
            else {
                break;
            };
            match self.connection.send(&WireEvent::talk(identity.as_str(), text, time)) {
                Ok(frame) => actions.extend(self.translate(vec![frame])),
                Err(err) => actions.push(SessionAction::Report(Incident::Transport(err))),
            }
        }
        actions
    }

    fn handle_count(&mut self, result: Result<u64, ModerationError>) -> Vec<SessionAction> {
        if self.torn_down {
            return Vec::new();
        }
        match result {
            Ok(count) => {
                if self.gateway.apply_seed(count) {
                    self.publish(SessionChange::ModerationCount(self.gateway.current_count()));
                }
                Vec::new()
            },
            Err(err) => vec![SessionAction::Report(Incident::Moderation(err))],
        }
    }

    /// Map connection actions to session actions, publishing state changes.
    fn translate(&mut self, actions: Vec<ConnectionAction>) -> Vec<SessionAction> {
        let mut out = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                ConnectionAction::Open { endpoint } => out.push(SessionAction::Connect { endpoint }),
                ConnectionAction::SendFrame(frame) => out.push(SessionAction::SendFrame(frame)),
                ConnectionAction::StateChanged(state) => {
                    self.publish(SessionChange::Connection(state));
                },
                ConnectionAction::Release => out.push(SessionAction::CloseTransport),
            }
        }
        out
    }

    fn publish(&self, change: SessionChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

impl<E: Environment> std::fmt::Debug for SessionController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("endpoint", &self.endpoint)
            .field("identity", &self.identity)
            .field("state", &self.connection.state())
            .field("participants", &self.roster.len())
            .field("messages", &self.log.len())
            .field("moderation_count", &self.gateway.current_count())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use murmur_core::FixedEnv;

    use super::*;
    use crate::config::ModerationConfig;

    fn controller(mode: ModerationMode) -> SessionController<FixedEnv> {
        let config = SessionConfig {
            moderation: ModerationConfig { mode, ..ModerationConfig::default() },
            ..SessionConfig::default()
        };
        SessionController::new(&config, FixedEnv::new("10:00"))
    }

    fn open(mode: ModerationMode) -> SessionController<FixedEnv> {
        let mut session = controller(mode);
        session.start("alice").unwrap();
        session.handle(SessionEvent::TransportOpened);
        session
    }

    fn frames(actions: &[SessionAction]) -> Vec<WireEvent> {
        actions
            .iter()
            .filter_map(|action| match action {
                SessionAction::SendFrame(raw) => Some(decode(raw).unwrap()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_requires_identity() {
        let mut session = controller(ModerationMode::ClientChecked);
        assert_eq!(session.start("   "), Err(SessionError::MissingIdentity));
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(session.session().is_none());
    }

    #[test]
    fn start_requests_transport() {
        let mut session = controller(ModerationMode::ClientChecked);
        let actions = session.start(" alice ").unwrap();

        assert_eq!(actions, vec![SessionAction::Connect {
            endpoint: crate::DEFAULT_ENDPOINT.to_string()
        }]);
        let current = session.session().unwrap();
        assert_eq!(current.identity, "alice");
        assert_eq!(current.room_endpoint, crate::DEFAULT_ENDPOINT);
        assert_eq!(current.connection_state, ConnectionState::Connecting);
    }

    #[test]
    fn server_mode_start_fetches_seed() {
        let mut session = controller(ModerationMode::ServerAuthoritative);
        let actions = session.start("alice").unwrap();
        assert_eq!(actions.last(), Some(&SessionAction::FetchCount));
    }

    #[test]
    fn start_twice_is_refused() {
        let mut session = open(ModerationMode::ClientChecked);
        assert!(matches!(session.start("bob"), Err(SessionError::Transport(_))));
        assert_eq!(session.session().unwrap().identity, "alice");
    }

    #[test]
    fn open_sends_handshake() {
        let mut session = controller(ModerationMode::ClientChecked);
        session.start("alice").unwrap();
        let actions = session.handle(SessionEvent::TransportOpened);

        assert_eq!(frames(&actions), vec![WireEvent::enter("alice", "10:00")]);
        assert_eq!(session.connection_state(), ConnectionState::Open);
    }

    #[test]
    fn send_before_open_is_refused() {
        let mut session = controller(ModerationMode::ServerAuthoritative);
        session.start("alice").unwrap();

        let err = session.send_text("hi").unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(session.connection_state(), ConnectionState::Connecting);
    }

    #[test]
    fn blank_send_is_noop() {
        let mut session = open(ModerationMode::ClientChecked);
        assert_eq!(session.send_text(" \t "), Ok(Vec::new()));
        assert_eq!(session.pending_sends(), 0);
    }

    #[test]
    fn server_mode_sends_directly() {
        let mut session = open(ModerationMode::ServerAuthoritative);
        let actions = session.send_text("hello").unwrap();
        assert_eq!(frames(&actions), vec![WireEvent::talk("alice", "hello", "10:00")]);
    }

    #[test]
    fn verdicts_release_in_send_order() {
        let mut session = open(ModerationMode::ClientChecked);
        session.send_text("first").unwrap();
        session.send_text("second").unwrap();

        let early = session.handle(SessionEvent::ModerationVerdict {
            request_id: 2,
            result: Ok(Verdict::clean()),
        });
        assert!(frames(&early).is_empty());

        let both = session.handle(SessionEvent::ModerationVerdict {
            request_id: 1,
            result: Ok(Verdict::clean()),
        });
        let contents: Vec<_> = frames(&both)
            .into_iter()
            .filter_map(|e| match e {
                WireEvent::Talk { content, .. } => Some(content),
                _ => None,
            })
            .collect();
        assert_eq!(contents, ["first", "second"]);
        assert_eq!(session.pending_sends(), 0);
    }

    #[test]
    fn moderation_failure_fails_open_and_reports() {
        let mut session = open(ModerationMode::ClientChecked);
        session.send_text("hello").unwrap();

        let actions = session.handle(SessionEvent::ModerationVerdict {
            request_id: 1,
            result: Err(ModerationError::Status(503)),
        });

        assert!(actions.contains(&SessionAction::Report(Incident::Moderation(
            ModerationError::Status(503)
        ))));
        assert_eq!(frames(&actions), vec![WireEvent::talk("alice", "hello", "10:00")]);
        assert_eq!(session.moderation_count(), 0);
    }

    #[test]
    fn verdict_after_teardown_is_discarded() {
        let mut session = open(ModerationMode::ClientChecked);
        session.send_text("hello").unwrap();

        let actions = session.teardown();
        assert_eq!(actions.last(), Some(&SessionAction::CloseTransport));

        let late = session.handle(SessionEvent::ModerationVerdict {
            request_id: 1,
            result: Ok(Verdict::flagged("***")),
        });
        assert!(late.is_empty());
        assert_eq!(session.moderation_count(), 0);
        assert!(session.session().is_none());
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut session = open(ModerationMode::ClientChecked);
        session.teardown();
        assert_eq!(session.teardown(), vec![SessionAction::CloseTransport]);
        assert_eq!(session.connection_state(), ConnectionState::Closed);
    }

    #[test]
    fn transport_failure_is_reported_and_closes() {
        let mut session = controller(ModerationMode::ClientChecked);
        session.start("alice").unwrap();

        let actions = session.handle(SessionEvent::TransportFailed { reason: "refused".into() });
        assert_eq!(actions, vec![
            SessionAction::Report(Incident::TransportFailed("refused".into())),
            SessionAction::CloseTransport,
        ]);
        assert_eq!(session.connection_state(), ConnectionState::Closed);
    }

    #[test]
    fn frame_while_not_open_is_dropped() {
        let mut session = controller(ModerationMode::ClientChecked);
        session.start("alice").unwrap();

        let frame = r#"{"type":"ENTER","sender":"bob","time":"10:00"}"#;
        let actions = session.handle(SessionEvent::FrameReceived(frame.into()));
        assert!(matches!(actions.as_slice(), [SessionAction::Report(Incident::Transport(_))]));
        assert!(session.participants().is_empty());
    }

    #[test]
    fn restart_after_close_resets_state() {
        let mut session = open(ModerationMode::ServerAuthoritative);
        session.handle(SessionEvent::FrameReceived(
            r#"{"type":"TALK","sender":"bob","content":"hi","time":"10:01","moderationCount":4}"#
                .into(),
        ));
        session.handle(SessionEvent::TransportClosed);
        assert_eq!(session.connection_state(), ConnectionState::Closed);

        session.start("alice").unwrap();
        assert!(session.participants().is_empty());
        assert!(session.messages().is_empty());
        assert_eq!(session.moderation_count(), 0);
    }

    #[test]
    fn changes_are_published() {
        let mut session = controller(ModerationMode::ClientChecked);
        let mut changes = session.subscribe();

        session.start("alice").unwrap();
        session.handle(SessionEvent::TransportOpened);
        session.handle(SessionEvent::FrameReceived(
            r#"{"type":"ENTER","sender":"bob","time":"10:00"}"#.into(),
        ));

        assert_eq!(
            changes.try_recv().unwrap(),
            SessionChange::Connection(ConnectionState::Connecting)
        );
        assert_eq!(changes.try_recv().unwrap(), SessionChange::Connection(ConnectionState::Open));
        assert_eq!(changes.try_recv().unwrap(), SessionChange::Roster(vec!["bob".into()]));
        assert!(matches!(changes.try_recv().unwrap(), SessionChange::MessageAppended(_)));
    }
}
