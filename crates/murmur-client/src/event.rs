//! Inputs, outputs and notifications of the session engine.

use murmur_core::{ConnectionError, ConnectionState};
use murmur_proto::DecodeError;
use thiserror::Error;

use crate::{
    message_log::Message,
    moderation::{ModerationError, Verdict},
};

/// Events fed into [`SessionController::handle`](crate::SessionController::handle).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The transport requested by `Connect` is open.
    TransportOpened,

    /// The transport failed to open or broke.
    TransportFailed {
        /// Human-readable cause.
        reason: String,
    },

    /// The peer closed the transport.
    TransportClosed,

    /// A text frame arrived.
    FrameReceived(String),

    /// Outcome of an `AnalyzeText` action.
    ModerationVerdict {
        /// Id from the `AnalyzeText` action.
        request_id: u64,
        /// Verdict, or why there is none.
        result: Result<Verdict, ModerationError>,
    },

    /// Outcome of a `FetchCount` action.
    CountFetched(Result<u64, ModerationError>),
}

/// Actions returned by the session engine for the runtime to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Open a transport to this endpoint, then report `TransportOpened` or
    /// `TransportFailed`.
    Connect {
        /// Chat endpoint.
        endpoint: String,
    },

    /// Write this frame to the transport.
    SendFrame(String),

    /// Release the transport. Idempotent.
    CloseTransport,

    /// Ask the moderation service about `text`, then report
    /// `ModerationVerdict` with the same id.
    AnalyzeText {
        /// Correlates the verdict with the pending send.
        request_id: u64,
        /// Text to analyze.
        text: String,
    },

    /// Read the room's moderation count, then report `CountFetched`.
    FetchCount,

    /// Something went wrong but the session continues. Log it.
    Report(Incident),
}

/// A contained failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Incident {
    /// Inbound frame dropped.
    #[error("dropped inbound frame: {0}")]
    Decode(DecodeError),

    /// Transport refused an operation.
    #[error("transport: {0}")]
    Transport(ConnectionError),

    /// Transport failed to open or broke.
    #[error("transport failed: {0}")]
    TransportFailed(String),

    /// Moderation service unreachable or unusable. The session failed open.
    #[error("moderation unavailable: {0}")]
    Moderation(ModerationError),
}

/// Change notification published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// Connection moved to this state.
    Connection(ConnectionState),
    /// Roster membership changed. Carries the full ordered roster.
    Roster(Vec<String>),
    /// A message was logged.
    MessageAppended(Message),
    /// The moderation counter changed.
    ModerationCount(u64),
}
