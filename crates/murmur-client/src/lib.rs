//! Client
//!
//! Action-based chat session engine. Tracks who is in the room, keeps the
//! ordered message log and folds the moderation signal into the session.
//!
//! # Architecture
//!
//! The engine follows the same Sans-IO and Action-Based patterns as
//! [`murmur_core`]. It receives events ([`SessionEvent`]), processes them
//! through pure state machine logic, and returns actions ([`SessionAction`])
//! for the caller to execute. [`Runtime`] is the generic async shell that
//! executes those actions against a [`Driver`] and a [`ModerationService`].
//!
//! # Components
//!
//! - [`SessionController`]: Top-level state machine for one chat session
//! - [`RosterTracker`]: Participants currently present
//! - [`MessageLog`]: Append-only ordered history
//! - [`ModerationGateway`]: Configuration-selected moderation policy
//! - [`Runtime`]: Event loop over transport, commands and moderation calls
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::WebSocketDriver`]: [`Driver`] over a WebSocket
//! - [`http::HttpModeration`]: [`ModerationService`] over HTTP

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod event;
mod message_log;
mod moderation;
mod roster;
mod runtime;
mod session;

#[cfg(feature = "transport")]
pub mod http;
#[cfg(feature = "transport")]
pub mod transport;

pub use config::{
    ConfigError, DEFAULT_CHANGE_CAPACITY, DEFAULT_ENDPOINT, DEFAULT_MODERATION_URL,
    DEFAULT_REQUEST_TIMEOUT, ModerationConfig, SessionConfig,
};
pub use error::SessionError;
pub use event::{Incident, SessionAction, SessionChange, SessionEvent};
pub use message_log::{Message, MessageKind, MessageLog, join_notice, leave_notice};
pub use moderation::{
    AnalysisResponse, ClassifierSection, ClientChecked, DictionarySection, ModerationCounter,
    ModerationError, ModerationGateway, ModerationMode, ModerationPolicy, RewriteSection,
    ServerAuthoritative, Verdict,
};
pub use murmur_core::{ConnectionError, ConnectionState, Environment, FixedEnv, SystemEnv};
pub use murmur_proto::{DecodeError, WireEvent};
pub use roster::{RosterDelta, RosterTracker};
pub use runtime::{Driver, ModerationService, Runtime, RuntimeError, SessionCommand};
pub use session::{Session, SessionController};
