//! Errors surfaced to the caller of the session engine.

use murmur_core::ConnectionError;
use thiserror::Error;

/// Errors returned by [`SessionController`](crate::SessionController).
///
/// Decode and moderation failures never appear here; they are contained and
/// reported as [`Incident`](crate::Incident)s.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `start` called without a usable identity.
    #[error("missing identity: a session needs a non-empty participant name")]
    MissingIdentity,

    /// Transport refused the operation.
    #[error(transparent)]
    Transport(#[from] ConnectionError),
}

impl SessionError {
    /// True if the session is still usable after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::MissingIdentity => false,
            Self::Transport(err) => err.is_transient(),
        }
    }
}
