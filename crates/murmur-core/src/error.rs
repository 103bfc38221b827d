//! Error types for the connection state machine.

use murmur_proto::EncodeError;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
///
/// These are the transport errors of the session: fatal to the operation that
/// raised them, never to the session itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Frame send attempted while the transport is not open.
    #[error("transport not open: cannot {operation} while {state:?}")]
    NotOpen {
        /// Current state when the send was attempted
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Outbound event could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ConnectionError {
    /// Returns true if the error only means "not now".
    ///
    /// A send refused because the transport is not open leaves the session
    /// usable; an encoding failure or an illegal transition does not resolve
    /// by waiting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotOpen { .. })
    }
}
