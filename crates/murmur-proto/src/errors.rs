//! Codec errors.

use thiserror::Error;

use crate::EventKind;

/// Inbound frame could not be turned into a [`crate::WireEvent`].
///
/// Decode errors are contained by the session: the frame is dropped and the
/// error is reported, the session keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Frame is JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// Object has no string `type` field.
    #[error("frame has no `type` discriminant")]
    MissingType,

    /// `type` names an event this client does not know.
    #[error("unknown event type: {0:?}")]
    UnknownType(String),

    /// `type` is known but the remaining fields do not match its shape.
    #[error("invalid {kind} frame: {reason}")]
    InvalidFields {
        /// Kind named by the `type` field.
        kind: EventKind,
        /// What serde rejected.
        reason: String,
    },
}

/// Outbound event could not be serialized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to encode {kind} frame: {reason}")]
pub struct EncodeError {
    /// Kind of the event being encoded.
    pub kind: EventKind,
    /// What serde rejected.
    pub reason: String,
}
