//! JSON frame codec.
//!
//! Decoding is done in two passes: the frame is first parsed as a generic
//! JSON value so the `type` discriminant can be validated on its own, then the
//! value is deserialized into the matching [`WireEvent`] variant. This keeps
//! "unknown event" distinct from "known event with bad fields", which the
//! session reports differently.

use serde_json::Value;

use crate::{DecodeError, EncodeError, EventKind, WireEvent};

/// Decode a raw text frame.
///
/// # Errors
///
/// - `DecodeError::Malformed` if the frame is not JSON
/// - `DecodeError::NotAnObject` if the top-level value is not an object
/// - `DecodeError::MissingType` if there is no string `type` field
/// - `DecodeError::UnknownType` if `type` is not a known event
/// - `DecodeError::InvalidFields` if the fields do not match the event shape
pub fn decode(raw: &str) -> Result<WireEvent, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(DecodeError::NotAnObject);
    };

    let Some(name) = object.get("type").and_then(Value::as_str) else {
        return Err(DecodeError::MissingType);
    };

    let Some(kind) = EventKind::from_wire(name) else {
        return Err(DecodeError::UnknownType(name.to_string()));
    };

    serde_json::from_value(value)
        .map_err(|e| DecodeError::InvalidFields { kind, reason: e.to_string() })
}

/// Encode an event exactly as given.
///
/// Used for round-trip checks and by anything that relays server events. The
/// client's own outbound path goes through [`encode_outbound`].
pub fn encode(event: &WireEvent) -> Result<String, EncodeError> {
    serde_json::to_string(event)
        .map_err(|e| EncodeError { kind: event.kind(), reason: e.to_string() })
}

/// Encode an event for transmission by the client.
///
/// Clears any `moderationCount` before encoding: only the server or the
/// moderation gateway may assign it.
pub fn encode_outbound(event: &WireEvent) -> Result<String, EncodeError> {
    match event {
        WireEvent::Talk { sender, content, time, moderation_count: Some(_) } => {
            encode(&WireEvent::talk(sender.as_str(), content.as_str(), time.as_str()))
        },
        _ => encode(event),
    }
}
