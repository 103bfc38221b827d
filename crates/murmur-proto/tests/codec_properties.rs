//! Property-based tests for the frame codec.
//!
//! Verifies that encoding is lossless for every event variant and that the
//! decoder never panics, whatever the peer sends.

use murmur_proto::{DecodeError, WireEvent, decode, encode, encode_outbound};
use proptest::prelude::*;

/// Display names, including non-ASCII ones.
fn arbitrary_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,12}",
        Just("앨리스".to_string()),
        Just("bob \"the\" builder".to_string()),
    ]
}

/// Strategy for generating arbitrary wire events
fn arbitrary_event() -> impl Strategy<Value = WireEvent> {
    prop_oneof![
        (arbitrary_name(), "[0-9]{2}:[0-9]{2}").prop_map(|(s, t)| WireEvent::enter(s, t)),
        (arbitrary_name(), "[0-9]{2}:[0-9]{2}").prop_map(|(s, t)| WireEvent::leave(s, t)),
        (arbitrary_name(), any::<String>(), "[0-9]{2}:[0-9]{2}", any::<Option<u64>>()).prop_map(
            |(sender, content, time, moderation_count)| WireEvent::Talk {
                sender,
                content,
                time,
                moderation_count,
            }
        ),
        prop::collection::vec(arbitrary_name(), 0..8).prop_map(WireEvent::participant_list),
    ]
}

proptest! {
    #[test]
    fn prop_decode_inverts_encode(event in arbitrary_event()) {
        let raw = encode(&event).unwrap();
        prop_assert_eq!(decode(&raw).unwrap(), event);
    }

    #[test]
    fn prop_outbound_never_carries_moderation_count(event in arbitrary_event()) {
        let raw = encode_outbound(&event).unwrap();
        let decoded = decode(&raw).unwrap();
        let carries_count = matches!(decoded, WireEvent::Talk { moderation_count: Some(_), .. });
        prop_assert!(!carries_count);
        prop_assert_eq!(decoded.kind(), event.kind());
    }

    #[test]
    fn prop_decode_never_panics(raw in any::<String>()) {
        let _ = decode(&raw);
    }

    #[test]
    fn prop_objects_without_type_are_rejected(sender in arbitrary_name(), time in "[0-9:]{0,5}") {
        let raw = serde_json::json!({ "sender": sender, "time": time }).to_string();
        prop_assert_eq!(decode(&raw), Err(DecodeError::MissingType));
    }
}
