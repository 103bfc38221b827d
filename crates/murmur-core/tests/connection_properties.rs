//! Property-based tests for the connection state machine.
//!
//! Drives the machine with arbitrary sequences of calls and signals and checks
//! that the lifecycle invariants hold after every step.

use murmur_core::{Connection, ConnectionAction, ConnectionError, ConnectionState};
use murmur_proto::WireEvent;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Opened,
    Send,
    Close,
    RemoteClose,
    TransportError,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Connect),
        2 => Just(Op::Opened),
        3 => Just(Op::Send),
        1 => Just(Op::Close),
        1 => Just(Op::RemoteClose),
        1 => Just(Op::TransportError),
    ]
}

/// Apply one op, returning the emitted actions (errors map to no actions).
fn apply(conn: &mut Connection, op: &Op) -> Vec<ConnectionAction> {
    match op {
        Op::Connect => conn.connect("ws://chat", "alice").unwrap_or_default(),
        Op::Opened => conn.handle_open("10:00").unwrap_or_default(),
        Op::Send => conn.send(&WireEvent::talk("alice", "hi", "10:01")).into_iter().collect(),
        Op::Close => conn.close(),
        Op::RemoteClose => conn.handle_remote_close(),
        Op::TransportError => conn.handle_transport_error(),
    }
}

proptest! {
    #[test]
    fn prop_closing_is_never_observed_at_rest(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut conn = Connection::new();
        for op in &ops {
            apply(&mut conn, op);
            prop_assert_ne!(conn.state(), ConnectionState::Closing);
        }
    }

    #[test]
    fn prop_send_succeeds_iff_open(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut conn = Connection::new();
        for op in &ops {
            apply(&mut conn, op);
            let result = conn.send(&WireEvent::talk("alice", "hi", "10:01"));
            if conn.state() == ConnectionState::Open {
                prop_assert!(result.is_ok());
            } else {
                let refused = matches!(result, Err(ConnectionError::NotOpen { .. }));
                prop_assert!(refused);
            }
        }
    }

    #[test]
    fn prop_state_changes_track_state(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut conn = Connection::new();
        for op in &ops {
            let actions = apply(&mut conn, op);
            let last_reported = actions.iter().rev().find_map(|action| match action {
                ConnectionAction::StateChanged(state) => Some(*state),
                _ => None,
            });
            if let Some(state) = last_reported {
                prop_assert_eq!(state, conn.state());
            }
        }
    }

    #[test]
    fn prop_close_always_releases(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut conn = Connection::new();
        for op in &ops {
            apply(&mut conn, op);
        }

        let actions = conn.close();
        prop_assert_eq!(actions.last(), Some(&ConnectionAction::Release));
        prop_assert!(matches!(
            conn.state(),
            ConnectionState::Disconnected | ConnectionState::Closed
        ));
    }
}
