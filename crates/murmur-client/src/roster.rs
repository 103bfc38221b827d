//! Participant roster.
//!
//! Reconciles the set of present participants from the stream of membership
//! events. Incremental events (`ENTER`, `LEAVE`, `TALK`) are applied
//! idempotently; a `PARTICIPANT_LIST` snapshot replaces everything.
//!
//! # Invariants
//!
//! - No duplicate identities.
//! - After a `PARTICIPANT_LIST`, the roster equals the transmitted list (first
//!   occurrence wins if the server repeats a name), whatever was tracked
//!   before.
//! - Every member was named by an `ENTER`, a `TALK` or the last snapshot.

use murmur_proto::WireEvent;

/// Effect of one event on the roster.
///
/// Returned for every event, including those that leave membership unchanged,
/// so the caller can still render a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterDelta {
    /// `ENTER` observed.
    Entered {
        /// Participant named by the event.
        sender: String,
        /// False if the participant was already present.
        newly_present: bool,
    },

    /// `LEAVE` observed.
    Left {
        /// Participant named by the event.
        sender: String,
        /// False if the participant was not present.
        was_present: bool,
    },

    /// `TALK` observed. A message implies presence.
    Talked {
        /// Author of the message.
        sender: String,
        /// True if the message revealed a participant whose `ENTER` was missed.
        newly_present: bool,
    },

    /// `PARTICIPANT_LIST` replaced the roster.
    Replaced {
        /// Members present now but not before.
        added: Vec<String>,
        /// Members present before but not now.
        removed: Vec<String>,
    },
}

impl RosterDelta {
    /// True if membership actually changed.
    #[must_use]
    pub fn changed_membership(&self) -> bool {
        match self {
            Self::Entered { newly_present, .. } | Self::Talked { newly_present, .. } => {
                *newly_present
            },
            Self::Left { was_present, .. } => *was_present,
            Self::Replaced { added, removed } => !added.is_empty() || !removed.is_empty(),
        }
    }
}

/// Participants currently considered present.
///
/// Membership is what matters; the order is kept only for display. New
/// members are appended, and a snapshot imposes the server's order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterTracker {
    members: Vec<String>,
}

impl RosterTracker {
    /// Create an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event and describe what it did.
    pub fn apply_event(&mut self, event: &WireEvent) -> RosterDelta {
        match event {
            WireEvent::Enter { sender, .. } => {
                RosterDelta::Entered { sender: sender.clone(), newly_present: self.insert(sender) }
            },
            WireEvent::Leave { sender, .. } => {
                RosterDelta::Left { sender: sender.clone(), was_present: self.remove(sender) }
            },
            WireEvent::Talk { sender, .. } => {
                RosterDelta::Talked { sender: sender.clone(), newly_present: self.insert(sender) }
            },
            WireEvent::ParticipantList { members } => self.replace(members),
        }
    }

    /// True if `identity` is present.
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.members.iter().any(|m| m == identity)
    }

    /// Present members in display order.
    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Number of present members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if nobody is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Forget everyone. Used when a fresh session starts.
    pub fn clear(&mut self) {
        self.members.clear();
    }

    fn insert(&mut self, identity: &str) -> bool {
        if self.contains(identity) {
            return false;
        }
        self.members.push(identity.to_string());
        true
    }

    fn remove(&mut self, identity: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != identity);
        self.members.len() != before
    }

    fn replace(&mut self, members: &[String]) -> RosterDelta {
        let mut next: Vec<String> = Vec::with_capacity(members.len());
        for member in members {
            if !next.contains(member) {
                next.push(member.clone());
            }
        }

        let added = next.iter().filter(|m| !self.contains(m)).cloned().collect();
        let removed = self.members.iter().filter(|m| !next.contains(m)).cloned().collect();

        self.members = next;
        RosterDelta::Replaced { added, removed }
    }
}
