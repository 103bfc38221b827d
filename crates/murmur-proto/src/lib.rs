//! Protocol
//!
//! Wire format for the murmur chat room. Every frame is a UTF-8 JSON object
//! with a mandatory `type` discriminant naming one of four events:
//!
//! | type               | fields                                   |
//! |--------------------|------------------------------------------|
//! | `ENTER`            | `sender`, `time`                         |
//! | `LEAVE`            | `sender`, `time`                         |
//! | `TALK`             | `sender`, `content`, `time`, `moderationCount?` |
//! | `PARTICIPANT_LIST` | `members`                                |
//!
//! Inbound frames are decoded into the strict [`WireEvent`] type. Anything
//! that does not match one of the variants exactly is a [`DecodeError`], never
//! a partially populated event.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod errors;
mod event;

pub use codec::{decode, encode, encode_outbound};
pub use errors::{DecodeError, EncodeError};
pub use event::{EventKind, WireEvent};
