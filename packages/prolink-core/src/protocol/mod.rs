//! The remote database wire message model.
//!
//! Players answer metadata queries over a TCP database protocol whose
//! messages are sequences of tagged fields. This module provides the frozen
//! message representation ([`Message`]), its field type ([`Field`]), the
//! protocol constants, and the client session traits the finder consumes.
//!
//! The framing contract is exact: a message round-tripped through
//! read→write produces the bytes it was read from. Metadata archives store
//! raw responses and rely on this to serve them back unchanged.

pub mod client;
pub mod constants;
mod field;
mod message;

use thiserror::Error;

pub use client::{Client, ClientError, ClientPool, ClientResult};
pub use field::Field;
pub use message::{read_items_until_footer, Message};

use crate::refs::SlotRef;

/// Errors reading or writing wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The stream ended before a complete message was read.
    #[error("stream ended inside a message")]
    Truncated,

    /// The bytes do not describe a valid message.
    #[error("corrupt message: {0}")]
    Corrupt(String),
}

/// Convenient Result alias for codec operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Encodes a slot reference as the numeric request argument the database
/// server expects: device number in the high byte, slot code in the low.
#[must_use]
pub fn slot_arg(slot: SlotRef) -> Field {
    let value = (u32::from(slot.device.number()) << 8) | u32::from(slot.slot.protocol_code());
    Field::U32(value)
}
