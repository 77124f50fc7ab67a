//! The frozen representation of one protocol message.
//!
//! A message is a fixed preamble (magic, transaction, kind, argument count,
//! argument type tags) followed by its arguments, all encoded as tagged
//! fields. Messages read from a stream re-serialize byte-identically, which
//! is what lets archives store wire-level responses verbatim.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::{kind, ARG_TYPE_TAGS_LEN, MESSAGE_MAGIC};
use super::field::Field;
use super::{ProtocolError, ProtocolResult};

/// One request or response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Transaction number tying a response to its request. Requests are
    /// built with 0; the connection assigns the real sequence number when
    /// sending.
    pub transaction: u32,
    /// The message kind (see [`kind`]).
    pub kind: u16,
    /// The raw argument-type tag blob, preserved for re-serialization.
    arg_tags: Bytes,
    /// The arguments.
    pub args: Vec<Field>,
}

impl Message {
    /// Builds a request message, deriving the argument-type tags.
    #[must_use]
    pub fn request(kind: u16, args: Vec<Field>) -> Self {
        let arg_tags = derive_arg_tags(&args);
        Self {
            transaction: 0,
            kind,
            arg_tags,
            args,
        }
    }

    /// Builds a response message (used by tests and simulated devices).
    #[must_use]
    pub fn response(transaction: u32, kind: u16, args: Vec<Field>) -> Self {
        let arg_tags = derive_arg_tags(&args);
        Self {
            transaction,
            kind,
            arg_tags,
            args,
        }
    }

    /// The zero-argument footer that terminates menus and archive item
    /// streams.
    #[must_use]
    pub fn footer() -> Self {
        Self::response(0, kind::MENU_FOOTER, Vec::new())
    }

    /// Reads one complete message from the buffer.
    ///
    /// The preamble fields must carry their canonical widths; anything else
    /// could not have been produced by [`write_to`](Self::write_to) and
    /// would break the round-trip contract.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] if the buffer ends before the message
    /// does, [`ProtocolError::Corrupt`] if the preamble does not have the
    /// expected shape.
    pub fn read_from(buf: &mut impl Buf) -> ProtocolResult<Self> {
        let magic = match Field::read_from(buf)? {
            Field::U32(value) => value,
            other => {
                return Err(ProtocolError::Corrupt(format!(
                    "expected magic field, found {other}"
                )))
            }
        };
        if magic != MESSAGE_MAGIC {
            return Err(ProtocolError::Corrupt(format!(
                "bad message magic {magic:#010x}"
            )));
        }
        let transaction = match Field::read_from(buf)? {
            Field::U32(value) => value,
            other => {
                return Err(ProtocolError::Corrupt(format!(
                    "expected transaction field, found {other}"
                )))
            }
        };
        let kind = match Field::read_from(buf)? {
            Field::U16(value) => value,
            other => {
                return Err(ProtocolError::Corrupt(format!(
                    "expected message kind field, found {other}"
                )))
            }
        };
        let arg_count = match Field::read_from(buf)? {
            Field::U8(value) => value as usize,
            other => {
                return Err(ProtocolError::Corrupt(format!(
                    "expected argument count field, found {other}"
                )))
            }
        };
        let arg_tags = match Field::read_from(buf)? {
            Field::Blob(bytes) if bytes.len() == ARG_TYPE_TAGS_LEN => bytes,
            Field::Blob(bytes) => {
                return Err(ProtocolError::Corrupt(format!(
                    "argument tag blob has length {}",
                    bytes.len()
                )))
            }
            other => {
                return Err(ProtocolError::Corrupt(format!(
                    "expected argument tag blob, found {other}"
                )))
            }
        };
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            args.push(Field::read_from(buf)?);
        }
        Ok(Self {
            transaction,
            kind,
            arg_tags,
            args,
        })
    }

    /// Writes the message to the buffer, byte-identically to how it was
    /// read.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        Field::U32(MESSAGE_MAGIC).write_to(buf);
        Field::U32(self.transaction).write_to(buf);
        Field::U16(self.kind).write_to(buf);
        Field::U8(self.args.len() as u8).write_to(buf);
        Field::Blob(self.arg_tags.clone()).write_to(buf);
        for arg in &self.args {
            arg.write_to(buf);
        }
    }

    /// Serializes the message to a fresh byte buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Numeric value of the argument at `index`, if present and numeric.
    #[must_use]
    pub fn arg_number(&self, index: usize) -> Option<u32> {
        self.args.get(index).and_then(Field::as_number)
    }

    /// Text value of the argument at `index`, if present and textual.
    #[must_use]
    pub fn arg_text(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Field::as_text)
    }

    /// Blob bytes of the argument at `index`, if present and binary.
    #[must_use]
    pub fn arg_blob(&self, index: usize) -> Option<&Bytes> {
        self.args.get(index).and_then(Field::as_blob)
    }
}

/// Reads a stream of concatenated messages terminated by a menu footer.
///
/// This is the shape of a rendered menu on the wire and of `metadata/<id>`
/// entries in archives: item messages followed by one footer. The footer is
/// consumed but not returned.
///
/// # Errors
///
/// [`ProtocolError::Truncated`] if the buffer ends before a footer is seen.
pub fn read_items_until_footer(buf: &mut impl Buf) -> ProtocolResult<Vec<Message>> {
    let mut items = Vec::new();
    loop {
        let message = Message::read_from(buf)?;
        if message.kind == kind::MENU_FOOTER {
            return Ok(items);
        }
        items.push(message);
    }
}

fn derive_arg_tags(args: &[Field]) -> Bytes {
    let mut tags = BytesMut::zeroed(ARG_TYPE_TAGS_LEN);
    for (index, arg) in args.iter().take(ARG_TYPE_TAGS_LEN).enumerate() {
        tags[index] = arg.tag();
    }
    tags.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::item_type;

    fn menu_item(id: u32, label: &str) -> Message {
        Message::response(
            7,
            kind::MENU_ITEM,
            vec![
                Field::U32(0),
                Field::U32(id),
                Field::Text(label.into()),
                Field::Text(String::new()),
                Field::U16(item_type::TITLE),
                Field::U32(0),
                Field::U32(0),
            ],
        )
    }

    #[test]
    fn message_round_trips_byte_identically() {
        let message = menu_item(42, "Demo Track");
        let bytes = message.to_bytes();
        let mut read = bytes.clone();
        let parsed = Message::read_from(&mut read).unwrap();
        assert_eq!(read.remaining(), 0);
        assert_eq!(parsed, message);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut buf = BytesMut::new();
        Field::U32(0xdead_beef).write_to(&mut buf);
        Field::U32(0).write_to(&mut buf);
        let mut bytes = buf.freeze();
        assert!(matches!(
            Message::read_from(&mut bytes),
            Err(ProtocolError::Corrupt(_))
        ));
    }

    #[test]
    fn eof_mid_message_is_truncated() {
        let bytes = menu_item(1, "x").to_bytes();
        let mut short = bytes.slice(0..bytes.len() - 3);
        assert!(matches!(
            Message::read_from(&mut short),
            Err(ProtocolError::Truncated)
        ));
    }

    #[test]
    fn non_canonical_preamble_width_is_corrupt() {
        // A magic written as a 2-byte field could never have come from our
        // writer, so the reader must reject it.
        let mut buf = BytesMut::new();
        Field::U16(0x49ae).write_to(&mut buf);
        let mut bytes = buf.freeze();
        assert!(matches!(
            Message::read_from(&mut bytes),
            Err(ProtocolError::Corrupt(_))
        ));
    }

    #[test]
    fn item_stream_stops_at_footer() {
        let mut buf = BytesMut::new();
        menu_item(1, "a").write_to(&mut buf);
        menu_item(2, "b").write_to(&mut buf);
        Message::footer().write_to(&mut buf);
        let mut bytes = buf.freeze();

        let items = read_items_until_footer(&mut bytes).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].arg_number(1), Some(2));
        assert_eq!(bytes.remaining(), 0);
    }

    #[test]
    fn item_stream_without_footer_is_truncated() {
        let mut buf = BytesMut::new();
        menu_item(1, "a").write_to(&mut buf);
        let mut bytes = buf.freeze();
        assert!(matches!(
            read_items_until_footer(&mut bytes),
            Err(ProtocolError::Truncated)
        ));
    }

    #[test]
    fn footer_has_no_args() {
        let footer = Message::footer();
        assert_eq!(footer.kind, kind::MENU_FOOTER);
        assert!(footer.args.is_empty());
    }
}
