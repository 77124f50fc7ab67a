//! Typed fields, the unit of the remote database wire format.
//!
//! Every value in a message is a tagged field: a one-byte type tag followed
//! by the payload. Reading and writing are exact inverses; a field written
//! back produces the bytes it was read from. Archives depend on that.

use std::fmt;

use bytes::{Buf, BufMut, Bytes};

use super::constants::{TAG_BLOB, TAG_TEXT, TAG_U16, TAG_U32, TAG_U8};
use super::{ProtocolError, ProtocolResult};

/// One tagged field of a message.
///
/// Numbers keep their wire width as distinct variants so that re-serializing
/// a parsed message is byte-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// A 1-byte number.
    U8(u8),
    /// A 2-byte number.
    U16(u16),
    /// A 4-byte number, big-endian.
    U32(u32),
    /// A length-prefixed binary blob.
    Blob(Bytes),
    /// A length-prefixed UTF-16BE string.
    Text(String),
}

impl Field {
    /// The wire tag byte for this field's type.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Field::U8(_) => TAG_U8,
            Field::U16(_) => TAG_U16,
            Field::U32(_) => TAG_U32,
            Field::Blob(_) => TAG_BLOB,
            Field::Text(_) => TAG_TEXT,
        }
    }

    /// Reads one field from the buffer.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] if the buffer ends inside the field,
    /// [`ProtocolError::Corrupt`] for an unknown tag or invalid string data.
    pub fn read_from(buf: &mut impl Buf) -> ProtocolResult<Self> {
        let tag = read_u8(buf)?;
        match tag {
            TAG_U8 => Ok(Field::U8(read_u8(buf)?)),
            TAG_U16 => {
                ensure(buf, 2)?;
                Ok(Field::U16(buf.get_u16()))
            }
            TAG_U32 => {
                ensure(buf, 4)?;
                Ok(Field::U32(buf.get_u32()))
            }
            TAG_BLOB => {
                ensure(buf, 4)?;
                let len = buf.get_u32() as usize;
                ensure(buf, len)?;
                Ok(Field::Blob(buf.copy_to_bytes(len)))
            }
            TAG_TEXT => {
                ensure(buf, 4)?;
                let chars = buf.get_u32() as usize;
                ensure(buf, chars * 2)?;
                let mut units = Vec::with_capacity(chars);
                for _ in 0..chars {
                    units.push(buf.get_u16());
                }
                let text = String::from_utf16(&units).map_err(|_| {
                    ProtocolError::Corrupt("string field is not valid UTF-16".into())
                })?;
                Ok(Field::Text(text))
            }
            other => Err(ProtocolError::Corrupt(format!(
                "unknown field tag {other:#04x}"
            ))),
        }
    }

    /// Writes the field, tag included, to the buffer.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.tag());
        match self {
            Field::U8(value) => buf.put_u8(*value),
            Field::U16(value) => buf.put_u16(*value),
            Field::U32(value) => buf.put_u32(*value),
            Field::Blob(bytes) => {
                buf.put_u32(bytes.len() as u32);
                buf.put_slice(bytes);
            }
            Field::Text(text) => {
                let units: Vec<u16> = text.encode_utf16().collect();
                buf.put_u32(units.len() as u32);
                for unit in units {
                    buf.put_u16(unit);
                }
            }
        }
    }

    /// The numeric value if this is any number variant.
    #[must_use]
    pub fn as_number(&self) -> Option<u32> {
        match self {
            Field::U8(value) => Some(u32::from(*value)),
            Field::U16(value) => Some(u32::from(*value)),
            Field::U32(value) => Some(*value),
            _ => None,
        }
    }

    /// The string value if this is a text field.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Field::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The blob bytes if this is a blob field.
    #[must_use]
    pub fn as_blob(&self) -> Option<&Bytes> {
        match self {
            Field::Blob(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::U8(value) => write!(f, "{value:#04x}"),
            Field::U16(value) => write!(f, "{value:#06x}"),
            Field::U32(value) => write!(f, "{value:#010x}"),
            Field::Blob(bytes) => write!(f, "blob[{}]", bytes.len()),
            Field::Text(text) => write!(f, "{text:?}"),
        }
    }
}

fn read_u8(buf: &mut impl Buf) -> ProtocolResult<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn ensure(buf: &impl Buf, needed: usize) -> ProtocolResult<()> {
    if buf.remaining() < needed {
        Err(ProtocolError::Truncated)
    } else {
        Ok(())
    }
}
