//! Byte-level encode/decode for [`crate::Value`].
//!
//! Integers are little-endian fixed-width. Fixed-length character data is
//! padded with trailing NUL bytes to the declared width (and truncated if
//! the UTF-8 payload is already longer, which `encode_checked` rejects
//! rather than silently cutting a multi-byte codepoint in half).
//! Variable-length character data and blobs carry an explicit length
//! prefix (`u16` for varchar, `u32` for blob) ahead of the payload, mirroring
//! the record layout in spec.md §3 ("value-len (4)").

use crate::{DataType, Value};

/// Error code for "value exceeds its declared maximum length", kept numeric
/// for parity with the source engine's `ErrorID.h` (`DT_INPUT_OVER_LENGTH`).
pub const DT_INPUT_OVER_LENGTH: u32 = 2002;
/// Error code for "value cannot be converted to the requested type"
/// (`DT_UNSUPPORT_CONVERT`).
pub const DT_UNSUPPORT_CONVERT: u32 = 2001;

impl Value {
    /// Encode this value's bytes with no length validation against a schema.
    /// Used internally once a value has already been checked with
    /// [`Value::encode_checked`].
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.persisted_len());
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::Int8(v) => out.push(*v as u8),
            Value::UInt8(v) => out.push(*v),
            Value::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::FixedChar(s, declared) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(*declared as usize);
                out.extend_from_slice(&bytes[..len]);
                out.resize(out.len() + (*declared as usize - len), 0u8);
            }
            Value::VarChar(s) => {
                let bytes = s.as_bytes();
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Value::Blob(b) => {
                out.extend_from_slice(&(b.len() as u32).to_le_bytes());
                out.extend_from_slice(b);
            }
            Value::Null => {}
        }
    }

    /// Encode, rejecting payloads that exceed `data_type`'s declared
    /// maximum length. Returns the numeric error code on rejection so
    /// callers (the `common` crate's `DbError::InputOverLength`) can wrap it
    /// without this crate depending on `common`.
    pub fn encode_checked(&self, data_type: &DataType) -> Result<Vec<u8>, u32> {
        let declared_payload_len = match data_type {
            DataType::VarChar(len) => *len as usize,
            DataType::Blob(len) => *len as usize,
            _ => return Ok(self.encode()),
        };
        let actual = match self {
            Value::VarChar(s) => s.as_bytes().len(),
            Value::Blob(b) => b.len(),
            _ => return Err(DT_UNSUPPORT_CONVERT),
        };
        if actual > declared_payload_len {
            return Err(DT_INPUT_OVER_LENGTH);
        }
        Ok(self.encode())
    }

    /// Decode a value of `data_type` from the front of `bytes`.
    ///
    /// Returns the decoded value and the number of bytes consumed, or
    /// `None` if `bytes` is too short to hold a complete value.
    pub fn decode(bytes: &[u8], data_type: DataType) -> Option<(Value, usize)> {
        match data_type {
            DataType::Int8 => bytes.first().map(|b| (Value::Int8(*b as i8), 1)),
            DataType::UInt8 => bytes.first().map(|b| (Value::UInt8(*b), 1)),
            DataType::Int16 => take_fixed::<2>(bytes)
                .map(|a| (Value::Int16(i16::from_le_bytes(a)), 2)),
            DataType::UInt16 => take_fixed::<2>(bytes)
                .map(|a| (Value::UInt16(u16::from_le_bytes(a)), 2)),
            DataType::Int32 => take_fixed::<4>(bytes)
                .map(|a| (Value::Int32(i32::from_le_bytes(a)), 4)),
            DataType::UInt32 => take_fixed::<4>(bytes)
                .map(|a| (Value::UInt32(u32::from_le_bytes(a)), 4)),
            DataType::Int64 => take_fixed::<8>(bytes)
                .map(|a| (Value::Int64(i64::from_le_bytes(a)), 8)),
            DataType::UInt64 => take_fixed::<8>(bytes)
                .map(|a| (Value::UInt64(u64::from_le_bytes(a)), 8)),
            DataType::FixedChar(len) => {
                let len = len as usize;
                if bytes.len() < len {
                    return None;
                }
                let raw = &bytes[..len];
                let trimmed = raw.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
                let s = String::from_utf8_lossy(&raw[..trimmed]).into_owned();
                Some((Value::FixedChar(s, len as u16), len))
            }
            DataType::VarChar(_) => {
                let prefix = take_fixed::<2>(bytes)?;
                let len = u16::from_le_bytes(prefix) as usize;
                if bytes.len() < 2 + len {
                    return None;
                }
                let s = String::from_utf8_lossy(&bytes[2..2 + len]).into_owned();
                Some((Value::VarChar(s), 2 + len))
            }
            DataType::Blob(_) => {
                let prefix = take_fixed::<4>(bytes)?;
                let len = u32::from_le_bytes(prefix) as usize;
                if bytes.len() < 4 + len {
                    return None;
                }
                Some((Value::Blob(bytes[4..4 + len].to_vec()), 4 + len))
            }
        }
    }
}

fn take_fixed<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    if bytes.len() < N {
        return None;
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    Some(out)
}
