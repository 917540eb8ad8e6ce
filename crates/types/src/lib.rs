//! Key/value data model for the storage engine.
//!
//! Supports the key and value kinds a paged B+-tree index needs to persist:
//! signed/unsigned fixed-width integers, fixed-length and variable-length
//! character data, and variable-length blobs. Every [`Value`] knows how to
//! compare itself against another of the same [`DataType`], serialize into a
//! byte buffer, and report its persisted length — the primitives the index
//! codec builds records on top of.

use std::cmp::Ordering;

mod codec;
mod value;

pub use codec::{DT_INPUT_OVER_LENGTH, DT_UNSUPPORT_CONVERT};
pub use value::Value;

/// Describes the shape of a column: which variant of [`Value`] it holds and,
/// for fixed/variable character columns, the declared length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    /// Fixed-length character data, padded to `len` bytes on encode.
    FixedChar(u16),
    /// Variable-length character data, `len` is the declared maximum.
    VarChar(u16),
    /// Variable-length byte blob, `len` is the declared maximum.
    Blob(u32),
}

impl DataType {
    /// Whether values of this type compare byte-for-byte once encoded
    /// (true for every fixed-width numeric and fixed-char type) or require
    /// an explicit typed comparison (variable-length types).
    pub fn is_byte_comparable(&self) -> bool {
        !matches!(self, DataType::VarChar(_) | DataType::Blob(_))
    }

    /// Maximum persisted length in bytes for a value of this type.
    pub fn max_len(&self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 => 4,
            DataType::Int64 | DataType::UInt64 => 8,
            DataType::FixedChar(len) => *len as usize,
            // 2-byte length prefix + payload.
            DataType::VarChar(len) => 2 + *len as usize,
            DataType::Blob(len) => 4 + *len as usize,
        }
    }
}

impl Value {
    /// The [`DataType`] this value was constructed against. For variable
    /// length types the declared max length is recovered from the current
    /// payload length (callers validate against the schema separately).
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int8(_) => DataType::Int8,
            Value::UInt8(_) => DataType::UInt8,
            Value::Int16(_) => DataType::Int16,
            Value::UInt16(_) => DataType::UInt16,
            Value::Int32(_) => DataType::Int32,
            Value::UInt32(_) => DataType::UInt32,
            Value::Int64(_) => DataType::Int64,
            Value::UInt64(_) => DataType::UInt64,
            Value::FixedChar(_, declared) => DataType::FixedChar(*declared),
            Value::VarChar(s) => DataType::VarChar(s.len() as u16),
            Value::Blob(b) => DataType::Blob(b.len() as u32),
            Value::Null => DataType::Int64,
        }
    }

    /// Compare against another value of the same logical type.
    ///
    /// Returns `None` for cross-type or `Null` comparisons — callers decide
    /// how to treat those (e.g. a key codec rejects mixed-type keys up
    /// front).
    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Int8(a), Int8(b)) => Some(a.cmp(b)),
            (UInt8(a), UInt8(b)) => Some(a.cmp(b)),
            (Int16(a), Int16(b)) => Some(a.cmp(b)),
            (UInt16(a), UInt16(b)) => Some(a.cmp(b)),
            (Int32(a), Int32(b)) => Some(a.cmp(b)),
            (UInt32(a), UInt32(b)) => Some(a.cmp(b)),
            (Int64(a), Int64(b)) => Some(a.cmp(b)),
            (UInt64(a), UInt64(b)) => Some(a.cmp(b)),
            (FixedChar(a, _), FixedChar(b, _)) => Some(a.cmp(b)),
            (VarChar(a), VarChar(b)) => Some(a.cmp(b)),
            (Blob(a), Blob(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        self.cmp_same_type(other).map(|o| o == Ordering::Equal)
    }

    /// Number of bytes this value occupies when encoded with [`Value::encode`].
    pub fn persisted_len(&self) -> usize {
        match self {
            Value::Int8(_) | Value::UInt8(_) => 1,
            Value::Int16(_) | Value::UInt16(_) => 2,
            Value::Int32(_) | Value::UInt32(_) => 4,
            Value::Int64(_) | Value::UInt64(_) => 8,
            Value::FixedChar(_, declared) => *declared as usize,
            Value::VarChar(s) => 2 + s.len(),
            Value::Blob(b) => 4 + b.len(),
            Value::Null => 0,
        }
    }
}
