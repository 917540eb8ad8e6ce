/// A typed value stored as a key or value field in the index.
///
/// Mirrors the source engine's `TDataValue` family
/// (`original_source/src/dataType/TDataValue.h`): signed/unsigned integers
/// of every width, fixed-length and variable-length character data, and a
/// variable-length blob.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    /// Stored text, padded/truncated to a declared fixed width on encode.
    FixedChar(String, u16),
    /// Stored text with no fixed width; encodes with a length prefix.
    VarChar(String),
    /// Raw bytes with no fixed width; encodes with a length prefix.
    Blob(Vec<u8>),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}
