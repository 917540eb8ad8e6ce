use thiserror::Error;

/// Canonical error type shared across the storage engine.
///
/// Every public operation in `btree`/`buffer`/`storage` returns
/// `Result<_, DbError>` rather than setting a thread-local "current error"
/// the way the source engine does — see spec.md §7 and the design notes on
/// replacing thread-local error state with typed results. Numeric codes are
/// kept stable with the source's `ErrorID.h` for anyone cross-referencing
/// error reports.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("index file version mismatch on open (code {})", Self::INVALID_FILE_VERSION)]
    InvalidFileVersion,

    #[error("index major/minor version does not match the compiled engine (code {})", Self::INDEX_VERSION_MISMATCH)]
    IndexVersionMismatch,

    #[error("unsupported data type in index schema (code {})", Self::UNSUPPORTED_DATA_TYPE)]
    UnsupportedDataType,

    #[error("index schema has no columns (code {})", Self::EMPTY_COLUMN_SET)]
    EmptyColumnSet,

    #[error("value exceeds declared maximum length (code {})", Self::INPUT_OVER_LENGTH)]
    InputOverLength,

    #[error("value cannot be converted to the requested type (code {})", Self::UNSUPPORTED_CONVERT)]
    UnsupportedConvert,

    #[error("allocator byte ceiling exceeded (code {})", Self::ALLOCATOR_EXCEEDED)]
    AllocatorExceeded,

    #[error("encoded key exceeds half the page payload (code {})", Self::KEY_TOO_LONG)]
    KeyTooLong,

    #[error("duplicate key insert rejected (code {})", Self::REPEATED_RECORD)]
    RepeatedRecord,

    #[error("failed to open page file (code {})", Self::FILE_OPEN_FAILED)]
    FileOpenFailed,

    #[error("page data failed CRC validation")]
    Corrupt,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DbError {
    pub const INVALID_FILE_VERSION: u32 = 1001;
    pub const INDEX_VERSION_MISMATCH: u32 = 1010;
    pub const UNSUPPORTED_DATA_TYPE: u32 = 1008;
    pub const EMPTY_COLUMN_SET: u32 = 1009;
    pub const INPUT_OVER_LENGTH: u32 = 2002;
    pub const UNSUPPORTED_CONVERT: u32 = 2001;
    pub const ALLOCATOR_EXCEEDED: u32 = 3001;
    pub const KEY_TOO_LONG: u32 = 5001;
    pub const REPEATED_RECORD: u32 = 5002;
    pub const FILE_OPEN_FAILED: u32 = 4001;

    /// Stable numeric code for this error, or `None` for variants with no
    /// source-engine equivalent (`Corrupt`, `Io`).
    pub fn code(&self) -> Option<u32> {
        match self {
            DbError::InvalidFileVersion => Some(Self::INVALID_FILE_VERSION),
            DbError::IndexVersionMismatch => Some(Self::INDEX_VERSION_MISMATCH),
            DbError::UnsupportedDataType => Some(Self::UNSUPPORTED_DATA_TYPE),
            DbError::EmptyColumnSet => Some(Self::EMPTY_COLUMN_SET),
            DbError::InputOverLength => Some(Self::INPUT_OVER_LENGTH),
            DbError::UnsupportedConvert => Some(Self::UNSUPPORTED_CONVERT),
            DbError::AllocatorExceeded => Some(Self::ALLOCATOR_EXCEEDED),
            DbError::KeyTooLong => Some(Self::KEY_TOO_LONG),
            DbError::RepeatedRecord => Some(Self::REPEATED_RECORD),
            DbError::FileOpenFailed => Some(Self::FILE_OPEN_FAILED),
            DbError::Corrupt | DbError::Io(_) => None,
        }
    }

    /// Map a [`types`] codec rejection code (`DT_*`) onto the matching
    /// `DbError` variant.
    pub fn from_value_code(code: u32) -> DbError {
        match code {
            types::DT_INPUT_OVER_LENGTH => DbError::InputOverLength,
            types::DT_UNSUPPORT_CONVERT => DbError::UnsupportedConvert,
            _ => DbError::UnsupportedConvert,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
