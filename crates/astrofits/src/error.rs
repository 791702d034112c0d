use alloc::string::String;

/// Errors raised while decoding or encoding FITS structures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unexpected header structure (missing END, bad BITPIX, ...).
    #[error("malformed FITS structure: {0}")]
    FitsFormat(String),

    /// A card failed the keyword/value layout rules.
    #[error("invalid card: {0}")]
    InvalidCard(String),

    #[error("keyword `{0}` is longer than 8 characters")]
    InvalidKeyLength(String),

    #[error("value of `{keyword}` is {len} characters, at most {max} fit")]
    InvalidValueLength {
        keyword: String,
        len: usize,
        max: usize,
    },

    #[error("keyword `{0}` not found")]
    KeyNotFound(String),

    #[error("column `{0}` not found")]
    ColumnNotFound(String),

    #[error("invalid column format `{0}`")]
    InvalidColumnFormat(String),

    #[error("cannot convert `{value}` to {target}")]
    InvalidCast { value: String, target: &'static str },

    #[error("HDU `{0}` not found")]
    HduNotFound(String),

    #[error("expected a {expected} HDU, found {found}")]
    WrongHduType {
        expected: &'static str,
        found: &'static str,
    },

    /// The HDU was read headers-only and its data has not been loaded.
    #[error("data of HDU `{0}` has not been loaded")]
    DataNotLoaded(String),

    #[error("row {row} out of range for a table of {rows} rows")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("unexpected end of data: needed {needed} bytes at offset {offset}, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[cfg(feature = "std")]
    #[error("cannot read `{path}`")]
    FileReading {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "std")]
    #[error("cannot write `{path}`")]
    FileWriting {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::FitsFormat(msg.into())
    }

    pub(crate) fn cast(value: impl Into<String>, target: &'static str) -> Self {
        Error::InvalidCast {
            value: value.into(),
            target,
        }
    }
}
