//! Error types for packet encoding, decoding and table lookups

use thiserror::Error;

/// Errors that can occur while building a wire packet
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// APID does not fit in the 11-bit identification field
    #[error("apid {0} out of range (0-2047)")]
    ApidOutOfRange(u16),

    /// A packet must carry at least one byte of user data
    #[error("packet has no user data")]
    EmptyPayload,

    /// User data does not fit the 16-bit length field
    #[error("payload of {0} bytes exceeds the 65536-byte limit")]
    PayloadTooLong(usize),

    /// A field could not be converted to a wire value
    #[error("invalid field: {0}")]
    Field(#[from] FieldError),
}

/// Errors that can occur while parsing a wire packet
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer is shorter than the headers it claims to carry
    #[error("truncated packet: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    /// User data is too short for the schema it is decoded with
    #[error("payload of {actual} bytes is too short for {schema} ({needed} bytes)")]
    SchemaMismatch {
        schema: &'static str,
        needed: usize,
        actual: usize,
    },
}

/// Errors produced when parsing a field from text
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Value is neither an integer nor a float
    #[error("{0:?} is not an integer or float")]
    NotNumeric(String),

    /// Integer literal does not fit in 32 bits
    #[error("{0} does not fit in a 32-bit field")]
    OutOfRange(String),
}

/// Errors produced when a numeric id is not present in a static table
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    /// No entry with this value
    #[error("unknown {table} {value}")]
    Unknown { table: &'static str, value: u16 },
}

/// Errors produced while decoding a recognised telecommand body
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Command body is shorter than its arguments
    #[error("{command} needs {needed} bytes of arguments, got {actual}")]
    MissingArguments {
        command: &'static str,
        needed: usize,
        actual: usize,
    },
}
