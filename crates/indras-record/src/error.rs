//! Error types for indras-record
//!
//! Records themselves never fail once constructed: every mutator falls back
//! to growing storage. Errors only come from parsing the text form and from
//! validating a page layout.

use thiserror::Error;

/// Top-level error type for record operations
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Text error: {0}")]
    Text(#[from] TextError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors produced while parsing the bracketed text form
///
/// Parsing is all-or-nothing: any of these discards the partial record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("Unterminated term starting at byte {0}")]
    UnterminatedTerm(usize),

    #[error("Unexpected byte {byte:#04x} outside a term at byte {offset}")]
    UnexpectedByte { offset: usize, byte: u8 },

    #[error("Nested '[' at byte {0}")]
    NestedBracket(usize),

    #[error("Empty term at byte {0}")]
    EmptyTerm(usize),

    #[error("Term at byte {offset} has {count} tokens, expected at most {max}")]
    TooManyTokens {
        offset: usize,
        count: usize,
        max: usize,
    },

    #[error("Unknown opcode {token:?} in term at byte {offset}")]
    UnknownOpcode { offset: usize, token: String },

    #[error("Invalid escape sequence at byte {0}")]
    BadEscape(usize),

    #[error("Token at byte {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

/// Errors related to page layout configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid slot count: {slots} (expected 1..={max})")]
    InvalidSlots { slots: usize, max: usize },

    #[error("Arena too small: {size} bytes (minimum {min})")]
    ArenaTooSmall { size: usize, min: usize },

    #[error("Arena too large: {size} bytes (maximum {max})")]
    ArenaTooLarge { size: usize, max: usize },
}

/// Result type alias for record operations
pub type RecordResult<T> = Result<T, RecordError>;
