//! # Error Types: Structured Error Hierarchy
//!
//! Defines the error types used throughout formwatch. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Selector errors carry the offending input and the byte offset at
//!   which parsing stopped.
//! - Documents load through `?`; parser failures from `serde_json` and
//!   `serde_yaml` become `Serialization` errors.
//! - The watcher itself never returns errors: every runtime operation is
//!   total. Errors only surface from parsing configuration and documents.

use thiserror::Error;

/// Top-level error type for formwatch.
#[derive(Error, Debug)]
pub enum FormwatchError {
    /// A CSS-style selector could not be parsed.
    #[error("selector error: {0}")]
    Selector(#[from] SelectorError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FormwatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for FormwatchError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Error while parsing a selector list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The selector (or one entry of a selector list) was empty.
    #[error("empty selector in {input:?}")]
    Empty {
        /// The full selector text.
        input: String,
    },

    /// An unexpected character was encountered.
    #[error("unexpected {found:?} at offset {offset} in {input:?}")]
    Unexpected {
        /// The full selector text.
        input: String,
        /// Byte offset of the offending character.
        offset: usize,
        /// The character found.
        found: char,
    },

    /// The input ended inside an attribute selector or quoted value.
    #[error("unterminated {what} in {input:?}")]
    Unterminated {
        /// The full selector text.
        input: String,
        /// What was left open (e.g. "attribute selector").
        what: &'static str,
    },
}
