//! Error types for the line codec.
//!
//! Parsing failures are per-line and recoverable; validation failures reject
//! a single outbound message before anything touches the wire. Transport and
//! client errors live next to the code that raises them.

use thiserror::Error;

/// A frame that could not be parsed.
///
/// The whole line is rejected; no partial message is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed message at position {position} while {context}: {input:?}")]
pub struct ParseError {
    /// The offending line, exactly as received.
    pub input: String,
    /// Byte offset where scanning failed.
    pub position: usize,
    /// What the scanner was looking for when it failed.
    pub context: &'static str,
}

impl ParseError {
    pub(crate) fn new(input: &str, position: usize, context: &'static str) -> Self {
        Self {
            input: input.to_string(),
            position,
            context,
        }
    }
}

/// A message that cannot be serialized onto the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The command was empty.
    #[error("message command can not be empty")]
    EmptyCommand,

    /// The command contained whitespace, a colon or a line break.
    #[error("invalid message command: {0:?}")]
    InvalidCommand(String),

    /// A parameter other than the last one contained a space.
    #[error("only the last message parameter can contain spaces (parameter {index})")]
    SpaceInParam {
        /// Index of the offending parameter.
        index: usize,
    },

    /// A parameter started with `:`.
    #[error("message parameters can not start with \":\" (parameter {index})")]
    LeadingColon {
        /// Index of the offending parameter.
        index: usize,
    },

    /// A parameter contained a carriage return.
    #[error("messages can not contain carriage returns (parameter {index})")]
    CarriageReturn {
        /// Index of the offending parameter.
        index: usize,
    },

    /// A parameter contained a line feed.
    #[error("messages can not contain new lines (parameter {index})")]
    LineFeed {
        /// Index of the offending parameter.
        index: usize,
    },

    /// A parameter other than the last one was empty and would vanish on the wire.
    #[error("only the last message parameter can be empty (parameter {index})")]
    EmptyParam {
        /// Index of the offending parameter.
        index: usize,
    },
}
