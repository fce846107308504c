//! Error types for the code-emission backend.
//!
//! These cover contract violations at the IR boundary. Internal emitter
//! inconsistencies (unbalanced indentation, a type tag missing after
//! validation) are programming defects and panic instead of surfacing
//! here.

use thiserror::Error;

/// Errors that can occur while checking a grammar IR and emitting code.
#[derive(Error, Debug)]
pub enum Error {
    #[error("grammar has no rules")]
    EmptyGrammar,

    #[error("duplicate rule definition: {0}")]
    DuplicateRule(String),

    #[error("unknown rule reference: {name} (referenced from {referenced_in})")]
    UnknownRule { name: String, referenced_in: String },

    #[error("invalid grammar IR: {0}")]
    InvalidIr(String),

    #[error("grammar deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
