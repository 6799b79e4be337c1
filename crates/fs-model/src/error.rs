//! Entity-model error types.

use crate::entity::EntityKind;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A name is already taken by another entity of any kind.
    #[error("Duplicate {kind} '{name}'")]
    DuplicateEntity { kind: EntityKind, name: String },

    /// A reference to a name that was never declared (or was removed).
    #[error("Unknown {kind} '{name}'")]
    UnknownEntity { kind: EntityKind, name: String },

    /// Ids are 32-bit; a model cannot hold more entities of one kind.
    #[error("Too many {kind} entities")]
    CapacityExceeded { kind: EntityKind },

    #[error("Invalid specification: {what}")]
    InvalidSpec { what: String },

    #[error("Parse error in '{text}': {message}")]
    Parse { text: String, message: String },
}

impl ModelError {
    pub(crate) fn unknown(kind: EntityKind, name: impl Into<String>) -> Self {
        ModelError::UnknownEntity {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        ModelError::InvalidSpec { what: what.into() }
    }
}
