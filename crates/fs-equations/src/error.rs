//! Error types for equation assembly.

use crate::key::EquationKey;
use fs_model::ModelError;
use thiserror::Error;

pub type EquationResult<T> = Result<T, EquationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EquationError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Duplicate equation {key}")]
    DuplicateEquation { key: EquationKey },

    #[error("Unknown equation {key}")]
    UnknownEquation { key: EquationKey },

    #[error("Unit '{unit}': component '{component}' is not assigned to any outlet")]
    UnassignedComponent { unit: String, component: String },

    #[error("Unit '{unit}': component '{component}' is assigned more than once")]
    DuplicateAssignment { unit: String, component: String },

    #[error("Unit '{unit}': {what}")]
    InvalidUnit { unit: String, what: String },

    /// An equation references an entity that no longer exists.
    #[error("Equation {key} references a removed entity")]
    DanglingReference { key: EquationKey },
}
