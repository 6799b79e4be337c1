//! Error types for solver operations.

use fs_equations::EquationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    Setup { what: String },

    #[error("Infeasible: {message}")]
    Infeasible { message: String },

    #[error("Iteration limit: {message}")]
    IterationLimit { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Solver error: {message}")]
    Backend { message: String },

    #[error(transparent)]
    Equation(#[from] EquationError),
}

pub type SolverResult<T> = Result<T, SolverError>;
