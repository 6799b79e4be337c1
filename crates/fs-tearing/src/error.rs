//! Error types for tearing.

use fs_equations::EquationError;
use fs_model::ModelError;
use fs_solver::{SolveStatus, SolverError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TearError {
    #[error("invalid tear set: {what}")]
    InvalidTearSet { what: String },

    #[error("invalid tear options: {what}")]
    InvalidOptions { what: String },

    #[error("'{name}' is not a tear guess")]
    NotAGuess { name: String },

    #[error("inner solve failed at iteration {iteration} ({status}): {message}")]
    InnerSolve {
        iteration: usize,
        status: SolveStatus,
        message: String,
    },

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Equation(#[from] EquationError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type TearResult<T> = Result<T, TearError>;
