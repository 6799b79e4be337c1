//! Error types for the fs-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the engine crates
/// behind one interface for every frontend.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Failed to read flowsheet file: {path}: {message}")]
    FlowsheetFileRead { path: PathBuf, message: String },

    #[error("Flowsheet validation failed: {0}")]
    Validation(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Tearing error: {0}")]
    Tearing(String),

    #[error("Unsupported request: {message}")]
    Unsupported { message: String },
}

/// Result type for fs-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<fs_project::ProjectError> for AppError {
    fn from(err: fs_project::ProjectError) -> Self {
        match err {
            fs_project::ProjectError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<fs_model::ModelError> for AppError {
    fn from(err: fs_model::ModelError) -> Self {
        AppError::Model(err.to_string())
    }
}

impl From<fs_equations::EquationError> for AppError {
    fn from(err: fs_equations::EquationError) -> Self {
        AppError::Model(err.to_string())
    }
}

impl From<fs_solver::SolverError> for AppError {
    fn from(err: fs_solver::SolverError) -> Self {
        AppError::Solver(err.to_string())
    }
}

impl From<fs_tearing::TearError> for AppError {
    fn from(err: fs_tearing::TearError) -> Self {
        AppError::Tearing(err.to_string())
    }
}
