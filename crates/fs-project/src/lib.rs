//! fs-project: flowsheet file format, validation and build.

pub mod build;
pub mod schema;
pub mod validate;

pub use build::{BuiltFlowsheet, build, solve_options};
pub use schema::*;
pub use validate::{LATEST_VERSION, ValidationError, validate_file};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(#[from] fs_model::ModelError),

    #[error("Equation error: {0}")]
    Equation(#[from] fs_equations::EquationError),

    #[error("Tearing error: {0}")]
    Tear(#[from] fs_tearing::TearError),
}

pub fn load_yaml(path: &std::path::Path) -> ProjectResult<FlowsheetFile> {
    let content = std::fs::read_to_string(path)?;
    let file: FlowsheetFile = serde_yaml::from_str(&content)?;
    validate_file(&file)?;
    Ok(file)
}

pub fn save_yaml(path: &std::path::Path, file: &FlowsheetFile) -> ProjectResult<()> {
    validate_file(file)?;
    let content = serde_yaml::to_string(file)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> ProjectResult<FlowsheetFile> {
    let content = std::fs::read_to_string(path)?;
    let file: FlowsheetFile = serde_json::from_str(&content)?;
    validate_file(&file)?;
    Ok(file)
}

pub fn save_json(path: &std::path::Path, file: &FlowsheetFile) -> ProjectResult<()> {
    validate_file(file)?;
    let content = serde_json::to_string_pretty(file)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a `.json` file as JSON and anything else as YAML.
pub fn load(path: &std::path::Path) -> ProjectResult<FlowsheetFile> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json(path),
        _ => load_yaml(path),
    }
}
