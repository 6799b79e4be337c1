//! Flowsheet file loading, saving and introspection.

use std::path::Path;

use fs_project::{BuiltFlowsheet, FlowsheetFile, ProjectError};
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Size of a built flowsheet, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowsheetSummary {
    pub name: String,
    pub components: usize,
    pub streams: usize,
    pub units: usize,
    pub equations: usize,
    pub free_unknowns: usize,
    /// Guess streams of the tear set, empty when the file declares none.
    pub torn_streams: Vec<String>,
    pub sweep_points: usize,
    pub parameter_sweep_points: usize,
}

/// Load, validate and build a flowsheet file (YAML, or JSON by extension).
pub fn load_flowsheet(path: &Path) -> AppResult<BuiltFlowsheet> {
    let file = fs_project::load(path).map_err(|e| match e {
        ProjectError::Io(source) => AppError::FlowsheetFileRead {
            path: path.to_path_buf(),
            message: source.to_string(),
        },
        other => other.into(),
    })?;
    let built = fs_project::build(&file)?;
    info!(
        name = %built.name,
        equations = built.flowsheet.equations.active_count(),
        "flowsheet loaded"
    );
    Ok(built)
}

/// Save a flowsheet file, as JSON when the path ends in `.json`.
pub fn save_flowsheet(path: &Path, file: &FlowsheetFile) -> AppResult<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => fs_project::save_json(path, file)?,
        _ => fs_project::save_yaml(path, file)?,
    }
    Ok(())
}

pub fn summarize(built: &BuiltFlowsheet) -> FlowsheetSummary {
    let model = &built.flowsheet.model;
    let torn_streams = built
        .tear_set
        .as_ref()
        .map(|set| {
            set.guess_streams()
                .into_iter()
                .filter_map(|id| model.get_stream(id).ok().map(|s| s.name.clone()))
                .collect()
        })
        .unwrap_or_default();

    FlowsheetSummary {
        name: built.name.clone(),
        components: model.component_count(),
        streams: model.streams().count(),
        units: built.flowsheet.equations.units().count(),
        equations: built.flowsheet.equations.active_count(),
        free_unknowns: model.free_variable_count(),
        torn_streams,
        sweep_points: built.sweep.as_ref().map_or(0, |g| g.point_count()),
        parameter_sweep_points: built.parameter_sweep.as_ref().map_or(0, |p| p.values.len()),
    }
}
