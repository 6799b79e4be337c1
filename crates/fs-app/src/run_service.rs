//! Checking, solving, sweeping and diagnosing built flowsheets.
//!
//! Every entry point returns a serializable report. Non-converged solves are
//! reported through `succeeded`, not as errors; only failures that leave no
//! result behind come back as [`AppError`].

use fs_equations::{DofReport, Pins, count, count_with_pins};
use fs_project::BuiltFlowsheet;
use fs_report::{ListingEntry, StreamTable, listing};
use fs_solver::{System, redundant_equations, solve_flowsheet};
use fs_tearing::{
    GuessGrid, ParameterOutcome, SweepOutcome, TearSet, TearWarning, TearingIterator,
    parameter_sweep as run_parameter_sweep,
};
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Relative singular-value cutoff for the redundancy rank test.
const REDUNDANCY_REL_TOL: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One simultaneous solve of the whole flowsheet.
    Direct,
    /// Sequential fixed-point iteration over the tear set.
    Tearing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DofSummary {
    pub equations: usize,
    pub unknowns: usize,
    pub dof: i64,
    pub status: String,
}

impl From<&DofReport> for DofSummary {
    fn from(report: &DofReport) -> Self {
        Self {
            equations: report.equations,
            unknowns: report.unknowns,
            dof: report.dof,
            status: report.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub fingerprint: String,
    /// Count over the whole flowsheet, recycles untorn.
    pub dof: DofSummary,
    /// Count with the tear guesses pinned, when the file declares tearing.
    pub torn_dof: Option<DofSummary>,
    /// Equations with no free unknown, checked against the fixed values.
    pub fully_fixed: Vec<String>,
    pub suspended: Vec<String>,
    pub unreferenced: Vec<String>,
    pub warnings: Vec<String>,
}

impl CheckReport {
    /// Whether the system that `run` would solve is square.
    pub fn is_square(&self) -> bool {
        self.torn_dof.as_ref().unwrap_or(&self.dof).dof == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub name: String,
    pub fingerprint: String,
    pub mode: RunMode,
    pub status: String,
    pub succeeded: bool,
    /// Back-end iterations for a direct solve, inner solves for tearing.
    pub iterations: usize,
    /// Final residual norm (direct) or tear-value change (tearing).
    pub final_error: Option<f64>,
    pub error_history: Vec<f64>,
    pub streams: StreamTable,
    pub listing: Vec<ListingEntry>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPointSummary {
    pub index: usize,
    pub guesses: Vec<f64>,
    pub status: String,
    pub iterations: Option<usize>,
    pub error: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepSummary {
    pub name: String,
    pub points: Vec<SweepPointSummary>,
    /// Index of the converged point with the fewest iterations.
    pub best: Option<usize>,
    pub converged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterPointSummary {
    pub index: usize,
    pub value: f64,
    pub status: String,
    pub iterations: Option<usize>,
    pub objective: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSweepSummary {
    pub name: String,
    pub parameter: String,
    pub mode: RunMode,
    pub points: Vec<ParameterPointSummary>,
    /// Index of the converged point with the largest objective.
    pub best: Option<usize>,
    pub converged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedundancySummary {
    pub name: String,
    pub equations: usize,
    pub variables: usize,
    pub rank: usize,
    pub candidates: Vec<String>,
}

/// Tear guesses pinned at their initial values.
fn tear_pins(built: &BuiltFlowsheet, set: &TearSet) -> Pins {
    let initial = built.flowsheet.model.initial_assignment();
    set.pairs()
        .iter()
        .map(|p| (p.guess, initial.get(p.guess)))
        .collect()
}

fn warning_text(warning: &TearWarning) -> String {
    match warning {
        TearWarning::IterationLimitExceeded { iterations, error } => {
            format!("tearing stopped after {iterations} iterations with error {error:e}")
        }
        TearWarning::Cancelled { iteration } => {
            format!("tearing cancelled at iteration {iteration}")
        }
    }
}

/// Degrees-of-freedom report for the flowsheet as it would be run.
pub fn check(built: &BuiltFlowsheet) -> CheckReport {
    let fs = &built.flowsheet;
    let untorn = count(fs);
    let torn = built
        .tear_set
        .as_ref()
        .map(|set| count_with_pins(fs, &tear_pins(built, set)));
    let effective = torn.as_ref().unwrap_or(&untorn);

    CheckReport {
        name: built.name.clone(),
        fingerprint: fs.fingerprint(),
        dof: DofSummary::from(&untorn),
        torn_dof: torn.as_ref().map(DofSummary::from),
        fully_fixed: effective.fully_fixed.clone(),
        suspended: effective.suspended.clone(),
        unreferenced: effective.unreferenced.clone(),
        warnings: built.warnings.clone(),
    }
}

/// Solve the flowsheet, through the tearing loop when it declares a tear set.
pub fn run(built: &BuiltFlowsheet) -> AppResult<RunReport> {
    let fs = &built.flowsheet;
    let mut warnings = built.warnings.clone();

    let report = match &built.tear_set {
        Some(set) => {
            let tear = TearingIterator::new(fs, set.clone(), built.tear_options.clone())?.run()?;
            warnings.extend(tear.warnings.iter().map(warning_text));
            RunReport {
                name: built.name.clone(),
                fingerprint: fs.fingerprint(),
                mode: RunMode::Tearing,
                status: tear.state.to_string(),
                succeeded: tear.converged(),
                iterations: tear.iterations,
                final_error: tear.final_error(),
                error_history: tear.error_history.clone(),
                streams: StreamTable::build(&fs.model, &tear.assignment)?,
                listing: listing(&fs.model, &tear.assignment),
                warnings,
            }
        }
        None => {
            let outcome = solve_flowsheet(fs, &built.solve_options)?;
            let diagnostics = &outcome.diagnostics;
            warnings.extend(diagnostics.bound_violations.iter().cloned());
            if !outcome.status.is_optimal() && !diagnostics.message.is_empty() {
                warnings.push(diagnostics.message.clone());
            }
            RunReport {
                name: built.name.clone(),
                fingerprint: fs.fingerprint(),
                mode: RunMode::Direct,
                status: outcome.status.to_string(),
                succeeded: outcome.status.is_optimal(),
                iterations: diagnostics.iterations,
                final_error: Some(diagnostics.residual_norm),
                error_history: Vec::new(),
                streams: StreamTable::build(&fs.model, &outcome.values)?,
                listing: listing(&fs.model, &outcome.values),
                warnings,
            }
        }
    };

    info!(
        name = %report.name,
        status = %report.status,
        iterations = report.iterations,
        "run finished"
    );
    Ok(report)
}

/// Run the tearing loop from every point of the file's guess grid.
///
/// A file without a `sweep` section runs the single default point.
pub fn sweep(built: &BuiltFlowsheet) -> AppResult<SweepSummary> {
    let set = built.tear_set.as_ref().ok_or_else(|| AppError::Unsupported {
        message: format!("flowsheet '{}' declares no tear streams to sweep", built.name),
    })?;
    let grid = built.sweep.clone().unwrap_or_else(GuessGrid::new);
    let report = fs_tearing::sweep(&built.flowsheet, set, &grid, &built.tear_options);

    let points = report
        .points
        .iter()
        .map(|p| {
            let (status, iterations, error, message) = match &p.outcome {
                SweepOutcome::Converged {
                    iterations, error, ..
                } => ("converged".to_string(), Some(*iterations), Some(*error), None),
                SweepOutcome::Stopped {
                    state,
                    iterations,
                    error,
                } => (state.to_string(), Some(*iterations), *error, None),
                SweepOutcome::Failed { message } => {
                    ("failed".to_string(), None, None, Some(message.clone()))
                }
            };
            SweepPointSummary {
                index: p.index,
                guesses: p.guesses.clone(),
                status,
                iterations,
                error,
                message,
            }
        })
        .collect();

    Ok(SweepSummary {
        name: built.name.clone(),
        points,
        best: report.best().map(|p| p.index),
        converged: report.converged_count(),
        failed: report.failed_count(),
    })
}

/// Re-solve the flowsheet along the file's parameter sweep.
///
/// Points run in order, each warm-started from the last converged one.
pub fn parameter_sweep(built: &BuiltFlowsheet) -> AppResult<ParameterSweepSummary> {
    let plan = built
        .parameter_sweep
        .as_ref()
        .ok_or_else(|| AppError::Unsupported {
            message: format!("flowsheet '{}' declares no parameter sweep", built.name),
        })?;
    let report = run_parameter_sweep(
        &built.flowsheet,
        plan,
        built.tear_set.as_ref(),
        &built.tear_options,
    )?;

    let points = report
        .points
        .iter()
        .map(|p| {
            let (status, iterations, objective, message) = match &p.outcome {
                ParameterOutcome::Converged {
                    iterations,
                    objective,
                } => ("converged".to_string(), Some(*iterations), *objective, None),
                ParameterOutcome::NotConverged { status, iterations } => {
                    (status.clone(), Some(*iterations), None, None)
                }
                ParameterOutcome::Failed { message } => {
                    ("failed".to_string(), None, None, Some(message.clone()))
                }
            };
            ParameterPointSummary {
                index: p.index,
                value: p.value,
                status,
                iterations,
                objective,
                message,
            }
        })
        .collect();

    Ok(ParameterSweepSummary {
        name: built.name.clone(),
        parameter: report.parameter.clone(),
        mode: if built.tear_set.is_some() {
            RunMode::Tearing
        } else {
            RunMode::Direct
        },
        points,
        best: report.best().map(|p| p.index),
        converged: report.converged_count(),
        failed: report.failed_count(),
    })
}

/// Rank test of every counted equation at the initial values.
pub fn redundant(built: &BuiltFlowsheet) -> AppResult<RedundancySummary> {
    let fs = &built.flowsheet;
    let pins = built
        .tear_set
        .as_ref()
        .map(|set| tear_pins(built, set))
        .unwrap_or_default();
    let system = System::compile(fs, &pins)?;
    let report = redundant_equations(&system, &fs.model.initial_assignment(), REDUNDANCY_REL_TOL);

    Ok(RedundancySummary {
        name: built.name.clone(),
        equations: report.equations,
        variables: report.variables,
        rank: report.rank,
        candidates: report.candidates,
    })
}
