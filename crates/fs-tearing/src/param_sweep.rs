//! Sequential sweep over the value of one parameter.
//!
//! Each point sets the parameter on a working copy of the flowsheet and
//! solves it, through the tearing loop when a tear set is given. After a
//! converged point the solved values become the initial values of the next
//! one, so neighbouring points start close to their solution.

use fs_core::{ParamId, Real, VarId};
use fs_equations::Flowsheet;
use fs_model::{Assignment, EntityModel, Expr, SliceEnv};
use fs_solver::solve_flowsheet;
use tracing::{debug, info};

use crate::error::{TearError, TearResult};
use crate::iterator::TearingIterator;
use crate::options::TearOptions;
use crate::tear_set::TearSet;

/// Values of one parameter to solve at, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSweep {
    pub parameter: ParamId,
    pub values: Vec<Real>,
    /// Scalar evaluated on every converged point.
    pub objective: Option<Expr>,
}

impl ParameterSweep {
    pub fn new(parameter: ParamId, values: impl Into<Vec<Real>>) -> Self {
        Self {
            parameter,
            values: values.into(),
            objective: None,
        }
    }

    pub fn with_objective(mut self, objective: Expr) -> Self {
        self.objective = Some(objective);
        self
    }

    /// `start, start + step, ...` up to and including `stop`.
    pub fn range(start: Real, stop: Real, step: Real) -> TearResult<Vec<Real>> {
        if !(start.is_finite() && stop.is_finite() && step.is_finite() && step > 0.0) {
            return Err(TearError::InvalidOptions {
                what: format!("range {start}..={stop} by {step} is not a finite increasing range"),
            });
        }
        if stop < start {
            return Ok(Vec::new());
        }
        let count = ((stop - start) / step + 1e-9).floor() as usize + 1;
        Ok((0..count).map(|i| start + i as Real * step).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterOutcome {
    Converged {
        iterations: usize,
        objective: Option<Real>,
    },
    /// The solve ended without converging; `status` names how.
    NotConverged { status: String, iterations: usize },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPoint {
    pub index: usize,
    pub value: Real,
    pub outcome: ParameterOutcome,
}

impl ParameterPoint {
    pub fn objective(&self) -> Option<Real> {
        match self.outcome {
            ParameterOutcome::Converged { objective, .. } => objective,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSweepReport {
    pub parameter: String,
    /// Points in sweep order.
    pub points: Vec<ParameterPoint>,
}

impl ParameterSweepReport {
    /// Converged point with the largest objective; ties go to the earlier point.
    pub fn best(&self) -> Option<&ParameterPoint> {
        self.points
            .iter()
            .filter_map(|p| p.objective().filter(|v| v.is_finite()).map(|v| (v, p)))
            .max_by(|(a, p), (b, q)| a.total_cmp(b).then(q.index.cmp(&p.index)))
            .map(|(_, p)| p)
    }

    pub fn converged_count(&self) -> usize {
        self.points
            .iter()
            .filter(|p| matches!(p.outcome, ParameterOutcome::Converged { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.points
            .iter()
            .filter(|p| matches!(p.outcome, ParameterOutcome::Failed { .. }))
            .count()
    }
}

struct Solved {
    converged: bool,
    status: String,
    iterations: usize,
    values: Assignment,
}

fn solve_point(fs: &Flowsheet, tear_set: Option<&TearSet>, options: &TearOptions) -> TearResult<Solved> {
    match tear_set {
        Some(set) => {
            let report = TearingIterator::new(fs, set.clone(), options.clone())?.run()?;
            Ok(Solved {
                converged: report.converged(),
                status: report.state.to_string(),
                iterations: report.iterations,
                values: report.assignment,
            })
        }
        None => {
            let outcome = solve_flowsheet(fs, &options.solve)?;
            Ok(Solved {
                converged: outcome.status.is_optimal(),
                status: outcome.status.to_string(),
                iterations: outcome.diagnostics.iterations,
                values: outcome.values,
            })
        }
    }
}

/// Copy solved values into the initial values of every unfixed unknown.
fn warm_start(model: &mut EntityModel, values: &Assignment) -> TearResult<()> {
    let unfixed: Vec<VarId> = model
        .variables()
        .filter(|v| v.fixed.is_none())
        .map(|v| v.id)
        .collect();
    for var in unfixed {
        let value = values.get(var);
        if value.is_finite() {
            model.set_initial(var, value)?;
        }
    }
    Ok(())
}

fn evaluate(objective: &Expr, model: &EntityModel, values: &Assignment) -> Real {
    let params = model.param_values();
    objective.eval(&SliceEnv {
        vars: values.as_slice(),
        params: &params,
    })
}

/// Solve `fs` at every value of the swept parameter, in order.
///
/// The caller's flowsheet is not modified. A point that fails or does not
/// converge is recorded and the sweep moves on from the last converged
/// values.
pub fn parameter_sweep(
    fs: &Flowsheet,
    sweep: &ParameterSweep,
    tear_set: Option<&TearSet>,
    options: &TearOptions,
) -> TearResult<ParameterSweepReport> {
    let parameter = fs.model.get_parameter(sweep.parameter)?.name.clone();
    let mut local = fs.clone();
    let mut points = Vec::with_capacity(sweep.values.len());

    for (index, &value) in sweep.values.iter().enumerate() {
        let outcome = match local
            .model
            .set_parameter_value(sweep.parameter, value)
            .map_err(TearError::from)
            .and_then(|()| solve_point(&local, tear_set, options))
        {
            Ok(solved) if solved.converged => {
                let objective = sweep
                    .objective
                    .as_ref()
                    .map(|e| evaluate(e, &local.model, &solved.values));
                warm_start(&mut local.model, &solved.values)?;
                ParameterOutcome::Converged {
                    iterations: solved.iterations,
                    objective,
                }
            }
            Ok(solved) => ParameterOutcome::NotConverged {
                status: solved.status,
                iterations: solved.iterations,
            },
            Err(e) => ParameterOutcome::Failed {
                message: e.to_string(),
            },
        };
        debug!(%parameter, index, value, ?outcome, "parameter point");
        points.push(ParameterPoint {
            index,
            value,
            outcome,
        });
    }

    let report = ParameterSweepReport { parameter, points };
    info!(
        parameter = %report.parameter,
        points = report.points.len(),
        converged = report.converged_count(),
        failed = report.failed_count(),
        "parameter sweep finished"
    );
    Ok(report)
}
