//! Parallel sweep over starting guesses.

use fs_core::{Real, StreamId, VarId};
use fs_equations::Flowsheet;
use rayon::prelude::*;
use tracing::info;

use crate::error::TearResult;
use crate::iterator::{TearState, TearingIterator};
use crate::options::TearOptions;
use crate::tear_set::TearSet;

/// One dimension of the guess grid.
#[derive(Debug, Clone, PartialEq)]
pub enum GuessAxis {
    /// Values for a single guess unknown.
    Variable { var: VarId, values: Vec<Real> },
    /// Total-flow values for a torn stream. Component guesses keep the
    /// stream's composition; a flow basis is scaled with the total.
    Stream { stream: StreamId, totals: Vec<Real> },
}

impl GuessAxis {
    fn len(&self) -> usize {
        match self {
            Self::Variable { values, .. } => values.len(),
            Self::Stream { totals, .. } => totals.len(),
        }
    }

    fn value(&self, i: usize) -> Real {
        match self {
            Self::Variable { values, .. } => values[i],
            Self::Stream { totals, .. } => totals[i],
        }
    }
}

/// Cartesian product of guess axes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuessGrid {
    pub axes: Vec<GuessAxis>,
}

impl GuessGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(mut self, var: VarId, values: impl Into<Vec<Real>>) -> Self {
        self.axes.push(GuessAxis::Variable {
            var,
            values: values.into(),
        });
        self
    }

    pub fn stream(mut self, stream: StreamId, totals: impl Into<Vec<Real>>) -> Self {
        self.axes.push(GuessAxis::Stream {
            stream,
            totals: totals.into(),
        });
        self
    }

    /// Number of grid points; an empty grid has one point, the defaults.
    pub fn point_count(&self) -> usize {
        self.axes.iter().map(GuessAxis::len).product()
    }

    /// Grid points in row-major order, first axis slowest.
    pub fn points(&self) -> Vec<Vec<Real>> {
        let mut points = vec![Vec::with_capacity(self.axes.len())];
        for axis in &self.axes {
            points = points
                .into_iter()
                .flat_map(|prefix| {
                    (0..axis.len()).map(move |i| {
                        let mut p = prefix.clone();
                        p.push(axis.value(i));
                        p
                    })
                })
                .collect();
        }
        points
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Converged {
        iterations: usize,
        error: Real,
        tear_values: Vec<Real>,
    },
    /// Terminated without converging (iteration limit or cancellation).
    Stopped {
        state: TearState,
        iterations: usize,
        error: Option<Real>,
    },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub index: usize,
    /// One value per grid axis.
    pub guesses: Vec<Real>,
    pub outcome: SweepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Points in grid order.
    pub points: Vec<SweepPoint>,
}

impl SweepReport {
    /// Converged point with the fewest iterations; ties go to the earlier point.
    pub fn best(&self) -> Option<&SweepPoint> {
        self.points
            .iter()
            .filter_map(|p| match p.outcome {
                SweepOutcome::Converged { iterations, .. } => Some((iterations, p)),
                _ => None,
            })
            .min_by_key(|(iterations, p)| (*iterations, p.index))
            .map(|(_, p)| p)
    }

    pub fn converged_count(&self) -> usize {
        self.points
            .iter()
            .filter(|p| matches!(p.outcome, SweepOutcome::Converged { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.points
            .iter()
            .filter(|p| matches!(p.outcome, SweepOutcome::Failed { .. }))
            .count()
    }
}

fn seeded<'a>(
    fs: &'a Flowsheet,
    set: &TearSet,
    grid: &GuessGrid,
    guesses: &[Real],
    options: &TearOptions,
) -> TearResult<TearingIterator<'a>> {
    let mut it = TearingIterator::new(fs, set.clone(), options.clone())?;
    for (axis, value) in grid.axes.iter().zip(guesses) {
        it = match axis {
            GuessAxis::Variable { var, .. } => it.with_guess(*var, *value)?,
            GuessAxis::Stream { stream, .. } => {
                let initial = fs.model.initial_assignment();
                let vars = fs.model.stream_vars(*stream);
                let current_total = vars.first().map_or(0.0, |v| initial.get(*v));
                let scale = if current_total.abs() > 0.0 {
                    value / current_total
                } else {
                    0.0
                };
                let flow_basis = fs.model.get_stream(*stream)?.basis()
                    == Some(fs_model::CompositionBasis::Flows);
                let values: Vec<Real> = vars
                    .iter()
                    .enumerate()
                    .map(|(i, v)| match (i, flow_basis) {
                        (0, _) => *value,
                        (_, true) => initial.get(*v) * scale,
                        (_, false) => initial.get(*v),
                    })
                    .collect();
                it.with_stream_guess(*stream, &values)?
            }
        };
    }
    Ok(it)
}

fn run_point(fs: &Flowsheet, set: &TearSet, grid: &GuessGrid, guesses: &[Real], options: &TearOptions) -> SweepOutcome {
    let result = seeded(fs, set, grid, guesses, options).and_then(TearingIterator::run);
    match result {
        Ok(report) if report.converged() => SweepOutcome::Converged {
            iterations: report.iterations,
            error: report.final_error().unwrap_or(0.0),
            tear_values: report.tear_values,
        },
        Ok(report) => SweepOutcome::Stopped {
            state: report.state,
            iterations: report.iterations,
            error: report.final_error(),
        },
        Err(e) => SweepOutcome::Failed {
            message: e.to_string(),
        },
    }
}

/// Run the tearing loop from every grid point in parallel.
///
/// Each point works on its own copy of the flowsheet. Failures are recorded
/// per point and never abort the sweep.
pub fn sweep(fs: &Flowsheet, set: &TearSet, grid: &GuessGrid, options: &TearOptions) -> SweepReport {
    let points: Vec<SweepPoint> = grid
        .points()
        .into_par_iter()
        .enumerate()
        .map(|(index, guesses)| {
            let local = fs.clone();
            let outcome = run_point(&local, set, grid, &guesses, options);
            SweepPoint {
                index,
                guesses,
                outcome,
            }
        })
        .collect();

    let report = SweepReport { points };
    info!(
        points = report.points.len(),
        converged = report.converged_count(),
        failed = report.failed_count(),
        "sweep finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_model::Bounds;

    #[test]
    fn grid_is_row_major() {
        let a = VarId::from_index(0);
        let b = VarId::from_index(1);
        let grid = GuessGrid::new().variable(a, [1.0, 2.0]).variable(b, [10.0, 20.0, 30.0]);
        assert_eq!(grid.point_count(), 6);
        let points = grid.points();
        assert_eq!(points[0], vec![1.0, 10.0]);
        assert_eq!(points[2], vec![1.0, 30.0]);
        assert_eq!(points[3], vec![2.0, 10.0]);
    }

    #[test]
    fn empty_grid_has_the_default_point() {
        let grid = GuessGrid::new();
        assert_eq!(grid.points(), vec![Vec::<Real>::new()]);
    }

    #[test]
    fn best_prefers_fewest_iterations() {
        let mut fs = Flowsheet::new();
        let r = fs.model.declare_unknown("r", Bounds::FREE, 0.0).unwrap();
        let out = fs.model.declare_unknown("out", Bounds::FREE, 0.0).unwrap();
        fs.add_relation("loop", "out == 0.5 * r + 10").unwrap();
        let set = TearSet::new().with_pair(&fs.model, r, out).unwrap();
        let grid = GuessGrid::new().variable(r, [0.0, 19.0, 20.0]);

        let report = sweep(&fs, &set, &grid, &TearOptions::default());
        assert_eq!(report.points.len(), 3);
        assert_eq!(report.converged_count(), 3);
        let best = report.best().unwrap();
        assert_eq!(best.index, 2);
        assert!(matches!(best.outcome, SweepOutcome::Converged { iterations: 1, .. }));
    }
}
