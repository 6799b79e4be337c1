//! Sequential fixed-point iteration over a tear set.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fs_core::{Real, StreamId, Timer, VarId, l1_distance, relax_toward};
use fs_equations::{Flowsheet, Pins};
use fs_model::Assignment;
use fs_solver::{SolveStatus, System, solve};
use tracing::{info, warn};

use crate::error::{TearError, TearResult};
use crate::options::TearOptions;
use crate::tear_set::TearSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TearState {
    Initialized,
    Iterating,
    Converged,
    DivergedMaxIter,
    Failed,
    Cancelled,
}

impl TearState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Converged | Self::DivergedMaxIter | Self::Failed | Self::Cancelled
        )
    }
}

impl fmt::Display for TearState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TearState::Initialized => "initialized",
            TearState::Iterating => "iterating",
            TearState::Converged => "converged",
            TearState::DivergedMaxIter => "iteration limit",
            TearState::Failed => "failed",
            TearState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Non-fatal outcomes attached to a report.
#[derive(Debug, Clone, PartialEq)]
pub enum TearWarning {
    IterationLimitExceeded { iterations: usize, error: Real },
    Cancelled { iteration: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TearReport {
    pub state: TearState,
    /// Inner solves performed.
    pub iterations: usize,
    /// L1 change of the tear values, one entry per inner solve.
    pub error_history: Vec<Real>,
    /// Current guesses, in tear-set order.
    pub tear_values: Vec<Real>,
    /// Last solved assignment (initial values if nothing was solved).
    pub assignment: Assignment,
    pub warnings: Vec<TearWarning>,
}

impl TearReport {
    pub fn converged(&self) -> bool {
        self.state == TearState::Converged
    }

    pub fn final_error(&self) -> Option<Real> {
        self.error_history.last().copied()
    }
}

/// Outer loop of the sequential method.
///
/// Holds only the tear vector and the warm-start point; the flowsheet is
/// borrowed and never modified.
pub struct TearingIterator<'a> {
    fs: &'a Flowsheet,
    set: TearSet,
    options: TearOptions,
    guesses: Vec<Real>,
    state: TearState,
    k: usize,
    error_history: Vec<Real>,
    warm: Assignment,
    cancel: Option<Arc<AtomicBool>>,
    warnings: Vec<TearWarning>,
}

impl<'a> TearingIterator<'a> {
    pub fn new(fs: &'a Flowsheet, set: TearSet, options: TearOptions) -> TearResult<Self> {
        options.validate()?;
        if set.is_empty() {
            return Err(TearError::InvalidTearSet {
                what: "no tear pairs".to_string(),
            });
        }
        let warm = fs.model.initial_assignment();
        let mut guesses = Vec::with_capacity(set.len());
        for pair in set.pairs() {
            fs.model.get_variable(pair.guess)?;
            fs.model.get_variable(pair.computed)?;
            guesses.push(warm.get(pair.guess));
        }
        Ok(Self {
            fs,
            set,
            options,
            guesses,
            state: TearState::Initialized,
            k: 0,
            error_history: Vec::new(),
            warm,
            cancel: None,
            warnings: Vec::new(),
        })
    }

    /// Override the starting value of one guess unknown.
    pub fn with_guess(mut self, var: VarId, value: Real) -> TearResult<Self> {
        let slot = self.set.position(var).ok_or_else(|| TearError::NotAGuess {
            name: self.fs.model.var_name(var).unwrap_or("?").to_string(),
        })?;
        self.guesses[slot] = value;
        Ok(self)
    }

    /// Override every guess of a torn stream: total first, then per component.
    pub fn with_stream_guess(mut self, stream: StreamId, values: &[Real]) -> TearResult<Self> {
        let vars = self.fs.model.stream_vars(stream);
        if vars.is_empty() || vars.len() != values.len() {
            let name = self.fs.model.get_stream(stream)?.name.clone();
            return Err(TearError::InvalidTearSet {
                what: format!(
                    "stream '{name}' takes {} guess values, got {}",
                    vars.len(),
                    values.len()
                ),
            });
        }
        for (var, value) in vars.into_iter().zip(values) {
            self = self.with_guess(var, *value)?;
        }
        Ok(self)
    }

    /// Cooperative cancellation, checked before each iteration.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn state(&self) -> TearState {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.k
    }

    pub fn guesses(&self) -> &[Real] {
        &self.guesses
    }

    pub fn error_history(&self) -> &[Real] {
        &self.error_history
    }

    /// One outer iteration. A terminal state is returned unchanged.
    pub fn step(&mut self) -> TearResult<TearState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        self.state = TearState::Iterating;

        let pins: Pins = self
            .set
            .pairs()
            .iter()
            .zip(&self.guesses)
            .map(|(p, v)| (p.guess, *v))
            .collect();
        let system = match System::compile(self.fs, &pins) {
            Ok(system) => system,
            Err(e) => {
                self.state = TearState::Failed;
                return Err(e.into());
            }
        };
        let outcome = solve(&system, &self.warm, &self.options.solve);
        if outcome.status != SolveStatus::Optimal {
            self.state = TearState::Failed;
            warn!(
                iteration = self.k,
                status = %outcome.status,
                "inner solve failed"
            );
            return Err(TearError::InnerSolve {
                iteration: self.k,
                status: outcome.status,
                message: outcome.diagnostics.message,
            });
        }

        let computed: Vec<Real> = self
            .set
            .pairs()
            .iter()
            .map(|p| outcome.values.get(p.computed))
            .collect();
        let error = l1_distance(&computed, &self.guesses);
        self.error_history.push(error);
        self.warm = outcome.values;
        info!(iteration = self.k, error, "tear iteration");

        if error < self.options.tolerance {
            self.state = TearState::Converged;
            return Ok(self.state);
        }

        relax_toward(&mut self.guesses, &computed, self.options.relaxation);
        self.k += 1;
        if self.k == self.options.max_iterations {
            self.state = TearState::DivergedMaxIter;
            warn!(iterations = self.k, error, "tearing hit the iteration limit");
            self.warnings.push(TearWarning::IterationLimitExceeded {
                iterations: self.k,
                error,
            });
        }
        Ok(self.state)
    }

    /// Iterate to a terminal state.
    pub fn run(mut self) -> TearResult<TearReport> {
        let timer = Timer::start("tearing");
        while !self.state.is_terminal() {
            if self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed)) {
                self.state = TearState::Cancelled;
                self.warnings.push(TearWarning::Cancelled { iteration: self.k });
                break;
            }
            self.step()?;
        }
        info!(
            state = ?self.state,
            iterations = self.error_history.len(),
            elapsed_s = timer.elapsed_s(),
            "tearing finished"
        );
        Ok(self.into_report())
    }

    fn into_report(self) -> TearReport {
        TearReport {
            state: self.state,
            iterations: self.error_history.len(),
            error_history: self.error_history,
            tear_values: self.guesses,
            assignment: self.warm,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_model::Bounds;

    /// `out == 0.5 * r + 10`, torn on `r`.
    fn halving() -> (Flowsheet, TearSet) {
        let mut fs = Flowsheet::new();
        let r = fs.model.declare_unknown("r", Bounds::FREE, 0.0).unwrap();
        let out = fs.model.declare_unknown("out", Bounds::FREE, 0.0).unwrap();
        fs.add_relation("loop", "out == 0.5 * r + 10").unwrap();
        let set = TearSet::new().with_pair(&fs.model, r, out).unwrap();
        (fs, set)
    }

    #[test]
    fn first_step_substitutes_the_computed_value() {
        let (fs, set) = halving();
        let mut it = TearingIterator::new(&fs, set, TearOptions::default()).unwrap();
        assert_eq!(it.state(), TearState::Initialized);
        assert_eq!(it.step().unwrap(), TearState::Iterating);
        assert!((it.guesses()[0] - 10.0).abs() < 1e-9);
        assert!((it.error_history()[0] - 10.0).abs() < 1e-9);
        assert_eq!(it.iteration(), 1);
    }

    #[test]
    fn iteration_limit_is_a_warning() {
        let (fs, set) = halving();
        let options = TearOptions {
            max_iterations: 3,
            ..TearOptions::default()
        };
        let report = TearingIterator::new(&fs, set, options).unwrap().run().unwrap();
        assert_eq!(report.state, TearState::DivergedMaxIter);
        assert_eq!(report.iterations, 3);
        assert!(matches!(
            report.warnings[..],
            [TearWarning::IterationLimitExceeded { iterations: 3, .. }]
        ));
        let out = fs.model.variable("out").unwrap();
        assert!((report.assignment.get(out) - 17.5).abs() < 1e-9);
    }

    #[test]
    fn relaxation_slows_the_update() {
        let (fs, set) = halving();
        let options = TearOptions {
            relaxation: 0.5,
            ..TearOptions::default()
        };
        let mut it = TearingIterator::new(&fs, set, options).unwrap();
        it.step().unwrap();
        assert!((it.guesses()[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn cancel_before_start_stops_cleanly() {
        let (fs, set) = halving();
        let flag = Arc::new(AtomicBool::new(true));
        let report = TearingIterator::new(&fs, set, TearOptions::default())
            .unwrap()
            .with_cancel(flag)
            .run()
            .unwrap();
        assert_eq!(report.state, TearState::Cancelled);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.warnings, vec![TearWarning::Cancelled { iteration: 0 }]);
    }

    #[test]
    fn unknown_guess_is_rejected() {
        let (fs, set) = halving();
        let out = fs.model.variable("out").unwrap();
        let it = TearingIterator::new(&fs, set, TearOptions::default()).unwrap();
        assert!(matches!(it.with_guess(out, 1.0), Err(TearError::NotAGuess { .. })));
    }
}
