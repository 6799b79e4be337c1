//! Fixed-point convergence of recycle loops by tearing.
//!
//! A [`TearSet`] names the guess/computed unknown pairs that break each
//! recycle. The [`TearingIterator`] pins the guesses, solves the rest of the
//! flowsheet, and substitutes the computed values back until the L1 change
//! falls below tolerance. [`sweep`] runs the same loop from a grid of
//! starting guesses in parallel; [`parameter_sweep`] re-solves the flowsheet
//! along the values of one parameter, warm-starting each point.

pub mod error;
pub mod iterator;
pub mod options;
pub mod param_sweep;
pub mod sweep;
pub mod tear_set;

pub use error::{TearError, TearResult};
pub use iterator::{TearReport, TearState, TearWarning, TearingIterator};
pub use options::TearOptions;
pub use param_sweep::{
    ParameterOutcome, ParameterPoint, ParameterSweep, ParameterSweepReport, parameter_sweep,
};
pub use sweep::{GuessAxis, GuessGrid, SweepOutcome, SweepPoint, SweepReport, sweep};
pub use tear_set::{TearPair, TearSet, closure_equations};
