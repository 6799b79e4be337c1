//! The solver boundary.

use fs_core::Deadline;
use nalgebra::DVector;

use crate::options::SolveOptions;
use crate::status::SolveStatus;
use crate::system::System;

/// Raw result of a back-end run, before bound checks.
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    pub status: SolveStatus,
    /// Last iterate over the system's free unknowns.
    pub x: DVector<f64>,
    pub iterations: usize,
    pub residual_norm: f64,
    pub message: String,
}

/// A nonlinear solver family.
///
/// Implementations must not retry internally and must check `deadline`
/// between iterations.
pub trait SolveBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(
        &self,
        system: &System,
        x0: DVector<f64>,
        options: &SolveOptions,
        deadline: &Deadline,
    ) -> BackendOutcome;
}
