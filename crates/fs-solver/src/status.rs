//! Terminal status of a single solve.

use core::fmt;

use crate::error::SolverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    IterationLimit,
    Timeout,
    Error,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == SolveStatus::Optimal
    }

    /// Map a non-optimal status to the matching error, carrying `message`.
    pub fn into_result(self, message: impl Into<String>) -> Result<(), SolverError> {
        let message = message.into();
        match self {
            SolveStatus::Optimal => Ok(()),
            SolveStatus::Infeasible => Err(SolverError::Infeasible { message }),
            SolveStatus::IterationLimit => Err(SolverError::IterationLimit { message }),
            SolveStatus::Timeout => Err(SolverError::Timeout { message }),
            SolveStatus::Error => Err(SolverError::Backend { message }),
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::IterationLimit => "iteration limit",
            SolveStatus::Timeout => "timeout",
            SolveStatus::Error => "error",
        };
        f.write_str(s)
    }
}
