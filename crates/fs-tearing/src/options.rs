//! Outer-loop settings.

use fs_solver::SolveOptions;

use crate::error::{TearError, TearResult};

/// Settings of the outer fixed-point loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TearOptions {
    /// Converged when the L1 change of the tear values drops below this.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Step fraction λ in `old + λ (new - old)`; 1 is plain substitution.
    pub relaxation: f64,
    /// Options for every inner solve.
    pub solve: SolveOptions,
}

impl Default for TearOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 100,
            relaxation: 1.0,
            solve: SolveOptions::default(),
        }
    }
}

impl TearOptions {
    pub fn validate(&self) -> TearResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(TearError::InvalidOptions {
                what: format!("tolerance must be positive, got {}", self.tolerance),
            });
        }
        if self.max_iterations == 0 {
            return Err(TearError::InvalidOptions {
                what: "max_iterations must be at least 1".to_string(),
            });
        }
        if !(self.relaxation.is_finite() && self.relaxation > 0.0 && self.relaxation <= 2.0) {
            return Err(TearError::InvalidOptions {
                what: format!("relaxation must lie in (0, 2], got {}", self.relaxation),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TearOptions::default().validate().unwrap();
    }

    #[test]
    fn rejects_zero_relaxation() {
        let options = TearOptions {
            relaxation: 0.0,
            ..TearOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(TearError::InvalidOptions { .. })
        ));
    }
}
